use std::{str::FromStr, time::Duration};

/// What happens when the backend fails to issue a 2FA code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IssueFailurePolicy {
    /// Discard the pending challenge and go back to the credentials step.
    #[default]
    ReturnToLogin,
    /// Stay on a delivery-problem step when the provider failed (5xx), so
    /// the operator can retry without re-entering the password.
    Remediate,
}

impl FromStr for IssueFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "login" | "return-to-login" => Ok(Self::ReturnToLogin),
            "remediate" => Ok(Self::Remediate),
            other => Err(format!(
                "unknown delivery failure policy '{other}' (expected 'login' or 'remediate')"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Seconds before another code may be requested.
    pub resend_cooldown: u64,
    /// Codes that may be issued per challenge, the first one included.
    pub max_resends: u32,
    pub tick: Duration,
    pub issue_failure: IssueFailurePolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            resend_cooldown: 120,
            max_resends: 3,
            tick: Duration::from_secs(1),
            issue_failure: IssueFailurePolicy::default(),
        }
    }
}
