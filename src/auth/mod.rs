//! Two-factor sign-in flow.
//!
//! `Login -> AwaitingCode -> Authenticated`, with `AwaitingCode -> Login` on
//! abort. Under [`IssueFailurePolicy::Remediate`] a provider failure while
//! issuing the code parks the flow in `DeliveryProblem` instead of dropping
//! the challenge.
//!
//! The machine is the only writer of the [`Session`]. Other components that
//! see a 401/403 report it through [`AuthMachine::on_api_error`].
//!
//! Resend cooldown ticks come from a tokio task that only sends
//! [`AuthEvent::CooldownTick`] into the channel returned by
//! [`AuthMachine::new`]; the owner feeds them back through
//! [`AuthMachine::handle`]. Each challenge bumps a generation number so ticks
//! queued for an older challenge are ignored.

mod config;
pub mod messages;

pub use config::{AuthConfig, IssueFailurePolicy};

use crate::{
    Error, ErrorKind,
    gateway::{ApiError, Gateway},
    notify::Notifier,
    session::{Profile, Session, SessionStore},
};
use messages::Step;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::AbortHandle,
    time::{Instant, interval_at},
};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    Login,
    AwaitingCode,
    /// Code issuance failed at the provider; only reachable with
    /// [`IssueFailurePolicy::Remediate`].
    DeliveryProblem,
    Authenticated,
}

/// Challenge in progress between the password and code steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAuth {
    pub user_id: String,
    /// Profile captured from the login response, used when the verify
    /// response carries none.
    pub profile: Option<Profile>,
    pub phone_hint: Option<String>,
    /// Codes issued for this challenge, the first one included.
    pub resend_count: u32,
    pub resend_cooldown_seconds: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    CooldownTick { generation: u64 },
}

pub struct AuthMachine<G> {
    gateway: Arc<G>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    config: AuthConfig,
    state: AuthState,
    username: String,
    pending: Option<PendingAuth>,
    profile: Option<Profile>,
    error: Option<String>,
    generation: u64,
    ticker: Option<AbortHandle>,
    events: UnboundedSender<AuthEvent>,
}

impl<G: Gateway> AuthMachine<G> {
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> (Self, UnboundedReceiver<AuthEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let machine = Self {
            gateway,
            sessions,
            notifier,
            config,
            state: AuthState::Login,
            username: String::new(),
            pending: None,
            profile: None,
            error: None,
            generation: 0,
            ticker: None,
            events,
        };
        (machine, rx)
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingAuth> {
        self.pending.as_ref()
    }

    /// Current error message, if the last operation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Last submitted username; kept across abort for re-display.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Profile of the signed-in organizer.
    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn cooldown_remaining(&self) -> u64 {
        self.pending
            .as_ref()
            .map_or(0, |pending| pending.resend_cooldown_seconds)
    }

    /// True when a resend would be attempted rather than rejected locally.
    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| {
            pending.resend_count < self.config.max_resends && pending.resend_cooldown_seconds == 0
        })
    }

    /// Existing-session check. A stored token is probed against the
    /// backend; a rejected token is cleared silently.
    pub async fn restore(&mut self) -> bool {
        let session = match self.sessions.load() {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(err) => {
                warn!(error = %err, "stored session unreadable, discarding");
                self.discard_session();
                return false;
            }
        };

        match self.gateway.probe().await {
            Ok(()) => {
                info!(user = %session.profile().id, "stored session is valid");
                self.profile = Some(session.profile().clone());
                self.state = AuthState::Authenticated;
                self.error = None;
                true
            }
            Err(err) => {
                debug!(status = err.status, "stored session rejected by probe");
                self.discard_session();
                false
            }
        }
    }

    /// Password step. On success a code is requested for the resolved user.
    /// # Errors
    /// Returns the failure that was also stored as the current error message.
    pub async fn submit_credentials(
        &mut self,
        username: &str,
        password: SecretString,
    ) -> Result<(), Error> {
        if self.state != AuthState::Login {
            return Err(Error::InvalidState(
                "Credentials can only be submitted from the login step.".to_string(),
            ));
        }
        self.error = None;

        let username = username.trim();
        if username.is_empty() || password.expose_secret().trim().is_empty() {
            return Err(self.fail(
                Error::Validation(messages::MISSING_FIELDS.to_string()),
                Step::Credentials,
            ));
        }
        self.username = username.to_string();

        info!(username, "submitting credentials");
        let result = self.gateway.login(username, &password).await;
        drop(password);

        let outcome = match result {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| messages::INVALID_CREDENTIALS.to_string());
                return Err(self.fail(ApiError::new(401, message).into(), Step::Credentials));
            }
            Err(err) => return Err(self.fail(err.into(), Step::Credentials)),
        };

        let Some(profile) = outcome.profile else {
            return Err(self.fail(
                Error::IncompleteSession("the login response has no user identifier".to_string()),
                Step::Credentials,
            ));
        };

        self.pending = Some(PendingAuth {
            user_id: profile.id.clone(),
            profile: Some(profile),
            phone_hint: outcome.phone_hint,
            resend_count: 0,
            resend_cooldown_seconds: 0,
        });
        self.request_code().await
    }

    /// Code step. Only six ASCII digits are sent to the backend.
    /// # Errors
    /// Returns the failure that was also stored as the current error message.
    pub async fn submit_code(&mut self, code: &str) -> Result<(), Error> {
        if self.state != AuthState::AwaitingCode {
            return Err(Error::InvalidState(
                "There is no verification code pending.".to_string(),
            ));
        }
        self.error = None;

        let code = code.trim();
        if !is_valid_code(code) {
            return Err(self.fail(
                Error::Validation(messages::INVALID_CODE_FORMAT.to_string()),
                Step::Verify,
            ));
        }

        let Some(user_id) = self.pending.as_ref().map(|pending| pending.user_id.clone()) else {
            return Err(Error::InvalidState("There is no verification code pending.".to_string()));
        };

        let outcome = match self.gateway.verify_code(&user_id, code).await {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| messages::INVALID_CODE.to_string());
                return Err(self.fail(ApiError::new(401, message).into(), Step::Verify));
            }
            Err(err) => return Err(self.fail(err.into(), Step::Verify)),
        };

        let profile = outcome
            .profile
            .or_else(|| self.pending.as_ref().and_then(|pending| pending.profile.clone()))
            .unwrap_or_else(|| Profile {
                id: user_id.clone(),
                display_name: self.username.clone(),
                phone: None,
            });

        let Some(session) = outcome.token.and_then(|token| Session::new(token, profile)) else {
            return Err(self.fail(
                Error::IncompleteSession("the verification response has no token".to_string()),
                Step::Verify,
            ));
        };

        if let Err(err) = self.sessions.save(&session) {
            return Err(self.fail(err.into(), Step::Verify));
        }

        self.stop_ticker();
        self.pending = None;
        self.error = None;
        self.state = AuthState::Authenticated;
        self.profile = Some(session.profile().clone());

        info!(user = %session.profile().id, "signed in");
        self.notifier
            .notify_success(&format!("Welcome, {}", session.profile().display_name));
        Ok(())
    }

    /// Requests another code, subject to the attempt cap and cooldown.
    /// # Errors
    /// Returns [`Error::Throttled`] without calling the backend when a new
    /// code is not allowed yet, or the issuance failure.
    pub async fn resend_code(&mut self) -> Result<(), Error> {
        if self.state != AuthState::AwaitingCode {
            return Err(Error::InvalidState(
                "There is no verification code pending.".to_string(),
            ));
        }
        self.check_resend_allowed()?;
        self.request_code().await
    }

    /// Re-issues the code after a delivery failure.
    /// # Errors
    /// Returns [`Error::Throttled`] once the attempt cap is reached, or the
    /// issuance failure.
    pub async fn retry_delivery(&mut self) -> Result<(), Error> {
        if self.state != AuthState::DeliveryProblem {
            return Err(Error::InvalidState("There is no failed delivery to retry.".to_string()));
        }
        self.check_resend_allowed()?;
        self.request_code().await
    }

    /// Drops the pending challenge and goes back to the credentials step.
    /// The username stays for re-display.
    pub fn abort(&mut self) {
        if !matches!(
            self.state,
            AuthState::AwaitingCode | AuthState::DeliveryProblem
        ) {
            return;
        }
        self.stop_ticker();
        self.pending = None;
        self.error = None;
        self.state = AuthState::Login;
        debug!("challenge aborted");
    }

    /// Clears the session and returns to the credentials step.
    /// # Errors
    /// Returns an error if the session store cannot be cleared; the machine
    /// is back at `Login` either way.
    pub fn logout(&mut self) -> Result<(), Error> {
        self.stop_ticker();
        self.pending = None;
        self.profile = None;
        self.error = None;
        self.state = AuthState::Login;

        self.sessions.clear()?;
        info!("signed out");
        Ok(())
    }

    /// Reaction to a backend error seen elsewhere. A 401/403 while signed in
    /// ends the session. Returns true if it did.
    pub fn on_api_error(&mut self, err: &ApiError) -> bool {
        if self.state != AuthState::Authenticated || !err.is_unauthorized() {
            return false;
        }
        warn!(status = err.status, "backend rejected the session");
        if let Err(err) = self.logout() {
            warn!(error = %err, "failed to clear rejected session");
        }
        self.error = Some(messages::SESSION_EXPIRED.to_string());
        self.notifier.notify_warning(messages::SESSION_EXPIRED);
        true
    }

    pub fn handle(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::CooldownTick { generation } => {
                if generation != self.generation {
                    return;
                }
                let remaining = match self.pending.as_mut() {
                    Some(pending) => {
                        pending.resend_cooldown_seconds =
                            pending.resend_cooldown_seconds.saturating_sub(1);
                        pending.resend_cooldown_seconds
                    }
                    None => 0,
                };
                if remaining == 0 {
                    self.stop_ticker();
                }
            }
        }
    }

    fn check_resend_allowed(&mut self) -> Result<(), Error> {
        let (count, cooldown) = self
            .pending
            .as_ref()
            .map_or((0, 0), |pending| (pending.resend_count, pending.resend_cooldown_seconds));

        let rejection = if count >= self.config.max_resends {
            Some("Maximum number of codes reached. Start over to request a new one.".to_string())
        } else if cooldown > 0 {
            Some(format!("Wait {cooldown} seconds before requesting a new code."))
        } else {
            None
        };

        match rejection {
            Some(message) => {
                self.error = Some(message.clone());
                Err(Error::Throttled(message))
            }
            None => Ok(()),
        }
    }

    async fn request_code(&mut self) -> Result<(), Error> {
        let Some(user_id) = self.pending.as_ref().map(|pending| pending.user_id.clone()) else {
            return Err(Error::InvalidState("There is no user to send a code to.".to_string()));
        };

        let result = self.gateway.request_code(&user_id).await;
        let err: ApiError = match result {
            Ok(ack) if ack.success => {
                let hint = self.issued();
                self.notifier.notify_success(&match hint {
                    Some(hint) => format!("Verification code sent to {hint}"),
                    None => "Verification code sent".to_string(),
                });
                return Ok(());
            }
            Ok(ack) => ApiError::new(
                502,
                ack.message
                    .unwrap_or_else(|| "The verification code could not be sent.".to_string()),
            ),
            Err(err) => err,
        };

        let remediate = self.config.issue_failure == IssueFailurePolicy::Remediate
            && err.kind() == ErrorKind::Server;
        let failure = self.fail(err.into(), Step::Issue);

        self.stop_ticker();
        if remediate {
            if let Some(pending) = self.pending.as_mut() {
                pending.resend_cooldown_seconds = 0;
            }
            self.state = AuthState::DeliveryProblem;
        } else {
            self.pending = None;
            self.state = AuthState::Login;
        }
        Err(failure)
    }

    /// Applies a successful issuance; returns the phone hint to display.
    fn issued(&mut self) -> Option<String> {
        let cooldown = self.config.resend_cooldown;
        let pending = self.pending.as_mut()?;
        pending.resend_count += 1;
        pending.resend_cooldown_seconds = cooldown;
        let count = pending.resend_count;
        let user_id = pending.user_id.clone();
        let hint = pending.phone_hint.clone();

        self.state = AuthState::AwaitingCode;
        self.error = None;
        info!(user = %user_id, count, "verification code issued");
        if cooldown > 0 {
            self.start_ticker();
        } else {
            self.stop_ticker();
        }
        hint
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        self.generation += 1;
        let generation = self.generation;
        let period = self.config.tick;
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if events.send(AuthEvent::CooldownTick { generation }).is_err() {
                    break;
                }
            }
        });
        self.ticker = Some(task.abort_handle());
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        // Ticks already queued belong to a finished cooldown.
        self.generation += 1;
    }

    fn discard_session(&mut self) {
        if let Err(err) = self.sessions.clear() {
            warn!(error = %err, "failed to clear stored session");
        }
        self.profile = None;
        self.state = AuthState::Login;
    }

    fn fail(&mut self, err: Error, step: Step) -> Error {
        let message = messages::describe(&err, step);
        warn!(kind = ?err.kind(), "{message}");
        self.notifier.notify_error(&message);
        self.error = Some(message);
        err
    }
}

impl<G> Drop for AuthMachine<G> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

fn is_valid_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|byte| byte.is_ascii_digit())
}
