//! # Rollcall (event check-in console)
//!
//! `rollcall` is the staff-side client for an event registration backend. It
//! signs organizers in with a password followed by a 6-digit code delivered
//! out of band, and it checks participants in by scanning the QR code printed
//! on their registration.
//!
//! ## Layers
//!
//! - [`session`]: the persisted token + profile pair. Written only by the auth
//!   machine after a verified second factor; cleared on logout or when the
//!   backend rejects the token.
//! - [`gateway`]: the single choke point for HTTP calls. It attaches the bearer
//!   token, normalizes backend schema drift into typed records, and packages
//!   every failure as an [`gateway::ApiError`] carrying the HTTP status (`0`
//!   when the network was never reached).
//! - [`auth`]: `Login -> AwaitingCode -> Authenticated` with resend throttling
//!   (3 codes, 120 s cooldown) and a configurable policy for delivery failures.
//! - [`scanner`]: `Idle -> Starting -> Scanning -> Resolving -> ShowingResult`
//!   with exactly one live camera lease at any time.
//!
//! Both machines are driven through `&mut self` by a single owner. Timers run
//! as tokio tasks that only push events into the channel returned by the
//! machine constructor; the owner feeds those events back with `handle`.
//!
//! Secrets (passwords, tokens, codes) travel as `secrecy::SecretString` or
//! short-lived values and must never be logged.

pub mod auth;
pub mod cli;
pub mod errors;
pub mod gateway;
pub mod notify;
pub mod scanner;
pub mod session;
pub mod updates;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{Error, ErrorKind};

pub const GIT_COMMIT_HASH: &str = env!("ROLLCALL_GIT_SHA");

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
