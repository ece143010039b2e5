//! Operator-facing wording for sign-in failures.

use crate::{Error, ErrorKind, gateway::ApiError};

pub const MISSING_FIELDS: &str = "Please fill in both username and password.";
pub const INVALID_CODE_FORMAT: &str = "Enter the 6-digit code you received.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials. Check your username and password.";
pub const INVALID_CODE: &str = "Invalid or expired code. Check it and try again.";
pub const NETWORK: &str =
    "Unable to connect to the server. Check your connection or contact the administrator.";
pub const NOT_FOUND: &str = "Service not found. Contact the administrator.";
pub const SERVER: &str = "Server error. Try again later or contact the administrator.";
pub const GENERIC: &str = "Connection error. Please try again.";
pub const SESSION_EXPIRED: &str = "Your session expired. Sign in again.";

/// Which sign-in call produced the failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Credentials,
    Issue,
    Verify,
}

/// One message per failure; it replaces whatever was shown before.
#[must_use]
pub fn describe(err: &Error, step: Step) -> String {
    match err {
        Error::Api(api) => describe_api(api, step),
        Error::Storage(err) => format!("Could not save the session: {err}"),
        other => other.to_string(),
    }
}

fn describe_api(err: &ApiError, step: Step) -> String {
    let server_message = usable_message(err);

    match err.kind() {
        ErrorKind::Auth if step == Step::Verify => {
            server_message.unwrap_or_else(|| INVALID_CODE.to_string())
        }
        ErrorKind::Auth => INVALID_CREDENTIALS.to_string(),
        // Retry-After may also be an HTTP date; only delta-seconds get the countdown wording.
        ErrorKind::RateLimit => match err
            .retry_after
            .as_deref()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            Some(seconds) => format!("Too many attempts. Try again in {seconds} seconds."),
            None => server_message
                .unwrap_or_else(|| "Too many attempts. Wait a moment and try again.".to_string()),
        },
        ErrorKind::Transport => NETWORK.to_string(),
        ErrorKind::NotFound => NOT_FOUND.to_string(),
        ErrorKind::Server => server_message.unwrap_or_else(|| SERVER.to_string()),
        _ if step == Step::Verify => server_message.unwrap_or_else(|| INVALID_CODE.to_string()),
        _ => server_message.unwrap_or_else(|| GENERIC.to_string()),
    }
}

/// The backend's own wording, unless it is empty or still looks like markup.
fn usable_message(err: &ApiError) -> Option<String> {
    let message = err.message.trim();
    if message.is_empty() || err.looks_like_html() {
        None
    } else {
        Some(message.to_string())
    }
}
