//! Normalized backend failures.
//!
//! Every failed call becomes an [`ApiError`] carrying the HTTP status (`0` if
//! the request never reached the server), one human-readable message, and the
//! parsed body when there was one. HTML error pages are sniffed and reduced
//! to a synthetic `{ "message": ... }` body so raw markup never reaches the
//! operator.

use crate::errors::ErrorKind;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::OnceLock;

/// Maximum number of error body characters surfaced to the operator.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub body: Option<Value>,
    /// Server-provided retry guidance (`Retry-After` or a body field).
    pub retry_after: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
            retry_after: None,
        }
    }

    /// A failure before any HTTP status was received.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: impl Into<String>) -> Self {
        self.retry_after = Some(retry_after.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            0 => ErrorKind::Transport,
            401 | 403 => ErrorKind::Auth,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RateLimit,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    /// True when the backend rejected the bearer token or the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// True when the message still carries markup from an HTML page.
    #[must_use]
    pub fn looks_like_html(&self) -> bool {
        looks_like_html(&self.message)
    }
}

/// Turns a raw HTTP response into either its JSON body or a normalized error.
///
/// Non-2xx statuses and bodies that are not JSON both fail. An empty body is
/// treated as `{}`.
pub(crate) fn decode_response(
    status: u16,
    reason: &str,
    text: &str,
    retry_after: Option<String>,
) -> Result<Value, ApiError> {
    let success = (200..300).contains(&status);

    match parse_body(status, text) {
        Ok(body) if success => Ok(body),
        Ok(body) => {
            let message = message_from_body(&body).unwrap_or_else(|| status_message(status, reason));
            let retry_after = retry_after.or_else(|| retry_after_from_body(&body));
            let mut err = ApiError::new(status, message).with_body(body);
            err.retry_after = retry_after;
            Err(err)
        }
        Err(synthetic) => {
            let message = if success {
                "Failed to decode response: the server did not return JSON.".to_string()
            } else {
                message_from_body(&synthetic).unwrap_or_else(|| status_message(status, reason))
            };
            let mut err = ApiError::new(status, message).with_body(synthetic);
            err.retry_after = retry_after;
            Err(err)
        }
    }
}

/// Parses a body as JSON; on failure returns a synthetic `{ "message" }` body.
fn parse_body(status: u16, text: &str) -> Result<Value, Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let message = if looks_like_html(trimmed) {
        let error_text = html_error_text(trimmed).unwrap_or_else(|| "Server error".to_string());
        if status == 500 {
            format!("Internal server error ({error_text}). Contact the administrator.")
        } else {
            format!("Error {status}: {error_text}")
        }
    } else {
        truncate(trimmed)
    };

    Err(json!({ "message": message }))
}

/// Extracts the `message` (or `error`) string from a JSON body.
pub(crate) fn message_from_body(body: &Value) -> Option<String> {
    ["message", "error", "mensaje"].iter().find_map(|key| {
        match body.get(*key) {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    })
}

fn retry_after_from_body(body: &Value) -> Option<String> {
    ["retryAfter", "retry_after", "retry_after_seconds"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        })
}

fn status_message(status: u16, reason: &str) -> String {
    if reason.is_empty() {
        format!("Error {status}")
    } else {
        format!("Error {status}: {reason}")
    }
}

fn looks_like_html(text: &str) -> bool {
    let lowered = text.trim_start().to_ascii_lowercase();
    lowered.starts_with("<!doctype") || lowered.contains("<html")
}

fn html_error_text(html: &str) -> Option<String> {
    static PRE: OnceLock<Option<Regex>> = OnceLock::new();
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();

    let pre = PRE.get_or_init(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").ok());
    let title = TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok());

    [pre, title]
        .into_iter()
        .flatten()
        .find_map(|regex| regex.captures(html))
        .and_then(|captures| captures.get(1))
        .map(|found| truncate(found.as_str().trim()))
        .filter(|text| !text.is_empty())
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_success_bodies_pass_through() {
        let body = decode_response(200, "OK", r#"{"success":true}"#, None);
        assert_eq!(body.ok(), Some(json!({"success": true})));
    }

    #[test]
    fn empty_success_body_is_an_empty_object() {
        let body = decode_response(204, "No Content", "  ", None);
        assert_eq!(body.ok(), Some(json!({})));
    }

    #[test]
    fn error_message_comes_from_the_json_message_field() {
        let err = decode_response(
            404,
            "Not Found",
            r#"{"success":false,"message":"Inscripción no encontrada"}"#,
            None,
        )
        .err();
        let err = err.as_ref();
        assert_eq!(err.map(|e| e.status), Some(404));
        assert_eq!(
            err.map(|e| e.message.as_str()),
            Some("Inscripción no encontrada")
        );
        assert_eq!(err.map(ApiError::kind), Some(ErrorKind::NotFound));
        assert!(err.and_then(|e| e.body.as_ref()).is_some());
    }

    #[test]
    fn error_field_is_used_when_message_is_missing() {
        let err = decode_response(400, "Bad Request", r#"{"error":"codigo requerido"}"#, None);
        assert_eq!(err.err().map(|e| e.message), Some("codigo requerido".to_string()));
    }

    #[test]
    fn bare_json_error_falls_back_to_the_status_line() {
        let err = decode_response(502, "Bad Gateway", r#"{"success":false}"#, None);
        assert_eq!(
            err.err().map(|e| e.message),
            Some("Error 502: Bad Gateway".to_string())
        );
    }

    #[test]
    fn html_500_pages_are_reduced_to_their_pre_block() {
        let html = "<!DOCTYPE html><html><head><title>Error</title></head>\
                    <body><pre>TypeError: cannot read id</pre></body></html>";
        let err = decode_response(500, "Internal Server Error", html, None).err();
        let message = err.map(|e| e.message).unwrap_or_default();
        assert_eq!(
            message,
            "Internal server error (TypeError: cannot read id). Contact the administrator."
        );
        assert!(!message.contains("<pre>"));
    }

    #[test]
    fn html_pages_without_pre_use_the_title() {
        let html = "<html><head><title>Bad Gateway</title></head><body></body></html>";
        let err = decode_response(502, "Bad Gateway", html, None).err();
        assert_eq!(
            err.map(|e| e.message),
            Some("Error 502: Bad Gateway".to_string())
        );
    }

    #[test]
    fn html_on_a_success_status_is_still_a_failure() {
        let err = decode_response(200, "OK", "<html><title>Login</title></html>", None).err();
        let err = err.as_ref();
        assert_eq!(err.map(|e| e.status), Some(200));
        assert_eq!(
            err.and_then(|e| e.body.clone()),
            Some(json!({"message": "Error 200: Login"}))
        );
    }

    #[test]
    fn plain_text_errors_are_truncated() {
        let text = "x".repeat(500);
        let err = decode_response(503, "Service Unavailable", &text, None).err();
        assert_eq!(err.map(|e| e.message.chars().count()), Some(MAX_ERROR_CHARS));
    }

    #[test]
    fn retry_guidance_is_kept_from_header_or_body() {
        let err = decode_response(
            429,
            "Too Many Requests",
            r#"{"message":"Demasiados intentos"}"#,
            Some("30".to_string()),
        )
        .err();
        assert_eq!(err.and_then(|e| e.retry_after), Some("30".to_string()));

        let err = decode_response(
            429,
            "Too Many Requests",
            r#"{"message":"Demasiados intentos","retryAfter":45}"#,
            None,
        )
        .err();
        assert_eq!(err.and_then(|e| e.retry_after), Some("45".to_string()));
    }

    #[test]
    fn status_zero_is_a_transport_failure() {
        let err = ApiError::transport("Unable to reach the server");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!err.is_unauthorized());
        assert!(ApiError::new(403, "forbidden").is_unauthorized());
    }
}
