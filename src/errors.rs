//! Crate-wide error type and the failure taxonomy shown to operators.
//!
//! The gateway only packages failures; the state machines decide what a
//! failure means for the flow. [`ErrorKind`] is the shared vocabulary both
//! machines (and the console) use to pick a message.

use crate::{gateway::ApiError, scanner::DeviceError, session::StoreError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Blank or malformed input, rejected before any network call.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// Scanned payload with nothing usable as an identifier.
    #[error("{0}")]
    Decode(String),
    #[error("Incomplete session data: {0}")]
    IncompleteSession(String),
    /// Local resend throttling (attempt cap or cooldown).
    #[error("{0}")]
    Throttled(String),
    /// Operation not available in the current state.
    #[error("{0}")]
    InvalidState(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    RateLimit,
    NotFound,
    Server,
    Transport,
    Device,
    Decode,
    Other,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Throttled(_) | Self::InvalidState(_) => {
                ErrorKind::Validation
            }
            Self::Api(err) => err.kind(),
            Self::Device(_) => ErrorKind::Device,
            Self::Decode(_) => ErrorKind::Decode,
            Self::IncompleteSession(_) | Self::Storage(_) => ErrorKind::Other,
        }
    }

    /// The backend error behind this failure, if any.
    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}
