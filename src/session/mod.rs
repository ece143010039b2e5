//! Staff session persistence.
//!
//! A session is the bearer token plus the profile of the organizer it was
//! issued to. The pair is written and cleared as one unit: a [`Session`]
//! cannot exist with an empty token, and stores only ever persist whole
//! sessions. Only the auth machine writes sessions; the gateway reads the
//! token to decide whether to attach it.
//!
//! Tokens are `SecretString`s and are redacted from `Debug` output.

mod file;

pub use file::FileSessionStore;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, sync::Mutex};

/// Organizer profile captured at login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct Session {
    token: SecretString,
    profile: Profile,
}

impl Session {
    /// Pairs a token with its profile. Returns `None` for a blank token.
    #[must_use]
    pub fn new(token: SecretString, profile: Profile) -> Option<Self> {
        if token.expose_secret().trim().is_empty() {
            return None;
        }
        Some(Self { token, profile })
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("profile", &self.profile)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Storage for the single active session.
pub trait SessionStore: Send + Sync {
    /// Returns the stored session, `None` when signed out.
    /// # Errors
    /// Returns an error if the backing storage cannot be read or parsed.
    fn load(&self) -> Result<Option<Session>, StoreError>;

    /// Replaces the stored session.
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Removes the stored session. Clearing an empty store is not an error.
    /// # Errors
    /// Returns an error if the backing storage cannot be removed.
    fn clear(&self) -> Result<(), StoreError>;

    /// Token to attach to outgoing requests, if any.
    fn token(&self) -> Option<SecretString> {
        self.load()
            .ok()
            .flatten()
            .map(|session| session.token().clone())
    }
}

/// Process-local store, used by tests and short-lived embeddings.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}
