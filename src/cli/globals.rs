use crate::{
    gateway::HttpGateway,
    session::{FileSessionStore, SessionStore},
};
use anyhow::{Context, Result};
use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use url::Url;

const SESSION_FILE_NAME: &str = "session.json";

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: Url,
    pub session_file: PathBuf,
    pub timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: Url, session_file: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            api_url,
            session_file: session_file.unwrap_or_else(default_session_file),
            timeout,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::new(FileSessionStore::new(&self.session_file))
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn gateway(&self, sessions: Arc<dyn SessionStore>) -> Result<HttpGateway> {
        HttpGateway::new(self.api_url.clone(), sessions, self.timeout)
            .context("failed to build HTTP client")
    }
}

/// `$XDG_CONFIG_HOME/rollcall/session.json`, then `~/.config/rollcall/session.json`.
#[must_use]
pub fn default_session_file() -> PathBuf {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(env!("CARGO_PKG_NAME")).join(SESSION_FILE_NAME)
}
