//! Operator notifications.
//!
//! Components report user-facing outcomes through a [`Notifier`] handed to
//! them at construction instead of reaching for a global. The console
//! subscribes to a [`BroadcastNotifier`]; headless embeddings can use
//! [`TracingNotifier`], which only logs.

use std::fmt;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use ulid::Ulid;

/// Notices kept for slow subscribers before the oldest are dropped.
const BUS_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: Ulid,
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            level,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn notify_success(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Success, message));
    }

    fn notify_error(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Error, message));
    }

    fn notify_warning(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Warning, message));
    }

    fn notify_info(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Info, message));
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => error!(id = %notice.id, "{}", notice.message),
            NoticeLevel::Warning => warn!(id = %notice.id, "{}", notice.message),
            NoticeLevel::Success | NoticeLevel::Info => {
                info!(id = %notice.id, level = %notice.level, "{}", notice.message);
            }
        }
    }
}

/// Fan-out bus. Notices sent while nobody listens are dropped.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notice: Notice) {
        // Err only means there are no subscribers right now.
        let _ = self.sender.send(notice);
    }
}
