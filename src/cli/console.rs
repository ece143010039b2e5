//! Terminal plumbing shared by the interactive actions: a stdin line feed,
//! the notice bus, and the signed-in context for backend commands.
//!
//! Stdin is only read on request, so a secret prompt can switch the terminal
//! to no-echo without racing a line read already in flight.

use crate::{
    auth::{AuthConfig, AuthMachine, messages},
    cli::globals::GlobalArgs,
    gateway::{ApiError, HttpGateway},
    notify::{BroadcastNotifier, Notice, NoticeLevel, Notifier},
};
use anyhow::{Result, anyhow, bail};
use secrecy::SecretString;
use std::{
    io::{self, BufRead, IsTerminal, Write},
    sync::{Arc, mpsc as std_mpsc},
    thread,
};
use tokio::sync::{
    broadcast::{self, error::TryRecvError},
    mpsc::{self, UnboundedReceiver},
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Request {
    Line,
    Secret,
}

pub(crate) struct Console {
    bus: BroadcastNotifier,
    notices: broadcast::Receiver<Notice>,
    requests: std_mpsc::Sender<Request>,
    lines: UnboundedReceiver<String>,
    // A request was sent and its line has not been received yet.
    pending: bool,
}

impl Console {
    pub(crate) fn new() -> Self {
        let bus = BroadcastNotifier::new();
        let notices = bus.subscribe();
        let (requests, lines) = stdin_reader();
        Self {
            bus,
            notices,
            requests,
            lines,
            pending: false,
        }
    }

    pub(crate) fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::new(self.bus.clone())
    }

    /// Prints pending notices to stderr. Returns true if one of them was an
    /// error, so the caller does not report the same failure twice.
    pub(crate) fn flush_notices(&mut self) -> bool {
        let mut saw_error = false;
        loop {
            match self.notices.try_recv() {
                Ok(notice) => {
                    saw_error |= notice.level == NoticeLevel::Error;
                    eprintln!("{}", render(&notice));
                }
                Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "notices dropped"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return saw_error,
            }
        }
    }

    /// Next line typed by the operator, `None` once stdin is closed.
    /// Cancel safe: a line that arrives after the caller gave up is kept for
    /// the next call.
    pub(crate) async fn next_line(&mut self) -> Option<String> {
        self.read(Request::Line).await
    }

    /// # Errors
    /// Returns an error if stdin is closed before a line arrives.
    pub(crate) async fn secret(&mut self, label: &str) -> Result<SecretString> {
        prompt_label(label);
        self.read(Request::Secret)
            .await
            .map(SecretString::from)
            .ok_or_else(|| anyhow!("input closed"))
    }

    async fn read(&mut self, request: Request) -> Option<String> {
        if !self.pending {
            self.requests.send(request).ok()?;
            self.pending = true;
        }
        let line = self.lines.recv().await;
        self.pending = false;
        line
    }

    /// # Errors
    /// Returns an error if stdin is closed before a line arrives.
    pub(crate) async fn prompt(&mut self, label: &str) -> Result<String> {
        prompt_label(label);
        self.next_line()
            .await
            .ok_or_else(|| anyhow!("input closed"))
    }
}

pub(crate) fn prompt_label(label: &str) {
    eprint!("{label}");
    let _ = io::stderr().flush();
}

fn render(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Success => format!("✔ {}", notice.message),
        NoticeLevel::Error => format!("✖ {}", notice.message),
        NoticeLevel::Warning => format!("! {}", notice.message),
        NoticeLevel::Info => format!("· {}", notice.message),
    }
}

/// Stdin is read on a plain thread: a blocking read parked in the tokio
/// blocking pool would keep the runtime from shutting down.
fn stdin_reader() -> (std_mpsc::Sender<Request>, UnboundedReceiver<String>) {
    let (requests, incoming) = std_mpsc::channel();
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        let hidden = stdin.is_terminal();
        for request in incoming {
            let line = match request {
                Request::Line => read_line(&mut stdin.lock()).map(|line| line.trim().to_string()),
                Request::Secret if hidden => rpassword::read_password()
                    .ok()
                    .or_else(|| read_line(&mut stdin.lock())),
                Request::Secret => read_line(&mut stdin.lock()),
            };
            let Some(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    (requests, rx)
}

/// One line without its terminator, `None` at end of input.
fn read_line(reader: &mut impl BufRead) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let end = line.trim_end_matches(&['\r', '\n'][..]).len();
            line.truncate(end);
            Some(line)
        }
    }
}

/// A gateway whose stored session was accepted by the backend.
pub(crate) struct SignedIn {
    pub(crate) gateway: Arc<HttpGateway>,
    pub(crate) auth: AuthMachine<HttpGateway>,
}

impl SignedIn {
    /// # Errors
    /// Returns an error if there is no session or the backend rejected it.
    pub(crate) async fn restore(globals: &GlobalArgs, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let sessions = globals.sessions();
        let gateway = Arc::new(globals.gateway(Arc::clone(&sessions))?);
        // Cooldown ticks only exist during login; nothing listens here.
        let (mut auth, _ticks) = AuthMachine::new(
            Arc::clone(&gateway),
            sessions,
            notifier,
            AuthConfig::default(),
        );
        if !auth.restore().await {
            bail!("Not signed in. Run `rollcall login` first.");
        }
        Ok(Self { gateway, auth })
    }

    /// Turns a backend failure into the operator-facing error, ending the
    /// session first when the backend rejected it.
    pub(crate) fn rejected(&mut self, err: ApiError) -> anyhow::Error {
        if self.auth.on_api_error(&err) {
            return anyhow!(messages::SESSION_EXPIRED);
        }
        anyhow::Error::new(err)
    }
}
