//! QR check-in flow.
//!
//! `Idle -> Starting -> Scanning -> Resolving -> ShowingResult -> Idle`, with
//! `Error -> Idle` after a failed start or lookup.
//!
//! The machine owns the camera exclusively. It holds at most one
//! [`CameraLease`]; every transition away from `Scanning` drops it, and
//! starting again drops the previous one before opening a new session.
//! Frames and reset timers arrive as [`ScannerEvent`]s through the channel
//! returned by [`ScannerMachine::new`], tagged with the scan cycle they
//! belong to. Each start, stop, cancel and decode opens a new cycle, so a
//! frame or timer from an earlier cycle is ignored.

mod camera;
mod config;
mod feed;
pub mod payload;

pub use camera::{
    Camera, CameraDevice, CameraSession, DecodeSettings, DeviceError, FrameOutcome, FrameSink,
    Permission, preferred_device,
};
pub use config::ScannerConfig;
pub use feed::{FeedCamera, FeedSession};

use crate::{
    Error,
    gateway::{ApiError, Gateway, ParticipantRecord},
    notify::Notifier,
};
use camera::CameraLease;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::AbortHandle,
};
use tracing::{debug, info, warn};

pub const DEFAULT_PROMPT: &str = "Press start and point the camera at the participant's QR code.";
const SCANNING_PROMPT: &str = "Scanning… hold the QR code inside the frame.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Starting,
    Scanning,
    Resolving,
    ShowingResult,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Error,
}

/// The single line of feedback shown to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub kind: MessageKind,
}

impl Message {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Info,
        }
    }

    fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Success,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScannerEvent {
    Frame { cycle: u64, outcome: FrameOutcome },
    ResetDue { cycle: u64 },
}

pub struct ScannerMachine<G, C: Camera> {
    gateway: Arc<G>,
    camera: C,
    notifier: Arc<dyn Notifier>,
    config: ScannerConfig,
    state: ScanState,
    message: Message,
    event: Option<String>,
    continuous: bool,
    participant: Option<ParticipantRecord>,
    lease: Option<CameraLease<C::Session>>,
    cycle: u64,
    reset: Option<AbortHandle>,
    events: UnboundedSender<ScannerEvent>,
}

impl<G: Gateway, C: Camera> ScannerMachine<G, C> {
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        camera: C,
        notifier: Arc<dyn Notifier>,
        config: ScannerConfig,
    ) -> (Self, UnboundedReceiver<ScannerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let machine = Self {
            gateway,
            camera,
            notifier,
            config,
            state: ScanState::Idle,
            message: Message::info(DEFAULT_PROMPT),
            event: None,
            continuous: false,
            participant: None,
            lease: None,
            cycle: 0,
            reset: None,
            events,
        };
        (machine, rx)
    }

    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state
    }

    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Participant currently shown, only in `ShowingResult`.
    #[must_use]
    pub fn participant(&self) -> Option<&ParticipantRecord> {
        self.participant.as_ref()
    }

    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    #[must_use]
    pub fn camera_active(&self) -> bool {
        self.lease.is_some()
    }

    /// Selects the event whose registrations are looked up. Changing it
    /// while a scan is in progress stops the scan.
    pub fn set_event(&mut self, collection: Option<String>) {
        let collection = collection
            .map(|collection| collection.trim().to_string())
            .filter(|collection| !collection.is_empty());
        if collection == self.event {
            return;
        }
        if self.state != ScanState::Idle {
            self.stop();
        }
        debug!(event = ?collection, "event selected");
        self.event = collection;
    }

    /// Continuous mode reopens the camera after each result.
    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    /// Opens the camera for a new scan cycle.
    /// # Errors
    /// Returns [`Error::Validation`] without touching the camera when no event
    /// is selected, or the [`DeviceError`] that moved the machine to `Error`.
    pub async fn start(&mut self) -> Result<(), Error> {
        let Some(event) = self.event.clone() else {
            let err = Error::Validation("Select an event before scanning.".to_string());
            self.message = Message::error(err.to_string());
            return Err(err);
        };

        self.teardown();
        self.state = ScanState::Starting;
        self.message = Message::info("Starting camera…");

        match self.acquire().await {
            Ok(lease) => {
                self.lease = Some(lease);
                self.state = ScanState::Scanning;
                self.message = Message::info(SCANNING_PROMPT);
                info!(event = %event, cycle = self.cycle, "scanner started");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "camera could not be started");
                self.state = ScanState::Error;
                self.message = Message::error(err.to_string());
                self.notifier.notify_error(&err.to_string());
                Err(err.into())
            }
        }
    }

    /// Feeds back a frame or timer event.
    /// # Errors
    /// Returns the lookup or restart failure that moved the machine to
    /// `Error`. The caller should pass API errors on to the auth machine.
    pub async fn handle(&mut self, event: ScannerEvent) -> Result<(), Error> {
        match event {
            ScannerEvent::Frame { cycle, outcome } => {
                if cycle != self.cycle || self.state != ScanState::Scanning {
                    return Ok(());
                }
                match outcome {
                    FrameOutcome::Missed => Ok(()),
                    FrameOutcome::Decoded(text) => self.resolve(&text).await,
                }
            }
            ScannerEvent::ResetDue { cycle } => {
                if cycle != self.cycle
                    || !matches!(self.state, ScanState::Error | ScanState::ShowingResult)
                {
                    return Ok(());
                }
                self.reset = None;
                self.to_idle();
                if self.continuous {
                    debug!("continuous mode, restarting scanner");
                    self.start().await
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Marks the shown participant as attended.
    /// # Errors
    /// Returns an error if nothing is shown, the participant already
    /// attended, or the backend rejected the change.
    pub async fn confirm(&mut self) -> Result<(), Error> {
        if self.state != ScanState::ShowingResult {
            return Err(Error::InvalidState("There is no participant to confirm.".to_string()));
        }
        let (Some(participant), Some(event)) = (self.participant.clone(), self.event.clone())
        else {
            return Err(Error::InvalidState("There is no participant to confirm.".to_string()));
        };
        if participant.attended {
            let err = Error::Validation(format!(
                "{} is already checked in.",
                display_name(&participant)
            ));
            self.message = Message::error(err.to_string());
            return Err(err);
        }

        let cycle = self.cycle;
        let result = self
            .gateway
            .set_attendance(&participant.id, &event, true)
            .await;
        if cycle != self.cycle {
            return Ok(());
        }

        let err = match result {
            Ok(ack) if ack.success => {
                if let Some(shown) = self.participant.as_mut() {
                    shown.attended = true;
                }
                let text = ack.message.unwrap_or_else(|| {
                    format!("Attendance registered for {}", display_name(&participant))
                });
                info!(participant = %participant.id, event = %event, "attendance registered");
                self.notifier.notify_success(&text);
                self.message = Message::success(text);
                self.schedule_reset(self.config.confirm_reset);
                return Ok(());
            }
            Ok(ack) => ApiError::new(
                400,
                ack.message
                    .unwrap_or_else(|| "Attendance could not be registered.".to_string()),
            ),
            Err(err) => err,
        };

        warn!(participant = %participant.id, status = err.status, "attendance update failed");
        self.message = Message::error(format!("Error: {}", err.message));
        self.notifier.notify_error(&err.message);
        Err(err.into())
    }

    /// Discards the shown result and returns to the idle prompt.
    pub fn cancel(&mut self) {
        self.teardown();
        self.to_idle();
    }

    /// Stops scanning. Safe to call in any state, including `Idle`.
    pub fn stop(&mut self) {
        if self.state == ScanState::Idle && self.lease.is_none() && self.reset.is_none() {
            return;
        }
        self.teardown();
        self.to_idle();
        debug!("scanner stopped");
    }

    /// Unconditional teardown for when the owner goes away.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.state = ScanState::Idle;
    }

    async fn acquire(&self) -> Result<CameraLease<C::Session>, DeviceError> {
        let permission = match self.camera.permission().await? {
            Permission::Prompt => self.camera.request_permission().await?,
            decided => decided,
        };
        if permission != Permission::Granted {
            return Err(DeviceError::PermissionDenied);
        }

        let devices = self.camera.devices().await?;
        let device = preferred_device(&devices).ok_or(DeviceError::NoCamera)?;
        let sink = FrameSink::new(self.cycle, self.events.clone());
        let session = self
            .camera
            .open(device, self.config.decode, sink)
            .await?;
        Ok(CameraLease::new(session, device))
    }

    async fn resolve(&mut self, text: &str) -> Result<(), Error> {
        // One decode per cycle: later frames of this cycle are now stale.
        self.lease = None;
        self.cycle += 1;
        self.state = ScanState::Resolving;
        self.message = Message::info("Looking up registration…");

        let Some(id) = payload::identifier(text) else {
            return Err(self.fail(Error::Decode(
                "The scanned code is empty. Try again.".to_string(),
            )));
        };
        debug!(id = %id, "payload decoded");

        let cycle = self.cycle;
        let result = self
            .gateway
            .find_participant(&id, self.event.as_deref())
            .await;
        if cycle != self.cycle || self.state != ScanState::Resolving {
            return Ok(());
        }

        let err = match result {
            Ok(lookup) if lookup.success && lookup.participant.is_some() => {
                let Some(participant) = lookup.participant else {
                    return Ok(());
                };
                let text = if participant.attended {
                    format!("{} is already checked in.", display_name(&participant))
                } else {
                    format!("Registration found: {}", display_name(&participant))
                };
                info!(participant = %participant.id, attended = participant.attended, "registration found");
                self.participant = Some(participant);
                self.state = ScanState::ShowingResult;
                self.message = Message::info(text);
                return Ok(());
            }
            Ok(lookup) => ApiError::new(
                404,
                lookup
                    .message
                    .unwrap_or_else(|| "Registration not found".to_string()),
            ),
            Err(err) => err,
        };

        Err(self.fail(err.into()))
    }

    /// Moves to `Error` and schedules the automatic return to idle.
    fn fail(&mut self, err: Error) -> Error {
        warn!(kind = ?err.kind(), error = %err, "scan failed");
        self.participant = None;
        self.state = ScanState::Error;
        self.message = Message::error(format!("Error: {err}"));
        self.notifier.notify_error(&err.to_string());
        self.schedule_reset(self.config.error_reset);
        err
    }

    fn schedule_reset(&mut self, delay: Duration) {
        self.cancel_reset();
        let cycle = self.cycle;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ScannerEvent::ResetDue { cycle });
        });
        self.reset = Some(task.abort_handle());
    }

    fn cancel_reset(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset.abort();
        }
    }

    /// Releases the camera, pending timers and the shown record.
    fn teardown(&mut self) {
        self.lease = None;
        self.cancel_reset();
        self.participant = None;
        self.cycle += 1;
    }

    fn to_idle(&mut self) {
        self.participant = None;
        self.state = ScanState::Idle;
        self.message = Message::info(DEFAULT_PROMPT);
    }
}

impl<G, C: Camera> Drop for ScannerMachine<G, C> {
    fn drop(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset.abort();
        }
        self.lease = None;
    }
}

fn display_name(participant: &ParticipantRecord) -> &str {
    if participant.name.is_empty() {
        &participant.id
    } else {
        &participant.name
    }
}
