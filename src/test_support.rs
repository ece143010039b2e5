//! In-memory doubles for the gateway, the camera and the notifier.

#![allow(clippy::unwrap_used)]

use crate::{
    gateway::{
        Acknowledgement, Activity, ApiError, Gateway, LoginOutcome, Lookup, ParticipantRecord,
        Stats, Update, VerifyOutcome,
    },
    notify::{Notice, NoticeLevel, Notifier},
    scanner::{Camera, CameraDevice, CameraSession, DecodeSettings, DeviceError, FrameSink, Permission},
};
use secrecy::SecretString;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Replies returned in order; an empty script answers with a 500.
pub struct Script<T>(Mutex<VecDeque<Result<T, ApiError>>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T> Script<T> {
    pub fn push(&self, reply: Result<T, ApiError>) {
        self.0.lock().unwrap().push_back(reply);
    }

    fn next(&self, call: &str) -> Result<T, ApiError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::new(500, format!("unscripted call: {call}"))))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Login { username: String },
    RequestCode { user_id: String },
    VerifyCode { user_id: String, code: String },
    Activities,
    Probe,
    FindParticipant { id: String, collection: Option<String> },
    SetAttendance { id: String, collection: String, attended: bool },
    Registrations { collection: String },
    Stats { collection: String },
    Updates { collection: String, since: u64 },
}

#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    pub login: Script<LoginOutcome>,
    pub request_code: Script<Acknowledgement>,
    pub verify_code: Script<VerifyOutcome>,
    pub activities: Script<Vec<Activity>>,
    pub probe: Script<()>,
    pub find_participant: Script<Lookup>,
    pub set_attendance: Script<Acknowledgement>,
    pub registrations: Script<Vec<ParticipantRecord>>,
    pub stats: Script<Stats>,
    pub updates: Script<Vec<Update>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Gateway for FakeGateway {
    async fn login(&self, username: &str, _password: &SecretString) -> Result<LoginOutcome, ApiError> {
        self.record(Call::Login {
            username: username.to_string(),
        });
        self.login.next("login")
    }

    async fn request_code(&self, user_id: &str) -> Result<Acknowledgement, ApiError> {
        self.record(Call::RequestCode {
            user_id: user_id.to_string(),
        });
        self.request_code.next("request_code")
    }

    async fn verify_code(&self, user_id: &str, code: &str) -> Result<VerifyOutcome, ApiError> {
        self.record(Call::VerifyCode {
            user_id: user_id.to_string(),
            code: code.to_string(),
        });
        self.verify_code.next("verify_code")
    }

    async fn activities(&self) -> Result<Vec<Activity>, ApiError> {
        self.record(Call::Activities);
        self.activities.next("activities")
    }

    async fn probe(&self) -> Result<(), ApiError> {
        self.record(Call::Probe);
        self.probe.next("probe")
    }

    async fn find_participant(&self, id: &str, collection: Option<&str>) -> Result<Lookup, ApiError> {
        self.record(Call::FindParticipant {
            id: id.to_string(),
            collection: collection.map(str::to_string),
        });
        self.find_participant.next("find_participant")
    }

    async fn set_attendance(
        &self,
        id: &str,
        collection: &str,
        attended: bool,
    ) -> Result<Acknowledgement, ApiError> {
        self.record(Call::SetAttendance {
            id: id.to_string(),
            collection: collection.to_string(),
            attended,
        });
        self.set_attendance.next("set_attendance")
    }

    async fn registrations(&self, collection: &str) -> Result<Vec<ParticipantRecord>, ApiError> {
        self.record(Call::Registrations {
            collection: collection.to_string(),
        });
        self.registrations.next("registrations")
    }

    async fn stats(&self, collection: &str) -> Result<Stats, ApiError> {
        self.record(Call::Stats {
            collection: collection.to_string(),
        });
        self.stats.next("stats")
    }

    async fn updates(&self, collection: &str, since: u64) -> Result<Vec<Update>, ApiError> {
        self.record(Call::Updates {
            collection: collection.to_string(),
            since,
        });
        self.updates.next("updates")
    }
}

struct CameraState {
    permission: Permission,
    after_prompt: Permission,
    devices: Vec<CameraDevice>,
    sinks: Vec<FrameSink>,
    opened: Vec<String>,
    settings: Vec<DecodeSettings>,
}

/// Camera whose sessions only count themselves. Clones share state, so a
/// test keeps one handle while the machine owns another.
#[derive(Clone)]
pub struct FakeCamera {
    state: Arc<Mutex<CameraState>>,
    live: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn new(permission: Permission, devices: &[(&str, &str)]) -> Self {
        let devices = devices
            .iter()
            .map(|(id, label)| CameraDevice {
                id: (*id).to_string(),
                label: (*label).to_string(),
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(CameraState {
                permission,
                after_prompt: Permission::Granted,
                devices,
                sinks: Vec::new(),
                opened: Vec::new(),
                settings: Vec::new(),
            })),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Granted, with a front and a rear camera.
    pub fn granted() -> Self {
        Self::new(
            Permission::Granted,
            &[("front", "Front Camera"), ("rear", "Back Camera")],
        )
    }

    pub fn answer_prompt_with(self, permission: Permission) -> Self {
        self.state.lock().unwrap().after_prompt = permission;
        self
    }

    /// Sessions opened and not yet closed.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn settings(&self) -> Vec<DecodeSettings> {
        self.state.lock().unwrap().settings.clone()
    }

    /// Sink handed to the most recent session.
    pub fn sink(&self) -> FrameSink {
        self.state.lock().unwrap().sinks.last().cloned().unwrap()
    }

    pub fn sink_at(&self, index: usize) -> FrameSink {
        self.state.lock().unwrap().sinks[index].clone()
    }
}

pub struct FakeSession {
    live: Arc<AtomicUsize>,
    closed: bool,
}

impl CameraSession for FakeSession {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Camera for FakeCamera {
    type Session = FakeSession;

    async fn permission(&self) -> Result<Permission, DeviceError> {
        Ok(self.state.lock().unwrap().permission)
    }

    async fn request_permission(&self) -> Result<Permission, DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.permission = state.after_prompt;
        Ok(state.permission)
    }

    async fn devices(&self) -> Result<Vec<CameraDevice>, DeviceError> {
        Ok(self.state.lock().unwrap().devices.clone())
    }

    async fn open(
        &self,
        device: &CameraDevice,
        settings: DecodeSettings,
        sink: FrameSink,
    ) -> Result<FakeSession, DeviceError> {
        {
            let mut state = self.state.lock().unwrap();
            state.opened.push(device.id.clone());
            state.settings.push(settings);
            state.sinks.push(sink);
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            live: Arc::clone(&self.live),
            closed: false,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn levels(&self) -> Vec<NoticeLevel> {
        self.notices.lock().unwrap().iter().map(|n| n.level).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
