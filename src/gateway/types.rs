//! Typed records produced by the gateway after shape normalization.
//! Tokens stay wrapped in `SecretString` so `Debug` output never leaks them.

use crate::session::Profile;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of the password step.
#[derive(Clone, Debug, Default)]
pub struct LoginOutcome {
    pub success: bool,
    pub message: Option<String>,
    /// Present on deployments that still issue a token before the second factor.
    pub token: Option<SecretString>,
    pub profile: Option<Profile>,
    /// Masked destination the code was sent to, when the backend reports one.
    pub phone_hint: Option<String>,
}

/// Result of the code verification step.
#[derive(Clone, Debug, Default)]
pub struct VerifyOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub token: Option<SecretString>,
    pub profile: Option<Profile>,
}

/// `{ success, message? }` replies (code issuance, attendance mutation).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: Option<String>,
}

/// Participant lookup reply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lookup {
    pub success: bool,
    pub message: Option<String>,
    pub participant: Option<ParticipantRecord>,
}

/// An event whose registrations live in their own backend collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub collection: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: String,
    pub name: String,
    pub document: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub program: Option<String>,
    pub attended: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_registrations: u64,
    pub attended: u64,
    pub absent: u64,
    pub attendance_percentage: f64,
}

/// One change reported by the updates feed.
#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub participant_id: Option<String>,
    pub payload: Value,
}
