//! Backend schema drift, absorbed in one place.
//!
//! The registration backend has shipped several response shapes over time:
//! the user object under `user` or `usuario`, ids under `id` or `_id` (string
//! or number), Spanish and English field names side by side. These functions
//! map the union of observed shapes onto the typed records in
//! [`super::types`]. They run right after each gateway call; the state
//! machines only ever see the typed records.

use super::{
    error::message_from_body,
    types::{
        Acknowledgement, Activity, LoginOutcome, Lookup, ParticipantRecord, Stats, Update,
        VerifyOutcome,
    },
};
use crate::session::Profile;
use secrecy::SecretString;
use serde_json::Value;

/// First non-blank string (or number rendered as string) among `keys`.
fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::Bool(flag)) => Some(*flag),
        Some(Value::Number(number)) => number.as_i64().map(|n| n != 0),
        Some(Value::String(text)) => match text.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn count_field(value: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_u64))
        .unwrap_or(0)
}

fn success(body: &Value) -> bool {
    bool_field(body, &["success", "ok"]).unwrap_or(false)
}

fn message(body: &Value) -> Option<String> {
    message_from_body(body)
}

fn token(body: &Value) -> Option<SecretString> {
    string_field(body, &["token", "accessToken", "access_token"]).map(SecretString::from)
}

/// The user object, wherever this API version put it.
fn user_object(body: &Value) -> Option<&Value> {
    ["user", "usuario"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find(|value| value.is_object())
}

/// Organizer profile from a login or verify body.
#[must_use]
pub fn profile(body: &Value) -> Option<Profile> {
    let user = user_object(body)?;
    let id = string_field(user, &["id", "_id"])?;
    let display_name = string_field(
        user,
        &["nombre", "name", "displayName", "usuario", "username"],
    )
    .unwrap_or_else(|| id.clone());
    let phone = string_field(user, &["telefono", "phone", "celular"]);

    Some(Profile {
        id,
        display_name,
        phone,
    })
}

/// Shows only the last four digits of a phone number.
fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(digits.len() - 4))
}

#[must_use]
pub fn login_outcome(body: &Value) -> LoginOutcome {
    let profile = profile(body);
    let phone_hint = string_field(body, &["phoneHint", "phone_hint", "destino"]).or_else(|| {
        profile
            .as_ref()
            .and_then(|profile| profile.phone.as_deref())
            .map(mask_phone)
    });

    LoginOutcome {
        success: success(body),
        message: message(body),
        token: token(body),
        profile,
        phone_hint,
    }
}

#[must_use]
pub fn verify_outcome(body: &Value) -> VerifyOutcome {
    VerifyOutcome {
        success: success(body),
        message: message(body),
        token: token(body),
        profile: profile(body),
    }
}

#[must_use]
pub fn acknowledgement(body: &Value) -> Acknowledgement {
    Acknowledgement {
        success: success(body),
        message: message(body),
    }
}

#[must_use]
pub fn participant(value: &Value) -> Option<ParticipantRecord> {
    if !value.is_object() {
        return None;
    }
    let id = string_field(value, &["_id", "id"])?;

    Some(ParticipantRecord {
        name: string_field(value, &["nombre", "name", "nombreCompleto"]).unwrap_or_default(),
        document: string_field(value, &["cedula", "documento", "document"]),
        email: string_field(value, &["correo", "email"]).unwrap_or_default(),
        phone: string_field(value, &["telefono", "phone"]),
        program: string_field(value, &["programa", "program"]),
        attended: bool_field(value, &["asistencia", "attended"]).unwrap_or(false),
        id,
    })
}

#[must_use]
pub fn lookup(body: &Value) -> Lookup {
    let participant = ["inscripcion", "participante", "participant"]
        .iter()
        .find_map(|key| body.get(*key))
        .and_then(participant);

    Lookup {
        success: success(body),
        message: message(body),
        participant,
    }
}

#[must_use]
pub fn activities(body: &Value) -> Vec<Activity> {
    body.get("actividades")
        .or_else(|| body.get("activities"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let collection = string_field(item, &["coleccion", "collection"])?;
                    let name = string_field(item, &["nombre", "name"])
                        .unwrap_or_else(|| collection.clone());
                    Some(Activity { collection, name })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[must_use]
pub fn registrations(body: &Value) -> Vec<ParticipantRecord> {
    body.get("inscripciones")
        .or_else(|| body.get("registrations"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(participant).collect())
        .unwrap_or_default()
}

#[must_use]
pub fn stats(body: &Value) -> Stats {
    let source = body.get("estadisticas").unwrap_or(body);
    let total_registrations = count_field(source, &["totalInscripciones", "total"]);
    let attended = count_field(source, &["totalAsistencia", "attended"]);
    let absent = source
        .get("totalSinAsistencia")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| total_registrations.saturating_sub(attended));
    let attendance_percentage = source
        .get("porcentajeAsistencia")
        .and_then(|value| {
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        })
        .unwrap_or_else(|| {
            if total_registrations == 0 {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let ratio = attended as f64 / total_registrations as f64;
                (ratio * 100.0).round()
            }
        });

    Stats {
        total_registrations,
        attended,
        absent,
        attendance_percentage,
    }
}

#[must_use]
pub fn updates(body: &Value) -> Vec<Update> {
    body.get("updates")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| Update {
                    participant_id: string_field(item, &["_id", "id", "inscripcionId"]),
                    payload: item.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}
