use serde_json::Value;

/// Fields that may carry the registration id inside a JSON envelope.
const ID_FIELDS: [&str; 4] = ["id", "_id", "identifier", "inscripcionId"];

/// Participant identifier carried by a scanned QR payload.
///
/// A JSON object with one of the known id fields wins; anything else is
/// taken as a bare identifier. Returns `None` for a blank payload.
#[must_use]
pub fn identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(trimmed) {
        let from_envelope = ID_FIELDS.iter().find_map(|key| match envelope.get(*key) {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        });
        if from_envelope.is_some() {
            return from_envelope;
        }
    }

    Some(trimmed.to_string())
}
