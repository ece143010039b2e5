/// Backend route table. Paths are relative to the API base URL; identifiers
/// are appended as escaped path segments by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub request_code: String,
    pub verify_code: String,
    pub activities: String,
    /// Prefix for participant lookup; the participant id is appended.
    pub find_participant: String,
    /// Prefix for the attendance mutation; the participant id is appended.
    pub set_attendance: String,
    pub registrations: String,
    pub stats: String,
    /// Prefix for the updates feed; the collection is appended.
    pub updates: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/organizador/login".to_string(),
            request_code: "/organizador/2fa/solicitar".to_string(),
            verify_code: "/organizador/2fa/verificar".to_string(),
            activities: "/api/actividades/todas".to_string(),
            find_participant: "/organizador/buscar-inscripcion".to_string(),
            set_attendance: "/organizador/asistencia".to_string(),
            registrations: "/organizador/inscripciones".to_string(),
            stats: "/organizador/stats".to_string(),
            updates: "/api/updates".to_string(),
        }
    }
}
