use super::camera::DecodeSettings;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ScannerConfig {
    pub decode: DecodeSettings,
    /// Delay before a failed resolution returns to idle.
    pub error_reset: Duration,
    /// Delay before a confirmed check-in returns to idle.
    pub confirm_reset: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            decode: DecodeSettings::default(),
            error_reset: Duration::from_secs(3),
            confirm_reset: Duration::from_secs(2),
        }
    }
}
