//! Camera + decoder seam.
//!
//! A [`Camera`] hands out at most what the machine asks for: a permission
//! state, a device list, and an open decoding session that reports frames
//! through a [`FrameSink`]. Sessions are always held through a
//! [`CameraLease`], whose `Drop` closes the device, so every exit path
//! (stop, error, forced teardown, panic unwinding) releases it.

use super::ScannerEvent;
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; the machine asks explicitly.
    Prompt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

impl CameraDevice {
    /// Whether the label suggests a rear or environment-facing camera.
    #[must_use]
    pub fn is_rear_facing(&self) -> bool {
        let label = self.label.to_lowercase();
        ["back", "rear", "environment", "trasera"]
            .iter()
            .any(|keyword| label.contains(keyword))
    }
}

/// Decoder parameters, fixed for the life of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeSettings {
    /// Target decode attempts per second.
    pub fps: u32,
    /// Width and height of the detection region, in pixels.
    pub region: (u32, u32),
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            fps: 10,
            region: (250, 250),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Decoded(String),
    /// Nothing detected in this frame.
    Missed,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Camera permission denied. Allow camera access and try again.")]
    PermissionDenied,
    #[error("No camera found. Connect a camera or scanner and try again.")]
    NoCamera,
    #[error("Camera is busy: {0}")]
    Busy(String),
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
}

/// Where a session delivers its frames. Bound to one scan cycle; frames
/// from a previous cycle are recognized and dropped by the machine.
#[derive(Clone, Debug)]
pub struct FrameSink {
    cycle: u64,
    events: UnboundedSender<ScannerEvent>,
}

impl FrameSink {
    pub(crate) fn new(cycle: u64, events: UnboundedSender<ScannerEvent>) -> Self {
        Self { cycle, events }
    }

    /// Reports a decoded payload. Returns false once the machine is gone.
    pub fn decoded(&self, text: impl Into<String>) -> bool {
        self.send(FrameOutcome::Decoded(text.into()))
    }

    pub fn missed(&self) -> bool {
        self.send(FrameOutcome::Missed)
    }

    fn send(&self, outcome: FrameOutcome) -> bool {
        self.events
            .send(ScannerEvent::Frame {
                cycle: self.cycle,
                outcome,
            })
            .is_ok()
    }
}

pub trait CameraSession: Send {
    /// Releases the device. Must tolerate being called more than once.
    fn close(&mut self);
}

pub trait Camera: Send + Sync {
    type Session: CameraSession;

    fn permission(&self) -> impl Future<Output = Result<Permission, DeviceError>> + Send;

    fn request_permission(&self) -> impl Future<Output = Result<Permission, DeviceError>> + Send;

    fn devices(&self) -> impl Future<Output = Result<Vec<CameraDevice>, DeviceError>> + Send;

    fn open(
        &self,
        device: &CameraDevice,
        settings: DecodeSettings,
        sink: FrameSink,
    ) -> impl Future<Output = Result<Self::Session, DeviceError>> + Send;
}

/// Prefers a rear-facing device, else the first one.
#[must_use]
pub fn preferred_device(devices: &[CameraDevice]) -> Option<&CameraDevice> {
    devices
        .iter()
        .find(|device| device.is_rear_facing())
        .or_else(|| devices.first())
}

/// Exclusive ownership of an open session.
pub(crate) struct CameraLease<S: CameraSession> {
    session: S,
    device: String,
}

impl<S: CameraSession> CameraLease<S> {
    pub(crate) fn new(session: S, device: &CameraDevice) -> Self {
        debug!(device = %device.id, "camera opened");
        Self {
            session,
            device: device.id.clone(),
        }
    }
}

impl<S: CameraSession> Drop for CameraLease<S> {
    fn drop(&mut self) {
        self.session.close();
        debug!(device = %self.device, "camera released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, label: &str) -> CameraDevice {
        CameraDevice {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn rear_camera_is_preferred() {
        let devices = vec![
            device("0", "FaceTime HD Camera (front)"),
            device("1", "Cámara trasera"),
        ];
        assert_eq!(preferred_device(&devices).map(|d| d.id.as_str()), Some("1"));

        let devices = vec![device("0", "USB camera"), device("1", "Back Camera")];
        assert_eq!(preferred_device(&devices).map(|d| d.id.as_str()), Some("1"));
    }

    #[test]
    fn first_device_is_the_fallback() {
        let devices = vec![device("a", "USB camera"), device("b", "Webcam")];
        assert_eq!(preferred_device(&devices).map(|d| d.id.as_str()), Some("a"));
        assert!(preferred_device(&[]).is_none());
    }

    #[test]
    fn default_decoder_settings() {
        let settings = DecodeSettings::default();
        assert_eq!(settings.fps, 10);
        assert_eq!(settings.region, (250, 250));
    }
}
