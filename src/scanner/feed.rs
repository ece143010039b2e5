//! [`Camera`] over line-oriented scanner devices.
//!
//! Hardware QR readers in serial (CDC) mode, and FIFOs fed by an external
//! decoder, emit one decoded payload per line. Each configured path is one
//! device; a blank line counts as a frame with nothing detected.
//!
//! FIFOs and character devices are read non-blocking through the reactor, so
//! closing a session drops the descriptor at once and no stale read is left
//! behind to swallow the next scan. Regular files (recorded feeds) always
//! reach end of file and are read through `tokio::fs`.

use super::camera::{
    Camera, CameraDevice, CameraSession, DecodeSettings, DeviceError, FrameSink, Permission,
};
use std::{io, path::PathBuf, time::Duration};
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    task::AbortHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};

/// `EBUSY` on Linux and the BSDs.
const EBUSY: i32 = 16;

#[derive(Clone, Debug)]
pub struct FeedCamera {
    paths: Vec<PathBuf>,
}

impl FeedCamera {
    #[must_use]
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Camera for FeedCamera {
    type Session = FeedSession;

    async fn permission(&self) -> Result<Permission, DeviceError> {
        let mut denied = false;
        for path in &self.paths {
            match fs::metadata(path).await {
                Ok(_) => return Ok(Permission::Granted),
                Err(err) if err.kind() == io::ErrorKind::PermissionDenied => denied = true,
                Err(_) => {}
            }
        }
        Ok(if denied {
            Permission::Denied
        } else {
            Permission::Granted
        })
    }

    /// Device files have no interactive grant; the OS answer stands.
    async fn request_permission(&self) -> Result<Permission, DeviceError> {
        self.permission().await
    }

    async fn devices(&self) -> Result<Vec<CameraDevice>, DeviceError> {
        let mut devices = Vec::new();
        for path in &self.paths {
            if fs::metadata(path).await.is_ok() {
                let label = path
                    .file_name()
                    .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
                devices.push(CameraDevice {
                    id: path.display().to_string(),
                    label,
                });
            }
        }
        Ok(devices)
    }

    async fn open(
        &self,
        device: &CameraDevice,
        settings: DecodeSettings,
        sink: FrameSink,
    ) -> Result<FeedSession, DeviceError> {
        let feed = open_feed(&device.id).await.map_err(device_error)?;
        let period = Duration::from_secs(1) / settings.fps.max(1);
        let device_id = device.id.clone();

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(feed).lines();
            let mut pace = interval(period);
            pace.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                pace.tick().await;
                let delivered = match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => sink.missed(),
                    Ok(Some(line)) => sink.decoded(line.trim()),
                    Ok(None) => {
                        debug!(device = %device_id, "scanner feed ended");
                        break;
                    }
                    Err(err) => {
                        warn!(device = %device_id, error = %err, "scanner feed read failed");
                        break;
                    }
                };
                if !delivered {
                    break;
                }
            }
        });

        Ok(FeedSession {
            reader: reader.abort_handle(),
        })
    }
}

#[derive(Debug)]
pub struct FeedSession {
    reader: AbortHandle,
}

impl CameraSession for FeedSession {
    fn close(&mut self) {
        self.reader.abort();
    }
}

type Feed = Box<dyn AsyncRead + Send + Unpin>;

async fn open_feed(path: &str) -> io::Result<Feed> {
    if fs::metadata(path).await?.is_file() {
        return Ok(Box::new(fs::File::open(path).await?));
    }
    open_stream(path)
}

#[cfg(unix)]
fn open_stream(path: &str) -> io::Result<Feed> {
    let mut options = tokio::net::unix::pipe::OpenOptions::new();
    options.unchecked(true);
    // Read-write keeps a FIFO from hitting end of file while its decoder restarts.
    #[cfg(target_os = "linux")]
    options.read_write(true);
    Ok(Box::new(options.open_receiver(path)?))
}

#[cfg(not(unix))]
fn open_stream(path: &str) -> io::Result<Feed> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{path}: live scanner devices need a unix host"),
    ))
}

fn device_error(err: io::Error) -> DeviceError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied,
        io::ErrorKind::NotFound => DeviceError::NoCamera,
        _ if err.raw_os_error() == Some(EBUSY) => DeviceError::Busy(err.to_string()),
        _ => DeviceError::Unavailable(err.to_string()),
    }
}
