// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux capture backend
//!
//! Each `/dev/video*` node that reports the video-capture capability is a
//! camera. A stream owns a capture thread that holds the device open, keeps
//! the newest frame (already converted to RGBA) and releases the device when
//! the running flag drops. Frame waits are bounded by [`FRAME_WAIT_TIMEOUT`],
//! so the thread sees the flag even when the device stops delivering.

use super::format_converters::frame_to_rgba;
use super::types::*;
use super::{CameraBackend, CameraBackendType, MediaStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

const DEVICE_DIR: &str = "/dev";
const BUFFER_COUNT: u32 = 4;
/// How long to wait for the capture thread to configure the device
const SETUP_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest single wait for a frame before the running flag is checked again
pub const FRAME_WAIT_TIMEOUT: Duration = Duration::from_millis(250);
/// Failed frame reads in a row after which the device counts as gone
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// V4L2 camera backend
#[derive(Debug, Clone)]
pub struct V4l2Backend {
    device_dir: PathBuf,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            device_dir: PathBuf::from(DEVICE_DIR),
        }
    }

    /// Paths of `video*` nodes, ordered by their numeric suffix
    fn video_nodes(&self) -> BackendResult<Vec<PathBuf>> {
        let mut nodes: Vec<(u32, PathBuf)> = std::fs::read_dir(&self.device_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = name.to_str()?.strip_prefix("video")?.parse::<u32>().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        nodes.sort_by_key(|(index, _)| *index);
        Ok(nodes.into_iter().map(|(_, path)| path).collect())
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_node(path: &Path) -> Option<CameraDevice> {
    let dev = match Device::with_path(path) {
        Ok(dev) => dev,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping unreadable video node");
            return None;
        }
    };
    let caps = dev.query_caps().ok()?;

    let kind = if caps
        .capabilities
        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
    {
        DeviceKind::VideoInput
    } else {
        DeviceKind::Other
    };

    Some(CameraDevice {
        id: path.display().to_string(),
        label: caps.card,
        kind,
    })
}

impl CameraBackend for V4l2Backend {
    fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>> {
        let devices: Vec<CameraDevice> = self
            .video_nodes()?
            .iter()
            .filter_map(|path| describe_node(path))
            .collect();
        debug!(count = devices.len(), "Enumerated V4L2 nodes");
        Ok(devices)
    }

    fn open_stream(&self, device_id: Option<&str>) -> BackendResult<Box<dyn MediaStream>> {
        let device_id = match device_id {
            Some(id) => id.to_string(),
            None => self
                .enumerate_devices()?
                .into_iter()
                .find(|d| d.kind == DeviceKind::VideoInput)
                .map(|d| d.id)
                .ok_or_else(|| BackendError::DeviceNotFound("no video capture device".into()))?,
        };

        Ok(Box::new(V4l2Stream::start(device_id)?))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        self.video_nodes().map(|n| !n.is_empty()).unwrap_or(false)
    }
}

/// Live capture from one V4L2 device
pub struct V4l2Stream {
    device_id: String,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl V4l2Stream {
    fn start(device_id: String) -> BackendResult<Self> {
        info!(device = %device_id, "Starting V4L2 capture");

        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (setup_tx, setup_rx) = mpsc::channel();

        let thread_handle = {
            let device_id = device_id.clone();
            let latest = Arc::clone(&latest);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("v4l2-capture".into())
                .spawn(move || capture_loop(&device_id, setup_tx, latest, running))?
        };

        let mut stream = Self {
            device_id,
            latest,
            running,
            thread_handle: Some(thread_handle),
        };

        // The device is opened inside the thread; wait for it to report back
        match setup_rx.recv_timeout(SETUP_TIMEOUT) {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(_) => {
                // The thread may be stuck inside a driver call; do not wait on it
                stream.abandon();
                Err(BackendError::DeviceBusy(format!(
                    "{} did not start streaming",
                    stream.device_id
                )))
            }
        }
    }

    /// Ask the capture thread to stop without waiting for it
    ///
    /// The thread exits on its own once it next checks the running flag.
    fn abandon(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if self.thread_handle.take().is_some() {
            warn!(device = %self.device_id, "Detached unresponsive V4L2 capture thread");
        }
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::TimedOut
}

impl MediaStream for V4l2Stream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn latest_frame(&mut self) -> Option<CameraFrame> {
        self.latest.lock().ok()?.clone()
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self
                .thread_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(()) => info!(device = %self.device_id, "V4L2 capture stopped"),
                Err(_) => warn!(device = %self.device_id, "V4L2 capture thread panicked"),
            }
        }
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture thread body
///
/// Reports the setup result exactly once through `setup_tx`, then stores
/// frames until `running` is cleared. The device is closed when this
/// function returns.
fn capture_loop(
    device_path: &str,
    setup_tx: mpsc::Sender<BackendResult<()>>,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    running: Arc<AtomicBool>,
) {
    static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

    let dev = match Device::with_path(device_path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = setup_tx.send(Err(e.into()));
            running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let format = match configure_format(&dev) {
        Ok(format) => format,
        Err(e) => {
            let _ = setup_tx.send(Err(e));
            running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let mut stream = match MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = setup_tx.send(Err(e.into()));
            running.store(false, Ordering::SeqCst);
            return;
        }
    };
    stream.set_timeout(FRAME_WAIT_TIMEOUT);

    let _ = setup_tx.send(Ok(()));
    info!(
        device_path,
        width = format.width,
        height = format.height,
        fourcc = ?format.fourcc,
        "V4L2 capture stream started"
    );

    let mut consecutive_errors = 0u32;
    // A timed-out wait leaves one buffer with the driver; collect it before
    // asking for the next frame, or the requeue would be refused
    let mut awaiting_buffer = false;
    while running.load(Ordering::SeqCst) {
        if awaiting_buffer {
            match CaptureStream::dequeue(&mut stream) {
                Ok(_) => awaiting_buffer = false,
                Err(e) if is_timeout(&e) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to reclaim capture buffer");
                    break;
                }
            }
            continue;
        }

        match stream.next() {
            Ok((buf, _meta)) => {
                consecutive_errors = 0;
                let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

                let raw = CameraFrame {
                    width: format.width,
                    height: format.height,
                    data: Arc::from(buf),
                    format: format.pixel_format,
                    stride: format.stride,
                    captured_at: Instant::now(),
                };

                match frame_to_rgba(&raw) {
                    Ok(frame) => {
                        if let Ok(mut guard) = latest.lock() {
                            *guard = Some(frame);
                        }
                    }
                    Err(e) => {
                        if frame_num % 30 == 0 {
                            warn!(frame = frame_num, error = %e, "Dropping undecodable frame");
                        }
                    }
                }
            }
            Err(e) if is_timeout(&e) => {
                debug!(device_path, "No frame within wait timeout");
                awaiting_buffer = true;
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(error = %e, consecutive_errors, "Failed to capture frame");
                // ENODEV and friends: the camera is gone
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    info!(device_path, "V4L2 capture loop ended");
}

struct NegotiatedFormat {
    width: u32,
    height: u32,
    stride: u32,
    fourcc: v4l::FourCC,
    pixel_format: PixelFormat,
}

/// Ask for YUYV at the current size, then accept whatever the driver settled on
/// as long as we know how to convert it.
fn configure_format(dev: &Device) -> BackendResult<NegotiatedFormat> {
    let mut format = dev.format()?;
    format.fourcc = v4l::FourCC::new(b"YUYV");

    let format = match dev.set_format(&format) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Could not set YUYV, using current device format");
            dev.format()?
        }
    };

    let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
        BackendError::FormatNotSupported(format!("{:?}", format.fourcc))
    })?;

    Ok(NegotiatedFormat {
        width: format.width,
        height: format.height,
        stride: if pixel_format == PixelFormat::MJPEG {
            0
        } else {
            format.stride
        },
        fourcc: format.fourcc,
        pixel_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_nodes_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["video10", "video2", "video0", "media0", "videoX"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let backend = V4l2Backend {
            device_dir: dir.path().to_path_buf(),
        };
        let names: Vec<String> = backend
            .video_nodes()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["video0", "video2", "video10"]);
    }

    #[test]
    fn test_timeouts_are_recognized() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "VIDIOC_DQBUF");
        assert!(is_timeout(&timed_out));
        assert!(!is_timeout(&std::io::Error::from_raw_os_error(19)));
        assert!(FRAME_WAIT_TIMEOUT < SETUP_TIMEOUT);
    }

    #[test]
    fn test_missing_device_fails_fast() {
        let started = Instant::now();
        let result = V4l2Stream::start("/nonexistent/curio-video0".into());
        assert!(matches!(result, Err(BackendError::DeviceNotFound(_))));
        assert!(started.elapsed() < SETUP_TIMEOUT);
    }

    #[test]
    fn test_abandon_does_not_wait_for_a_stuck_thread() {
        let running = Arc::new(AtomicBool::new(true));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let _ = release_rx.recv();
        });
        let mut stream = V4l2Stream {
            device_id: "/dev/video9".into(),
            latest: Arc::new(Mutex::new(None)),
            running: Arc::clone(&running),
            thread_handle: Some(handle),
        };

        stream.abandon();
        assert!(!running.load(Ordering::SeqCst));
        assert!(!stream.is_live());

        // Dropping runs stop(), which must not join the detached thread
        drop(stream);
        drop(release_tx);
    }

    #[test]
    fn test_missing_device_dir_is_an_error() {
        let backend = V4l2Backend {
            device_dir: PathBuf::from("/nonexistent/curio-dev"),
        };
        assert!(backend.enumerate_devices().is_err());
        assert!(!backend.is_available());
    }
}
