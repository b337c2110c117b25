// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Capture UI / CLI    │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │CaptureSessionManager │  ← single live stream, device cursor, release on drop
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CameraBackend Trait  │  ← enumeration + stream acquisition
//! └──────────┬───────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐   ┌───────┐
//!   │ V4L2 │   │ Still │
//!   └──────┘   └───────┘
//! ```

pub mod enumeration;
pub mod format_converters;
pub mod manager;
pub mod still;
pub mod types;
pub mod v4l2;

pub use enumeration::list_video_input_devices;
pub use manager::{CaptureSessionManager, DeviceCursor, SessionState};
pub use types::*;

use std::path::PathBuf;
use std::sync::Arc;

/// Camera backend trait
///
/// A backend knows how to list the host's media devices and how to acquire a
/// live stream from one of them. It holds no per-stream state itself; every
/// acquired stream is owned by whoever called [`CameraBackend::open_stream`].
pub trait CameraBackend: Send + Sync {
    /// Enumerate media devices in host-reported order
    ///
    /// May include non-video devices; use [`list_video_input_devices`] to
    /// get the filtered list.
    fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>>;

    /// Acquire a live stream
    ///
    /// # Arguments
    /// * `device_id` - Device to open, or `None` for any available video input
    fn open_stream(&self, device_id: Option<&str>) -> BackendResult<Box<dyn MediaStream>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;
}

/// A live media stream
///
/// Dropping a stream must release the device. [`MediaStream::stop`] does the
/// same explicitly and is idempotent.
pub trait MediaStream: Send {
    /// Identifier of the device feeding this stream
    fn device_id(&self) -> &str;

    /// Most recent frame, if the device has produced one yet
    fn latest_frame(&mut self) -> Option<CameraFrame>;

    /// True until [`MediaStream::stop`] has been called or the device went away
    fn is_live(&self) -> bool;

    /// Halt every underlying track
    fn stop(&mut self);
}

/// Build the backend selected by the configuration
pub fn backend_for_type(
    backend_type: CameraBackendType,
    still_image_dir: Option<PathBuf>,
) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::V4l2 => Arc::new(v4l2::V4l2Backend::new()),
        CameraBackendType::Still => Arc::new(still::StillImageBackend::new(
            still_image_dir.unwrap_or_else(crate::constants::default_still_image_dir),
        )),
    }
}
