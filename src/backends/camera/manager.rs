// SPDX-License-Identifier: GPL-3.0-only

//! Capture session lifecycle manager
//!
//! The manager owns at most one live stream at a time and ties it to the
//! visibility of the capture UI:
//!
//! ```text
//!   Idle ──start──▶ Requesting ──ok──▶ Streaming ──stop──▶ Idle
//!                        │
//!                        └──err──▶ Failed ──stop/open──▶ Idle
//! ```
//!
//! Opening the UI re-enumerates devices and starts a stream; closing it,
//! switching device, or dropping the manager stops the stream first.

use super::enumeration::list_video_input_devices;
use super::types::*;
use super::{CameraBackend, MediaStream};
use crate::errors::{AppResult, CameraError, PhotoError};
use crate::pipelines::photo::{ImageNormalizer, NormalizedImage};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message shown when a stream cannot be acquired
pub const CAMERA_ACCESS_ERROR: &str =
    "Could not access camera. Please ensure permissions are granted.";

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Failed,
}

/// Cursor into the most recently enumerated device list
///
/// The list can change between enumerations (devices plugged or unplugged);
/// replacing it clamps the index into the new bounds.
#[derive(Debug, Clone, Default)]
pub struct DeviceCursor {
    devices: Vec<CameraDevice>,
    index: usize,
}

impl DeviceCursor {
    pub fn new(devices: Vec<CameraDevice>) -> Self {
        Self { devices, index: 0 }
    }

    /// Swap in a freshly enumerated list, keeping the index in bounds
    pub fn replace_devices(&mut self, devices: Vec<CameraDevice>) {
        self.devices = devices;
        self.index = self.index.min(self.devices.len().saturating_sub(1));
    }

    pub fn devices(&self) -> &[CameraDevice] {
        &self.devices
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn current(&self) -> Option<&CameraDevice> {
        self.devices.get(self.index)
    }

    /// Flipping only makes sense with more than one camera
    pub fn can_flip(&self) -> bool {
        self.devices.len() > 1
    }

    /// Move to the next device, wrapping around
    ///
    /// Returns `None` and leaves the cursor untouched when flipping is not
    /// offered.
    pub fn advance(&mut self) -> Option<&CameraDevice> {
        if !self.can_flip() {
            return None;
        }
        self.index = (self.index + 1) % self.devices.len();
        self.current()
    }

    pub fn select(&mut self, index: usize) -> Option<&CameraDevice> {
        if index >= self.devices.len() {
            return None;
        }
        self.index = index;
        self.current()
    }

    pub fn position_of(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.id == device_id)
    }
}

/// Capture session manager
///
/// Exclusively owned by the capture UI that opened it. Not `Clone`: two
/// owners could otherwise hold live streams at the same time.
pub struct CaptureSessionManager {
    backend: Arc<dyn CameraBackend>,
    cursor: DeviceCursor,
    state: SessionState,
    stream: Option<Box<dyn MediaStream>>,
    visible: bool,
    last_error: Option<String>,
    /// Device to select on the next open (last one that streamed)
    preferred_device: Option<String>,
}

impl CaptureSessionManager {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        info!(backend = %backend.backend_type(), "Creating capture session manager");

        Self {
            backend,
            cursor: DeviceCursor::default(),
            state: SessionState::Idle,
            stream: None,
            visible: false,
            last_error: None,
            preferred_device: None,
        }
    }

    /// Prefer a device (by id) the next time the UI opens
    pub fn set_preferred_device(&mut self, device_id: Option<String>) {
        self.preferred_device = device_id;
    }

    /// Show the capture UI
    ///
    /// Re-enumerates devices, restores the preferred device if it is still
    /// present, then starts streaming from the cursor's device.
    pub fn open(&mut self) -> Result<(), CameraError> {
        info!("Opening capture UI");
        self.stop();
        self.last_error = None;

        self.refresh_devices();
        if let Some(position) = self
            .preferred_device
            .as_deref()
            .and_then(|id| self.cursor.position_of(id))
        {
            self.cursor.select(position);
        }

        self.visible = true;
        let device_id = self.cursor.current().map(|d| d.id.clone());
        self.start(device_id.as_deref())
    }

    /// Hide the capture UI, releasing the stream
    pub fn close(&mut self) {
        if self.visible {
            info!("Closing capture UI");
        }
        self.stop();
        self.visible = false;
    }

    /// Re-enumerate devices without touching the live stream
    pub fn refresh_devices(&mut self) {
        let devices = list_video_input_devices(self.backend.as_ref());
        self.cursor.replace_devices(devices);
    }

    /// Start streaming from a device (or any video input)
    ///
    /// Any live stream is stopped before the new one is requested, so two
    /// acquisitions never overlap.
    pub fn start(&mut self, device_id: Option<&str>) -> Result<(), CameraError> {
        self.stop();

        self.state = SessionState::Requesting;
        debug!(device = device_id.unwrap_or("<any>"), "Requesting camera stream");

        match self.backend.open_stream(device_id) {
            Ok(stream) => {
                info!(device = %stream.device_id(), "Camera stream started");
                self.preferred_device = Some(stream.device_id().to_string());
                self.stream = Some(stream);
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Stop the live stream, if any
    ///
    /// Idempotent; also clears a `Failed` state back to `Idle`.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!(device = %stream.device_id(), "Stopping camera stream");
            stream.stop();
        }
        self.state = SessionState::Idle;
    }

    /// Switch to the next camera
    ///
    /// Returns `Ok(false)` when flipping is not offered (fewer than two
    /// devices). The stream is restarted only while the UI is visible.
    pub fn flip(&mut self) -> Result<bool, CameraError> {
        let Some(next) = self.cursor.advance().map(|d| d.id.clone()) else {
            debug!(devices = self.cursor.len(), "Flip camera not offered");
            return Ok(false);
        };

        info!(device = %next, index = self.cursor.index(), "Flipping camera");
        if self.visible {
            self.start(Some(&next))?;
        } else {
            self.preferred_device = Some(next);
        }
        Ok(true)
    }

    /// Select a device by index in the current list
    pub fn select_device(&mut self, index: usize) -> Result<(), CameraError> {
        let device_id = self
            .cursor
            .select(index)
            .map(|d| d.id.clone())
            .ok_or(CameraError::NoCameraFound)?;

        if self.visible {
            self.start(Some(&device_id))
        } else {
            self.preferred_device = Some(device_id);
            Ok(())
        }
    }

    /// Most recent frame of the live stream
    pub fn latest_frame(&mut self) -> Option<CameraFrame> {
        self.stream.as_mut()?.latest_frame()
    }

    /// Check that the live stream is still delivering
    ///
    /// A stream whose device went away is treated like an acquisition
    /// failure: the session fails and the UI closes.
    pub fn check_stream(&mut self) -> Result<(), CameraError> {
        match &self.stream {
            Some(stream) if !stream.is_live() => {
                warn!(device = %stream.device_id(), "Camera stream ended unexpectedly");
                self.stop();
                let _ = self.fail(BackendError::StreamEnded);
                Err(CameraError::Disconnected)
            }
            _ => Ok(()),
        }
    }

    /// Capture the current frame as a normalized image
    ///
    /// On success the stream is released and the UI closed. A missing or
    /// zero-sized frame is refused and the session stays open.
    pub fn capture(&mut self, normalizer: &ImageNormalizer) -> AppResult<NormalizedImage> {
        let frame = self.latest_frame().ok_or(PhotoError::NoFrameAvailable)?;
        let image = normalizer.capture_frame(&frame)?;
        self.close();
        Ok(image)
    }

    fn fail(&mut self, e: BackendError) -> CameraError {
        error!(error = %e, "Error accessing camera");
        self.stream = None;
        self.state = SessionState::Failed;
        self.visible = false;
        self.last_error = Some(CAMERA_ACCESS_ERROR.to_string());
        CameraError::AccessFailed(e)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// User-facing message from the last failed acquisition
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn devices(&self) -> &[CameraDevice] {
        self.cursor.devices()
    }

    pub fn cursor(&self) -> &DeviceCursor {
        &self.cursor
    }

    pub fn can_flip(&self) -> bool {
        self.cursor.can_flip()
    }

    /// Device feeding the live stream
    pub fn active_device_id(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.device_id())
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSessionManager")
            .field("backend_type", &self.backend.backend_type())
            .field("state", &self.state)
            .field("visible", &self.visible)
            .field("devices", &self.cursor.len())
            .finish()
    }
}
