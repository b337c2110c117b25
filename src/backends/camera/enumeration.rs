// SPDX-License-Identifier: GPL-3.0-only

//! Video input enumeration

use super::CameraBackend;
use super::types::{CameraDevice, DeviceKind};
use tracing::{debug, warn};

/// List the video-input devices a backend can see
///
/// Order is whatever the backend reports. Enumeration failures are logged and
/// produce an empty list: without devices the capture UI simply offers no
/// flip option, which is not worth interrupting the user for.
pub fn list_video_input_devices(backend: &dyn CameraBackend) -> Vec<CameraDevice> {
    match backend.enumerate_devices() {
        Ok(devices) => {
            let video: Vec<CameraDevice> = devices
                .into_iter()
                .filter(|device| device.kind == DeviceKind::VideoInput)
                .collect();
            debug!(
                backend = %backend.backend_type(),
                count = video.len(),
                "Detected video input devices"
            );
            video
        }
        Err(e) => {
            warn!(backend = %backend.backend_type(), error = %e, "Error enumerating devices");
            Vec::new()
        }
    }
}
