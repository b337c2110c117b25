// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux capture devices (`/dev/video*`)
    #[default]
    V4l2,
    /// Directory of still images, each one exposed as a camera
    Still,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::Still => write!(f, "still images"),
        }
    }
}

impl std::str::FromStr for CameraBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v4l2" => Ok(CameraBackendType::V4l2),
            "still" => Ok(CameraBackendType::Still),
            other => Err(format!("unknown camera backend '{}'", other)),
        }
    }
}

/// Kind of media device reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// A device that produces video frames
    VideoInput,
    /// A device that produces audio
    AudioInput,
    /// Anything else the host reports (metadata nodes, codecs, ...)
    Other,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Opaque identifier, stable for the lifetime of one enumeration
    pub id: String,
    /// Human-readable label
    pub label: String,
    pub kind: DeviceKind,
}

impl CameraDevice {
    pub fn video_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }
}

/// Pixel format for camera frames
///
/// Backends hand frames to the session in whatever layout the device produced;
/// the photo pipeline converts to RGBA before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// Motion JPEG - each frame is a complete JPEG image
    MJPEG,
}

impl PixelFormat {
    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::YUYV),
            b"MJPG" | b"JPEG" => Some(Self::MJPEG),
            b"RGB3" => Some(Self::RGB24),
            b"GREY" => Some(Self::Gray8),
            b"AB24" => Some(Self::RGBA),
            _ => None,
        }
    }

    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            Self::RGBA => Some(4),
            Self::RGB24 => Some(3),
            Self::YUYV => Some(2),
            Self::Gray8 => Some(1),
            Self::MJPEG => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (0 for compressed formats)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::RGBA,
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    /// A frame is usable once the stream has reported real dimensions
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// The host refused access to the device
    PermissionDenied(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Device is held by another process
    DeviceBusy(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Stream stopped delivering frames
    StreamEnded,
    /// General I/O error
    IoError(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::StreamEnded => write!(f, "Stream ended"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        // EBUSY
        const DEVICE_BUSY: i32 = 16;

        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(err.to_string()),
            _ if err.raw_os_error() == Some(DEVICE_BUSY) => {
                BackendError::DeviceBusy(err.to_string())
            }
            _ => BackendError::IoError(err.to_string()),
        }
    }
}
