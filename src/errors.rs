// SPDX-License-Identifier: GPL-3.0-only

//! Error types for curio
//!
//! Every failure in this crate ends up as a message shown to the user, so each
//! error type carries a readable `Display` and nothing here is fatal.

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Photo capture and normalization errors
    Photo(PhotoError),
    /// Document store errors
    Store(StoreError),
    /// Identity provider errors
    Auth(AuthError),
    /// The operation needs a signed-in user
    NotAuthenticated,
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Stream acquisition failed (permission denial, busy or missing device)
    AccessFailed(BackendError),
    /// The live stream stopped delivering frames
    Disconnected,
}

/// Photo capture and normalization errors
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoError {
    /// No frame available for capture (stream not started or zero-sized)
    NoFrameAvailable,
    /// Image file could not be read from disk
    ReadFailed(String),
    /// Input bytes are not a decodable image
    ImageDecode(String),
    /// Encoding failed
    EncodingFailed(String),
    /// Stored image value is not a valid data URL
    InvalidDataUrl(String),
    /// Save failed
    SaveFailed(String),
    /// Background task failed to complete
    TaskFailed(String),
}

/// Document store errors
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No document with this id in the collection
    NotFound { collection: String, id: String },
    /// Document rejected before it reached the store
    Invalid(String),
    /// Document could not be (de)serialized
    Serialization(String),
    /// Backing storage failed
    Io(String),
    /// Failure reported by the store implementation
    Backend(String),
}

/// Identity provider errors
///
/// Messages are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidEmail,
    WeakPassword { min_length: usize },
    EmailAlreadyInUse,
    InvalidCredential,
    UserNotFound,
    InvalidResetToken,
    /// Message reported by the provider
    Provider(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Store(e) => write!(f, "Storage error: {}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::NotAuthenticated => write!(f, "User not authenticated."),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::AccessFailed(e) => write!(f, "Could not access camera: {}", e),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NoFrameAvailable => write!(f, "No frame available for capture"),
            PhotoError::ReadFailed(msg) => write!(f, "Image could not be read: {}", msg),
            PhotoError::ImageDecode(msg) => write!(f, "Image could not be decoded: {}", msg),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::InvalidDataUrl(msg) => write!(f, "Invalid image data: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
            PhotoError::TaskFailed(msg) => write!(f, "Image task failed: {}", msg),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { collection, id } => {
                write!(f, "No document '{}' in '{}'", id, collection)
            }
            StoreError::Invalid(msg) => write!(f, "Invalid document: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            StoreError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidEmail => write!(f, "The email address is badly formatted."),
            AuthError::WeakPassword { min_length } => {
                write!(f, "Password should be at least {} characters.", min_length)
            }
            AuthError::EmailAlreadyInUse => {
                write!(f, "The email address is already in use by another account.")
            }
            AuthError::InvalidCredential => write!(f, "Invalid email or password."),
            AuthError::UserNotFound => write!(f, "There is no account for this email address."),
            AuthError::InvalidResetToken => {
                write!(f, "The password reset code is invalid or has already been used.")
            }
            AuthError::Provider(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for PhotoError {}
impl std::error::Error for StoreError {}
impl std::error::Error for AuthError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        CameraError::AccessFailed(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                PhotoError::ImageDecode(err.to_string())
            }
            other => PhotoError::EncodingFailed(other.to_string()),
        }
    }
}
