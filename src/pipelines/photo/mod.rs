// SPDX-License-Identifier: GPL-3.0-only

//! Image normalization pipeline
//!
//! Two sources produce the image stored on an item:
//!
//! ```text
//! Camera frame → Center crop → Scale to capture size → PNG data URL
//! Image file   → Decode → Bound longer side → JPEG data URL
//! ```
//!
//! Both end in a [`NormalizedImage`], so callers never care which path an
//! image took.

pub mod capture;
pub mod encoding;
pub mod file;
pub mod processing;

pub use capture::{CropRegion, center_crop};
pub use encoding::{EncodingFormat, EncodingQuality, NormalizedImage, decode_data_url};
pub use processing::fit_within;

use crate::backends::camera::types::CameraFrame;
use crate::config::Config;
use crate::constants::{CAPTURE_SIZE, DEFAULT_MAX_FILE_DIMENSION};
use crate::errors::PhotoError;
use std::path::Path;
use tracing::info;

/// Normalizes camera frames and image files into storable images
///
/// Camera captures are always [`CAPTURE_SIZE`] square; only the file path
/// is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageNormalizer {
    max_dimension: u32,
    quality: EncodingQuality,
}

impl ImageNormalizer {
    /// Create a normalizer with default settings
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_FILE_DIMENSION,
            quality: EncodingQuality::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            max_dimension: config.max_file_dimension.max(1),
            quality: config.file_quality,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn with_quality(mut self, quality: EncodingQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Center-crop and scale a camera frame, encoded as PNG
    ///
    /// Frames the stream has not sized yet are refused with
    /// [`PhotoError::NoFrameAvailable`].
    pub fn capture_frame(&self, frame: &CameraFrame) -> Result<NormalizedImage, PhotoError> {
        info!(
            width = frame.width,
            height = frame.height,
            format = ?frame.format,
            "Capturing frame"
        );
        let image = processing::crop_and_scale(frame, CAPTURE_SIZE, CAPTURE_SIZE)?;
        encoding::encode_png(&image)
    }

    /// Normalize the bytes of an imported image file
    pub async fn normalize_file(
        &self,
        bytes: Vec<u8>,
        mime_hint: Option<String>,
    ) -> Result<NormalizedImage, PhotoError> {
        file::normalize_file(bytes, mime_hint, self.max_dimension, self.quality).await
    }

    /// Read and normalize an image file from disk
    ///
    /// The MIME hint comes from the file extension.
    pub async fn normalize_path(&self, path: &Path) -> Result<NormalizedImage, PhotoError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PhotoError::ReadFailed(format!("{}: {}", path.display(), e)))?;
        let mime_hint = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());

        self.normalize_file(bytes, mime_hint).await
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_square_png_of_capture_size() {
        let frame = CameraFrame::from_rgba(640, 480, vec![200u8; 640 * 480 * 4]);
        let image = ImageNormalizer::new().capture_frame(&frame).unwrap();

        assert_eq!(image.format(), EncodingFormat::Png);
        assert_eq!((image.width(), image.height()), (CAPTURE_SIZE, CAPTURE_SIZE));
        assert!(image.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_from_config_uses_configured_bounds() {
        let config = Config {
            max_file_dimension: 512,
            file_quality: EncodingQuality::High,
            ..Config::default()
        };
        let normalizer = ImageNormalizer::from_config(&config);
        assert_eq!(normalizer.max_dimension(), 512);

        let frame = CameraFrame::from_rgba(640, 480, vec![0u8; 640 * 480 * 4]);
        let image = normalizer.capture_frame(&frame).unwrap();
        assert_eq!((image.width(), image.height()), (CAPTURE_SIZE, CAPTURE_SIZE));
    }

    #[tokio::test]
    async fn test_missing_path_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageNormalizer::new()
            .normalize_path(&dir.path().join("missing.png"))
            .await;
        assert!(matches!(result, Err(PhotoError::ReadFailed(_))));
    }
}
