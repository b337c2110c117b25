// SPDX-License-Identifier: GPL-3.0-only

//! Imported image files
//!
//! Any decodable image becomes a JPEG whose longer side is bounded. Decoding
//! and encoding are CPU-bound and run on the blocking pool.

use super::encoding::{EncodingQuality, NormalizedImage, encode_jpeg};
use super::processing::bound_dimensions;
use crate::errors::PhotoError;
use image::ImageFormat;
use tracing::{debug, info, warn};

/// Decode image bytes, trusting the declared type first and sniffing after
///
/// Every failure here is a [`PhotoError::ImageDecode`], including truncated
/// files the decoder reports as I/O errors.
fn decode(bytes: &[u8], mime_hint: Option<&str>) -> Result<image::DynamicImage, PhotoError> {
    if let Some(format) = mime_hint.and_then(ImageFormat::from_mime_type) {
        match image::load_from_memory_with_format(bytes, format) {
            Ok(image) => return Ok(image),
            Err(e) => {
                debug!(mime = mime_hint, error = %e, "Declared type did not decode, sniffing")
            }
        }
    }

    image::load_from_memory(bytes).map_err(|e| PhotoError::ImageDecode(e.to_string()))
}

/// Normalize raw file bytes synchronously
pub fn normalize_bytes(
    bytes: &[u8],
    mime_hint: Option<&str>,
    max_dimension: u32,
    quality: EncodingQuality,
) -> Result<NormalizedImage, PhotoError> {
    let image = decode(bytes, mime_hint).inspect_err(|e| {
        warn!(error = %e, size = bytes.len(), "Imported file is not a decodable image");
    })?;

    let (width, height) = (image.width(), image.height());
    let bounded = bound_dimensions(image, max_dimension);
    let normalized = encode_jpeg(&bounded, quality)?;

    info!(
        width,
        height,
        out_width = normalized.width(),
        out_height = normalized.height(),
        "Normalized imported image"
    );
    Ok(normalized)
}

/// Normalize raw file bytes on the blocking pool
pub async fn normalize_file(
    bytes: Vec<u8>,
    mime_hint: Option<String>,
    max_dimension: u32,
    quality: EncodingQuality,
) -> Result<NormalizedImage, PhotoError> {
    tokio::task::spawn_blocking(move || {
        normalize_bytes(&bytes, mime_hint.as_deref(), max_dimension, quality)
    })
    .await
    .map_err(|e| PhotoError::TaskFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Vec::new();
        image::RgbImage::from_pixel(width, height, image::Rgb([90, 120, 150]))
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_large_png_is_bounded_jpeg() {
        let out = normalize_bytes(&png_bytes(2000, 500), Some("image/png"), 1024, EncodingQuality::Medium)
            .unwrap();
        assert_eq!((out.width(), out.height()), (1024, 256));
        assert!(out.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_wrong_mime_hint_falls_back_to_sniffing() {
        let out = normalize_bytes(&png_bytes(10, 20), Some("image/jpeg"), 1024, EncodingQuality::Low)
            .unwrap();
        assert_eq!((out.width(), out.height()), (10, 20));
    }

    #[test]
    fn test_non_image_is_decode_error() {
        let err = normalize_bytes(b"plain text", Some("text/plain"), 1024, EncodingQuality::Medium)
            .unwrap_err();
        assert!(matches!(err, PhotoError::ImageDecode(_)));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let png = png_bytes(64, 64);
        for cut in [8, 30, png.len() / 2] {
            let result = normalize_bytes(&png[..cut], Some("image/png"), 1024, EncodingQuality::Medium);
            assert!(
                matches!(result, Err(PhotoError::ImageDecode(_))),
                "cut at {cut}: {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_async_normalization_matches_sync() {
        let out = normalize_file(png_bytes(30, 30), None, 16, EncodingQuality::High)
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (16, 16));
    }
}
