// SPDX-License-Identifier: GPL-3.0-only

//! Image encoding to self-contained data URLs
//!
//! Stored item images are strings of the form
//! `data:<mime>;base64,<payload>`:
//! - PNG for camera captures (lossless, small at 224x224)
//! - JPEG for imported files (quality-controlled)

use crate::errors::PhotoError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// PNG format (lossless compression)
    Png,
    /// JPEG format (lossy compression)
    Jpeg,
}

impl EncodingFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            EncodingFormat::Png => "image/png",
            EncodingFormat::Jpeg => "image/jpeg",
        }
    }

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Png => "png",
            EncodingFormat::Jpeg => "jpg",
        }
    }

    fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(EncodingFormat::Png),
            "image/jpeg" | "image/jpg" => Some(EncodingFormat::Jpeg),
            _ => None,
        }
    }
}

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    #[default]
    Medium,
    /// High quality (low compression)
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// A normalized image, encoded and ready to store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    format: EncodingFormat,
    width: u32,
    height: u32,
    data_url: String,
}

impl NormalizedImage {
    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn into_data_url(self) -> String {
        self.data_url
    }

    /// Parse a stored data URL back into a normalized image
    ///
    /// The payload is decoded to recover the dimensions, so this also checks
    /// that the stored value is a real image.
    pub fn parse(data_url: &str) -> Result<Self, PhotoError> {
        let (format, bytes) = decode_data_url(data_url)?;
        let image_format = match format {
            EncodingFormat::Png => ImageFormat::Png,
            EncodingFormat::Jpeg => ImageFormat::Jpeg,
        };
        let image = image::load_from_memory_with_format(&bytes, image_format)?;

        Ok(Self {
            format,
            width: image.width(),
            height: image.height(),
            data_url: data_url.to_string(),
        })
    }

    /// Raw encoded bytes of the payload
    pub fn decode_payload(&self) -> Result<Vec<u8>, PhotoError> {
        decode_data_url(&self.data_url).map(|(_, bytes)| bytes)
    }
}

/// Split a `data:<mime>;base64,<payload>` string into format and bytes
pub fn decode_data_url(data_url: &str) -> Result<(EncodingFormat, Vec<u8>), PhotoError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| PhotoError::InvalidDataUrl("missing data: prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| PhotoError::InvalidDataUrl("missing payload separator".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| PhotoError::InvalidDataUrl("payload is not base64".into()))?;
    let format = EncodingFormat::from_mime_type(mime)
        .ok_or_else(|| PhotoError::InvalidDataUrl(format!("unsupported type '{}'", mime)))?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| PhotoError::InvalidDataUrl(e.to_string()))?;
    Ok((format, bytes))
}

fn to_data_url(format: EncodingFormat, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}

/// Encode an RGBA image as a PNG data URL
pub fn encode_png(image: &RgbaImage) -> Result<NormalizedImage, PhotoError> {
    let mut buffer = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)?;
    debug!(size = buffer.len(), "PNG encoding complete");

    Ok(NormalizedImage {
        format: EncodingFormat::Png,
        width: image.width(),
        height: image.height(),
        data_url: to_data_url(EncodingFormat::Png, &buffer),
    })
}

/// Encode an image as a JPEG data URL
///
/// Alpha is dropped; JPEG has no transparency.
pub fn encode_jpeg(
    image: &DynamicImage,
    quality: EncodingQuality,
) -> Result<NormalizedImage, PhotoError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();

    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.jpeg_quality());
    rgb.write_with_encoder(encoder)?;
    debug!(size = buffer.len(), quality = quality.jpeg_quality(), "JPEG encoding complete");

    Ok(NormalizedImage {
        format: EncodingFormat::Jpeg,
        width: rgb.width(),
        height: rgb.height(),
        data_url: to_data_url(EncodingFormat::Jpeg, &buffer),
    })
}
