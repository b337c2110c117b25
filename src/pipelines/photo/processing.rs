// SPDX-License-Identifier: GPL-3.0-only

//! Pixel work for captured frames and imported files
//!
//! - Camera frames: convert to RGBA, center-crop, scale to the capture size
//! - Imported images: scale down so the longer side fits the size bound

use super::capture::capture_region;
use crate::backends::camera::format_converters::frame_to_rgba;
use crate::backends::camera::types::CameraFrame;
use crate::errors::PhotoError;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

/// Filter used for every rescale
const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

/// Turn a camera frame into a tightly packed RGBA image
pub fn frame_to_image(frame: &CameraFrame) -> Result<RgbaImage, PhotoError> {
    if !frame.is_ready() {
        return Err(PhotoError::NoFrameAvailable);
    }

    let rgba = frame_to_rgba(frame).map_err(|e| PhotoError::ImageDecode(e.to_string()))?;
    let (width, height) = (rgba.width, rgba.height);
    let expected = (width as usize) * (height as usize) * 4;
    if rgba.data.len() < expected {
        return Err(PhotoError::ImageDecode(format!(
            "RGBA data too small: expected {}, got {}",
            expected,
            rgba.data.len()
        )));
    }

    RgbaImage::from_raw(width, height, rgba.data[..expected].to_vec())
        .ok_or_else(|| PhotoError::ImageDecode("frame does not fit its dimensions".into()))
}

/// Center-crop a frame and scale it to `target_width` x `target_height`
pub fn crop_and_scale(
    frame: &CameraFrame,
    target_width: u32,
    target_height: u32,
) -> Result<RgbaImage, PhotoError> {
    let region = capture_region(frame, target_width, target_height)?;
    let source = frame_to_image(frame)?;

    let (x, y, width, height) = region.pixel_bounds(source.width(), source.height());
    let cropped = imageops::crop_imm(&source, x, y, width, height).to_image();
    debug!(x, y, width, height, target_width, target_height, "Scaling capture crop");

    Ok(imageops::resize(
        &cropped,
        target_width,
        target_height,
        RESAMPLE_FILTER,
    ))
}

/// Dimensions after bounding the longer side to `max_side`
///
/// Aspect ratio is preserved and the shorter side never collapses below one
/// pixel. Images already within bounds keep their size.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    if width <= max_side && height <= max_side {
        return (width, height);
    }

    if width >= height {
        let scaled = (height as f64 * max_side as f64 / width as f64).round() as u32;
        (max_side, scaled.max(1))
    } else {
        let scaled = (width as f64 * max_side as f64 / height as f64).round() as u32;
        (scaled.max(1), max_side)
    }
}

/// Scale an imported image so neither side exceeds `max_side`
pub fn bound_dimensions(image: DynamicImage, max_side: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (new_width, new_height) = fit_within(width, height, max_side);
    if (new_width, new_height) == (width, height) {
        return image;
    }

    debug!(width, height, new_width, new_height, "Downscaling imported image");
    image.resize_exact(new_width, new_height, RESAMPLE_FILTER)
}
