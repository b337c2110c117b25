// SPDX-License-Identifier: GPL-3.0-only

//! Center-crop geometry for camera captures
//!
//! The capture target is square while camera frames usually are not. The
//! largest source region with the target's aspect ratio is taken from the
//! center of the frame and then scaled to the target size.

use crate::backends::camera::types::CameraFrame;
use crate::errors::PhotoError;
use tracing::debug;

/// Source region of a frame, in (possibly fractional) pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    /// Snap to whole pixels inside a `frame_width` x `frame_height` frame
    ///
    /// Always yields at least one pixel in each direction.
    pub fn pixel_bounds(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let x = (self.x.round().max(0.0) as u32).min(frame_width.saturating_sub(1));
        let y = (self.y.round().max(0.0) as u32).min(frame_height.saturating_sub(1));
        let width = (self.width.round() as u32).clamp(1, frame_width - x);
        let height = (self.height.round() as u32).clamp(1, frame_height - y);
        (x, y, width, height)
    }
}

/// Compute the centered crop of a `video_width` x `video_height` frame that
/// matches the aspect ratio of `target_width` x `target_height`
///
/// Frames wider than the target keep their full height and lose equal
/// margins left and right. Every other frame keeps its full width and loses
/// equal margins top and bottom.
///
/// Returns `None` when any dimension is zero.
pub fn center_crop(
    video_width: u32,
    video_height: u32,
    target_width: u32,
    target_height: u32,
) -> Option<CropRegion> {
    if video_width == 0 || video_height == 0 || target_width == 0 || target_height == 0 {
        return None;
    }

    let vw = video_width as f64;
    let vh = video_height as f64;
    let target_aspect = target_width as f64 / target_height as f64;

    let region = if vw / vh > target_aspect {
        let height = vh;
        let width = height * target_aspect;
        CropRegion {
            x: (vw - width) / 2.0,
            y: 0.0,
            width,
            height,
        }
    } else {
        let width = vw;
        let height = width / target_aspect;
        CropRegion {
            x: 0.0,
            y: (vh - height) / 2.0,
            width,
            height,
        }
    };

    Some(region)
}

/// Crop region for a live frame, refusing frames that are not ready yet
pub fn capture_region(
    frame: &CameraFrame,
    target_width: u32,
    target_height: u32,
) -> Result<CropRegion, PhotoError> {
    if !frame.is_ready() {
        return Err(PhotoError::NoFrameAvailable);
    }

    let region = center_crop(frame.width, frame.height, target_width, target_height)
        .ok_or(PhotoError::NoFrameAvailable)?;
    debug!(
        frame_width = frame.width,
        frame_height = frame.height,
        ?region,
        "Computed capture crop"
    );
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_frame_crops_sides() {
        let region = center_crop(640, 480, 224, 224).unwrap();
        assert_eq!(
            region,
            CropRegion {
                x: 80.0,
                y: 0.0,
                width: 480.0,
                height: 480.0
            }
        );
    }

    #[test]
    fn test_portrait_frame_crops_top_and_bottom() {
        let region = center_crop(480, 640, 224, 224).unwrap();
        assert_eq!((region.x, region.y), (0.0, 80.0));
        assert_eq!((region.width, region.height), (480.0, 480.0));
    }

    #[test]
    fn test_square_frame_is_untouched() {
        let region = center_crop(300, 300, 224, 224).unwrap();
        assert_eq!(region.pixel_bounds(300, 300), (0, 0, 300, 300));
    }

    #[test]
    fn test_zero_dimensions_have_no_crop() {
        assert!(center_crop(0, 480, 224, 224).is_none());
        assert!(center_crop(640, 0, 224, 224).is_none());
    }

    #[test]
    fn test_pixel_bounds_stay_inside_frame() {
        let region = center_crop(641, 479, 224, 224).unwrap();
        let (x, y, w, h) = region.pixel_bounds(641, 479);
        assert!(x + w <= 641);
        assert!(y + h <= 479);
        assert_eq!(h, 479);
    }
}
