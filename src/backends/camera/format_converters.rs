// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to RGBA
//!
//! Every frame is converted to tightly packed RGBA before geometry work, so
//! the capture pipeline only has to deal with one layout.

use super::types::{BackendError, BackendResult, CameraFrame, PixelFormat};

/// Convert YUYV (YUV 4:2:2) to RGBA
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = if stride == 0 { w * 2 } else { stride as usize };
    let mut rgba = Vec::with_capacity(w * h * 4);

    for row in 0..h {
        let start = row * stride;
        let Some(line) = data.get(start..start + w * 2) else {
            rgba.resize(w * h * 4, 0);
            break;
        };

        for chunk in line.chunks_exact(4) {
            let y0 = chunk[0];
            let u = chunk[1];
            let y1 = chunk[2];
            let v = chunk[3];

            for luma in [y0, y1] {
                let (r, g, b) = yuv_to_rgb(luma, u, v);
                rgba.extend_from_slice(&[r, g, b, 255]);
            }
        }

        // Odd widths leave one pixel without a chroma pair
        if w % 2 == 1 {
            let luma = line[w * 2 - 2];
            rgba.extend_from_slice(&[luma, luma, luma, 255]);
        }
    }

    rgba
}

/// Expand packed RGB24 rows to RGBA
pub fn rgb24_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    expand_rows(data, width, height, stride, 3, |px| [px[0], px[1], px[2], 255])
}

/// Expand 8-bit grayscale rows to RGBA
pub fn gray8_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    expand_rows(data, width, height, stride, 1, |px| [px[0], px[0], px[0], 255])
}

fn expand_rows(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    bpp: usize,
    pixel: impl Fn(&[u8]) -> [u8; 4],
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = if stride == 0 { w * bpp } else { stride as usize };
    let mut rgba = Vec::with_capacity(w * h * 4);

    for row in 0..h {
        let start = row * stride;
        match data.get(start..start + w * bpp) {
            Some(line) => {
                for px in line.chunks_exact(bpp) {
                    rgba.extend_from_slice(&pixel(px));
                }
            }
            None => {
                rgba.resize(w * h * 4, 0);
                break;
            }
        }
    }

    rgba
}

/// Convert any supported frame into a tightly packed RGBA frame
///
/// MJPEG frames are decoded with the `image` crate; the decoded size wins
/// over whatever the device claimed.
pub fn frame_to_rgba(frame: &CameraFrame) -> BackendResult<CameraFrame> {
    let (width, height, rgba) = match frame.format {
        PixelFormat::RGBA if frame.stride == frame.width * 4 => return Ok(frame.clone()),
        PixelFormat::RGBA => (
            frame.width,
            frame.height,
            expand_rows(&frame.data, frame.width, frame.height, frame.stride, 4, |px| {
                [px[0], px[1], px[2], px[3]]
            }),
        ),
        PixelFormat::RGB24 => (
            frame.width,
            frame.height,
            rgb24_to_rgba(&frame.data, frame.width, frame.height, frame.stride),
        ),
        PixelFormat::Gray8 => (
            frame.width,
            frame.height,
            gray8_to_rgba(&frame.data, frame.width, frame.height, frame.stride),
        ),
        PixelFormat::YUYV => (
            frame.width,
            frame.height,
            yuyv_to_rgba(&frame.data, frame.width, frame.height, frame.stride),
        ),
        PixelFormat::MJPEG => {
            let decoded = image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
                .map_err(|e| BackendError::FormatNotSupported(format!("MJPEG decode: {}", e)))?
                .to_rgba8();
            let (w, h) = decoded.dimensions();
            (w, h, decoded.into_raw())
        }
    };

    Ok(CameraFrame {
        captured_at: frame.captured_at,
        ..CameraFrame::from_rgba(width, height, rgba)
    })
}

/// Convert YUV (BT.601) to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}
