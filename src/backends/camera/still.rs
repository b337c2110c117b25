// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera backend
//!
//! Every image file in a directory is presented as a video-input device that
//! keeps delivering the same frame. Useful on machines without a camera and
//! as a deterministic source for tests.

use super::types::*;
use super::{CameraBackend, CameraBackendType, MediaStream};
use crate::constants::file_formats::is_image_extension;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Backend serving image files from one directory
#[derive(Debug, Clone)]
pub struct StillImageBackend {
    dir: PathBuf,
}

impl StillImageBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn image_paths(&self) -> BackendResult<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", self.dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_image_extension)
}

/// Decode an image file into an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    debug!(path = %path.display(), "Loading still image");

    let rgba = image::open(path)
        .map_err(|e| {
            BackendError::DeviceNotFound(format!("cannot load '{}': {}", path.display(), e))
        })?
        .to_rgba8();

    let (width, height) = rgba.dimensions();
    Ok(CameraFrame {
        captured_at: Instant::now(),
        ..CameraFrame::from_rgba(width, height, rgba.into_raw())
    })
}

impl CameraBackend for StillImageBackend {
    fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>> {
        Ok(self
            .image_paths()?
            .into_iter()
            .map(|path| {
                let label = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                CameraDevice::video_input(path.display().to_string(), label)
            })
            .collect())
    }

    fn open_stream(&self, device_id: Option<&str>) -> BackendResult<Box<dyn MediaStream>> {
        let path = match device_id {
            Some(id) => PathBuf::from(id),
            None => self
                .image_paths()?
                .into_iter()
                .next()
                .ok_or_else(|| BackendError::DeviceNotFound(self.dir.display().to_string()))?,
        };

        let frame = load_image_as_frame(&path)?;
        info!(
            path = %path.display(),
            width = frame.width,
            height = frame.height,
            "Still image stream started"
        );

        Ok(Box::new(StillImageStream {
            device_id: path.display().to_string(),
            frame: Some(frame),
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Still
    }

    fn is_available(&self) -> bool {
        self.image_paths().map(|p| !p.is_empty()).unwrap_or(false)
    }
}

/// Stream that repeats a single decoded image
struct StillImageStream {
    device_id: String,
    frame: Option<CameraFrame>,
}

impl MediaStream for StillImageStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn latest_frame(&mut self) -> Option<CameraFrame> {
        let frame = self.frame.as_ref()?;
        // Cloning only bumps the pixel buffer's refcount
        Some(CameraFrame {
            captured_at: Instant::now(),
            ..frame.clone()
        })
    }

    fn is_live(&self) -> bool {
        self.frame.is_some()
    }

    fn stop(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_enumerates_images_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 2, 2);
        write_png(&dir.path().join("a.png"), 2, 2);
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let backend = StillImageBackend::new(dir.path());
        let labels: Vec<String> = backend
            .enumerate_devices()
            .unwrap()
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn test_stream_repeats_frame_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("only.png"), 6, 4);

        let backend = StillImageBackend::new(dir.path());
        let mut stream = backend.open_stream(None).unwrap();
        let frame = stream.latest_frame().unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert!(stream.latest_frame().is_some());

        stream.stop();
        assert!(!stream.is_live());
        assert!(stream.latest_frame().is_none());
    }

    #[test]
    fn test_missing_file_is_device_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StillImageBackend::new(dir.path());
        let missing = dir.path().join("gone.png");
        assert!(matches!(
            backend.open_stream(missing.to_str()),
            Err(BackendError::DeviceNotFound(_))
        ));
    }
}
