// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/curio/config.json`. Missing fields take
//! their defaults, so older files keep loading after new settings appear.

use crate::backends::camera::CameraBackendType;
use crate::constants::{DEFAULT_MAX_FILE_DIMENSION, config_dir, default_data_dir};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::EncodingQuality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (V4L2 or still images)
    pub backend: CameraBackendType,
    /// Directory served by the still-image backend
    pub still_image_dir: Option<PathBuf>,
    /// Last camera that streamed successfully
    pub last_camera_id: Option<String>,
    /// Longest side of imported images
    pub max_file_dimension: u32,
    /// JPEG quality for imported images
    pub file_quality: EncodingQuality,
    /// Directory holding documents and accounts
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            still_image_dir: None,
            last_camera_id: None,
            max_file_dimension: DEFAULT_MAX_FILE_DIMENSION,
            file_quality: EncodingQuality::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE_NAME)
    }

    /// Load from `path`, falling back to defaults on any problem
    ///
    /// A missing file is normal on first start. A broken one is logged and
    /// ignored; the next save overwrites it.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                }
                Self::default()
            }
        }
    }

    /// Strict load from `path`
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "backend": "Still", "max_file_dimension": 640 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend, CameraBackendType::Still);
        assert_eq!(config.max_file_dimension, 640);
        assert_eq!(config.file_quality, EncodingQuality::Medium);
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
