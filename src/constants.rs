// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::path::PathBuf;

/// Application directory name under the XDG base directories
pub const APP_DIR_NAME: &str = "curio";

/// Side length of camera captures (square)
pub const CAPTURE_SIZE: u32 = 224;

/// Longest side of an imported image after normalization
pub const DEFAULT_MAX_FILE_DIMENSION: u32 = 1024;

/// Identity provider settings
pub mod auth {
    /// Shortest password the local provider accepts
    pub const MIN_PASSWORD_LENGTH: usize = 6;

    /// Length of generated password reset codes
    pub const RESET_TOKEN_LENGTH: usize = 8;

    /// PBKDF2-HMAC-SHA256 rounds for new password hashes
    pub const PBKDF2_ITERATIONS: u32 = 600_000;

    /// Derived password key length in bytes
    pub const PASSWORD_KEY_LENGTH: usize = 32;
}

/// Document collection names
pub mod collections {
    pub const COLLECTIONS: &str = "collections";
    pub const ITEMS: &str = "items";
}

/// Terminal preview timing
pub mod timing {
    use std::time::Duration;

    /// Preview redraw interval (~30fps)
    pub const PREVIEW_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

pub mod file_formats {
    /// Extensions accepted when importing images
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Config directory (`$XDG_CONFIG_HOME/curio`)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Data directory holding the document store and auth state
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
}

/// Directory scanned by the still-image camera backend
pub fn default_still_image_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions_case_insensitive() {
        assert!(file_formats::is_image_extension("JPG"));
        assert!(file_formats::is_image_extension("webp"));
        assert!(!file_formats::is_image_extension("mp4"));
    }

    #[test]
    fn test_app_dirs_end_with_app_name() {
        assert!(config_dir().ends_with(APP_DIR_NAME));
        assert!(default_data_dir().ends_with(APP_DIR_NAME));
    }
}
