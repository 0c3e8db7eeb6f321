//! Configuration file handling.
//!
//! Loads `~/.config/dslr-tether/config.toml` (or a custom path via
//! `--config`). Every field is optional; the CLI merges values as
//! CLI > config file > built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub sdk: SdkConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct PathsConfig {
    /// Where captured stills are written.
    pub images_dir: Option<PathBuf>,
    /// Fixed file the `m` key saves the preview JPEG to.
    pub preview_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TimingConfig {
    /// Mirror settle wait after rerouting live output, seconds.
    pub settle_secs: Option<u64>,
    /// Wait after the capture command, seconds.
    pub capture_secs: Option<u64>,
    /// Live view poll period, milliseconds.
    pub poll_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OverlayConfig {
    /// Calibration grid pitch in pixels.
    pub grid_pitch: Option<i32>,
    /// Window upscale factor (1, 2 or 4).
    pub scale: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SdkConfig {
    /// Path of the EDSDK dynamic library.
    pub library: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraConfig {
    /// Maximum sensor width, used to size the preview stream.
    pub max_width: Option<u32>,
    /// Maximum sensor height.
    pub max_height: Option<u32>,
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `None`. A missing default file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::read(&path)
    }

    /// Load configuration from an explicitly given path; the file must exist.
    pub fn load_from_explicit(path: &Path) -> Result<Self, ConfigError> {
        Self::read(path)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dslr-tether").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/dslr-tether/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config: Config = toml::from_str("").expect("empty toml");
        assert!(config.paths.images_dir.is_none());
        assert!(config.timing.poll_ms.is_none());
        assert!(config.overlay.grid_pitch.is_none());
    }

    #[test]
    fn test_partial_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            images_dir = "/data/shots"

            [timing]
            settle_secs = 3
            poll_ms = 50

            [overlay]
            grid_pitch = 80
            scale = 4
            "#,
        )
        .expect("parse");
        assert_eq!(
            config.paths.images_dir.as_deref(),
            Some(Path::new("/data/shots"))
        );
        assert_eq!(config.timing.settle_secs, Some(3));
        assert_eq!(config.timing.capture_secs, None);
        assert_eq!(config.timing.poll_ms, Some(50));
        assert_eq!(config.overlay.grid_pitch, Some(80));
        assert_eq!(config.overlay.scale, Some(4));
    }

    #[test]
    fn test_sdk_and_camera_sections() {
        let config: Config = toml::from_str(
            r#"
            [sdk]
            library = "C:/EDSDK/EDSDK.dll"

            [camera]
            max_width = 5184
            max_height = 3456
            "#,
        )
        .expect("parse");
        assert!(config.sdk.library.is_some());
        assert_eq!(config.camera.max_width, Some(5184));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "paths = 7").expect("write");
        let err = Config::load_from_explicit(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_missing_default_file_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.toml");
        let config = Config::load(Some(&path)).expect("load");
        assert!(config.paths.preview_file.is_none());
    }
}
