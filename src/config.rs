//! Runtime configuration
//!
//! Everything is optional, missing keys take their defaults. Files are TOML.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::Mode;
use crate::codec::hsv::{Hsv, HsvMethod};
use crate::error::{Error, Result};
use crate::format::FourCC;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraOptions,
    pub sensor: SensorOptions,
    pub logging: LoggingOptions,
}

impl Config {
    /// Loads an explicit file, or the first file found in the usual places, or defaults
    ///
    /// Environment overrides are applied last.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("using configuration file {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("no wgcam.toml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("cannot read cwd: {}", e)))?;
        let local = cwd.join("wgcam.toml");
        if local.exists() {
            return Ok(Some(local));
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config).join("wgcam").join("config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parses TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        self.camera.apply_env_overrides();
        self.logging.apply_env_overrides();
    }
}

/// Which device to open and how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Device node, overridable via `WGCAM_DEVICE`
    pub device: PathBuf,
    /// `unset`, `streaming` or `readwrite`
    pub mode: String,
    /// Negotiate a decodable pixelformat on open
    pub decompressor: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Fourcc to negotiate instead of probing the decompressor table
    pub pixelformat: Option<String>,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            mode: "unset".to_string(),
            decompressor: true,
            width: None,
            height: None,
            pixelformat: None,
        }
    }
}

impl CameraOptions {
    fn apply_env_overrides(&mut self) {
        if let Some(device) = env::var_os("WGCAM_DEVICE") {
            self.device = PathBuf::from(device);
        }
    }

    pub fn capture_mode(&self) -> Result<Mode> {
        self.mode.parse()
    }

    pub fn pixelformat(&self) -> Result<Option<FourCC>> {
        self.pixelformat
            .as_deref()
            .map(str::parse::<FourCC>)
            .transpose()
    }

    /// Requested resolution, only when both dimensions are given
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// Detection pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOptions {
    /// Lower corner of the tracked colour range
    pub hsv_bottom: Hsv,
    /// Upper corner, a hue below the bottom hue wraps through red
    pub hsv_top: Hsv,
    pub hsv_method: HsvMethod,
    /// 5x5 median on the colour mask
    pub noise_reduction: bool,
    /// Frames averaged into the background model
    pub background_frames: u32,
    /// Difference to the background that counts as motion
    pub motion_threshold: u8,
    /// Gradient that counts as an edge
    pub edge_threshold: u8,
    /// Votes a centre needs before it is reported
    pub min_votes: u32,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            hsv_bottom: Hsv::new(0.0, 0.4, 0.3),
            hsv_top: Hsv::new(40.0, 1.0, 1.0),
            hsv_method: HsvMethod::Fast,
            noise_reduction: true,
            background_frames: 25,
            motion_threshold: 30,
            edge_threshold: 128,
            min_votes: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Filter directive, overridable via `WGCAM_LOG`
    pub level: String,
    pub color: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            color: true,
        }
    }
}

impl LoggingOptions {
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("WGCAM_LOG") {
            self.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.camera.device, PathBuf::from("/dev/video0"));
        assert_eq!(config.camera.capture_mode().unwrap(), Mode::Unset);
        assert_eq!(config.sensor.background_frames, 25);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parses_sections() {
        let config = Config::parse(
            r#"
            [camera]
            device = "/dev/video2"
            mode = "readwrite"
            width = 320
            height = 240
            pixelformat = "MJPG"

            [sensor]
            hsv_method = "reference"
            noise_reduction = false
            hsv_bottom = { hue = 200.0, sat = 0.5, val = 0.5 }
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.device, PathBuf::from("/dev/video2"));
        assert_eq!(config.camera.capture_mode().unwrap(), Mode::ReadWrite);
        assert_eq!(config.camera.resolution(), Some((320, 240)));
        assert_eq!(config.camera.pixelformat().unwrap(), Some(FourCC::MJPG));
        assert_eq!(config.sensor.hsv_method, HsvMethod::Reference);
        assert!(!config.sensor.noise_reduction);
        assert_eq!(config.sensor.hsv_bottom, Hsv::new(200.0, 0.5, 0.5));
        assert_eq!(config.sensor.hsv_top, SensorOptions::default().hsv_top);
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(matches!(
            Config::parse("[camera]\nwidth = \"wide\""),
            Err(Error::Config(_))
        ));

        let mut camera = CameraOptions::default();
        camera.mode = "userptr".to_string();
        assert!(matches!(camera.capture_mode(), Err(Error::Config(_))));
        camera.pixelformat = Some("TOOLONG".to_string());
        assert!(camera.pixelformat().is_err());
    }

    #[test]
    fn missing_file() {
        let res = Config::load(Some(Path::new("/nonexistent/wgcam.toml")));
        assert!(matches!(res, Err(Error::Config(_))));
    }
}
