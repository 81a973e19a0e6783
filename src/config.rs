// Configuration for Arcap recordings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Device interface orientation at the moment recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    /// Native orientation of the camera sensor
    LandscapeRight,
}

impl Orientation {
    /// Whether the upright picture is taller than the sensor image
    pub fn is_portrait(&self) -> bool {
        matches!(self, Orientation::Portrait | Orientation::PortraitUpsideDown)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::LandscapeRight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Phone,
    Tablet,
}

impl Default for DeviceClass {
    fn default() -> Self {
        Self::Phone
    }
}

/// Optional parameters supplied by the caller when starting a recording.
/// Anything left unset is derived from the current camera frame or settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

/// Parameters of one recording. Immutable once the recording has started.
///
/// `target_width` and `target_height` describe the upright picture as the
/// viewer sees it, not the sensor-aligned encoded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub target_fps: u32,
    pub orientation: Orientation,
    pub device_class: DeviceClass,
}

impl RecordingConfig {
    /// Build a config, rejecting zero dimensions or frame rate.
    pub fn new(
        target_width: u32,
        target_height: u32,
        target_fps: u32,
        orientation: Orientation,
        device_class: DeviceClass,
    ) -> Result<Self, String> {
        if target_width == 0 || target_height == 0 {
            return Err(format!("invalid target size {}x{}", target_width, target_height));
        }
        if target_fps == 0 {
            return Err("target fps must be greater than zero".into());
        }
        Ok(Self {
            target_width,
            target_height,
            target_fps,
            orientation,
            device_class,
        })
    }
}

/// Recorder settings, persisted as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderSettings {
    /// Directory for intermediate and final files (system temp dir when unset)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Prefix for generated file names
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Frame rate used when the caller does not ask for one
    #[serde(default = "default_fps")]
    pub default_fps: u32,

    /// Units per second for presentation timestamps
    #[serde(default = "default_timescale")]
    pub timescale: i32,

    /// Average bitrate in bits per second; derived from geometry when unset
    #[serde(default)]
    pub bitrate: Option<u32>,

    /// Keyframe interval in frames
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u32,

    /// Remux the intermediate .mov into .mp4 when recording stops
    #[serde(default = "default_true")]
    pub transcode_to_mp4: bool,

    /// Frames buffered between a pushing camera and the ingest poller
    #[serde(default = "default_frame_queue_depth")]
    pub frame_queue_depth: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            file_prefix: default_file_prefix(),
            default_fps: default_fps(),
            timescale: default_timescale(),
            bitrate: None,
            keyframe_interval: default_keyframe_interval(),
            transcode_to_mp4: true,
            frame_queue_depth: default_frame_queue_depth(),
        }
    }
}

impl RecorderSettings {
    /// Load settings from the user config directory or return defaults
    pub fn load_or_default() -> Self {
        Self::load_from(&get_settings_path())
    }

    /// Load settings from a specific file, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(settings) => return settings,
                    Err(e) => {
                        log::warn!("Failed to parse settings {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file {}: {}", path.display(), e);
                }
            }
        }

        Self::default()
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Directory recordings are written to
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Get the settings file path
pub fn get_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arcap")
        .join("settings.toml")
}

fn default_file_prefix() -> String {
    "arkit_camera".to_string()
}

fn default_fps() -> u32 {
    30
}

/// QuickTime's customary movie timescale; divides evenly by 24, 25, 30 and 60
fn default_timescale() -> i32 {
    600
}

fn default_keyframe_interval() -> u32 {
    30
}

fn default_frame_queue_depth() -> usize {
    8
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_zero_values() {
        let portrait = |w, h, fps| {
            RecordingConfig::new(w, h, fps, Orientation::Portrait, DeviceClass::Phone)
        };
        assert!(portrait(0, 720, 30).is_err());
        assert!(portrait(1280, 0, 30).is_err());
        assert!(portrait(1280, 720, 0).is_err());
        assert!(portrait(1280, 720, 30).is_ok());
    }

    #[test]
    fn partial_settings_file_uses_defaults() {
        let settings: RecorderSettings =
            toml::from_str("default_fps = 24\nbitrate = 2000000\n").unwrap();
        assert_eq!(settings.default_fps, 24);
        assert_eq!(settings.bitrate, Some(2_000_000));
        assert_eq!(settings.timescale, 600);
        assert_eq!(settings.file_prefix, "arkit_camera");
        assert!(settings.transcode_to_mp4);
    }

    #[test]
    fn settings_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = RecorderSettings::default();
        settings.output_dir = Some(dir.path().to_path_buf());
        settings.keyframe_interval = 48;
        settings.save_to(&path).unwrap();

        assert_eq!(RecorderSettings::load_from(&path), settings);
    }

    #[test]
    fn unreadable_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "default_fps = \"fast\"").unwrap();

        assert_eq!(RecorderSettings::load_from(&path), RecorderSettings::default());
    }
}
