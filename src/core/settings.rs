//! Application settings
//!
//! Persisted as JSON to `<config dir>/DVD Menu Burner/app_settings.json`.
//! Missing or unreadable settings fall back to defaults; every field carries a
//! serde default so older files keep loading as fields are added.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::bitrate::{DEFAULT_AUDIO_BITRATE_KBPS, DVD_CAPACITY_MB, MENU_OVERHEAD_MB};
use super::planner::PlannerConfig;

/// Settings persistence failures
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not determine the user configuration directory")]
    NoConfigDir,
    #[error("failed to access settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Broadcast standard of the authored disc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    #[default]
    Ntsc,
    Pal,
}

impl VideoStandard {
    /// Frame size in pixels (width, height)
    pub fn resolution(self) -> (u32, u32) {
        match self {
            VideoStandard::Ntsc => (720, 480),
            VideoStandard::Pal => (720, 576),
        }
    }

    /// Frame rate in the form ffmpeg accepts
    pub fn frame_rate(self) -> &'static str {
        match self {
            VideoStandard::Ntsc => "30000/1001",
            VideoStandard::Pal => "25",
        }
    }

    /// Value for ffmpeg's `-target` option
    pub fn ffmpeg_target(self) -> &'static str {
        match self {
            VideoStandard::Ntsc => "ntsc-dvd",
            VideoStandard::Pal => "pal-dvd",
        }
    }

    /// Value for dvdauthor's `format` attribute
    pub fn dvdauthor_format(self) -> &'static str {
        match self {
            VideoStandard::Ntsc => "ntsc",
            VideoStandard::Pal => "pal",
        }
    }
}

/// Visual treatment of the menu background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuStyle {
    /// Soft vignette over the backdrop
    #[default]
    Modern,
    /// CRT-style scanlines
    Retro,
}

/// AC-3 audio parameters for titles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    #[serde(default = "default_audio_bitrate")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
}

fn default_audio_bitrate() -> u32 {
    DEFAULT_AUDIO_BITRATE_KBPS
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_channels() -> u32 {
    2
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            bitrate_kbps: default_audio_bitrate(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

/// Menu grid geometry and colours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSettings {
    /// Button thumbnail size (px)
    pub thumb_width: u32,
    pub thumb_height: u32,
    /// Buttons per grid row
    pub columns: usize,
    /// Gap between buttons (px)
    pub padding: u32,
    pub background_color: [u8; 3],
    pub highlight_color: [u8; 3],
    pub select_color: [u8; 3],
    pub text_color: [u8; 3],
    pub subtitle_color: [u8; 3],
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            thumb_width: 160,
            thumb_height: 90,
            columns: 3,
            padding: 20,
            background_color: [20, 20, 30],
            highlight_color: [255, 215, 0],
            select_color: [255, 255, 255],
            text_color: [255, 255, 255],
            subtitle_color: [200, 200, 200],
        }
    }
}

fn default_capacity() -> f64 {
    DVD_CAPACITY_MB
}

fn default_overhead() -> f64 {
    MENU_OVERHEAD_MB
}

fn default_burn_speed() -> u32 {
    4
}

/// Application-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub video_standard: VideoStandard,
    #[serde(default)]
    pub audio: AudioSettings,
    /// Physical disc capacity (MB)
    #[serde(default = "default_capacity")]
    pub disc_capacity_mb: f64,
    /// Reserved for menus (MB)
    #[serde(default = "default_overhead")]
    pub menu_overhead_mb: f64,
    #[serde(default)]
    pub menu_style: MenuStyle,
    #[serde(default)]
    pub menu: MenuSettings,
    /// Concurrent encodes; automatic when unset
    #[serde(default)]
    pub max_parallel_encodes: Option<usize>,
    /// Extract embedded subtitles alongside each title
    #[serde(default)]
    pub include_subtitles: bool,
    /// Where intermediate files are written; system temp dir when unset
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    /// Where finished ISO images are written; current dir when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Burner device, e.g. /dev/sr0
    #[serde(default)]
    pub burn_device: Option<String>,
    #[serde(default = "default_burn_speed")]
    pub burn_speed: u32,
    /// Whether to simulate burning (don't actually burn)
    #[serde(default)]
    pub simulate_burn: bool,
    /// Explicit tool locations, keyed by tool name
    #[serde(default)]
    pub tool_paths: HashMap<String, PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            video_standard: VideoStandard::default(),
            audio: AudioSettings::default(),
            disc_capacity_mb: default_capacity(),
            menu_overhead_mb: default_overhead(),
            menu_style: MenuStyle::default(),
            menu: MenuSettings::default(),
            max_parallel_encodes: None,
            include_subtitles: false,
            staging_dir: None,
            output_dir: None,
            burn_device: None,
            burn_speed: default_burn_speed(),
            simulate_burn: false,
            tool_paths: HashMap::new(),
        }
    }
}

impl AppSettings {
    const SETTINGS_FILE: &'static str = "app_settings.json";

    /// Directory holding the settings file
    pub fn config_dir() -> Result<PathBuf, SettingsError> {
        let base = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(base.join("DVD Menu Burner"))
    }

    /// Default settings file location
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        Ok(Self::config_dir()?.join(Self::SETTINGS_FILE))
    }

    /// Load app settings from the default location, or return defaults
    pub fn load() -> Self {
        match Self::default_path().and_then(|p| Self::load_from(&p)) {
            Ok(settings) => {
                log::debug!("Loaded app settings from disk");
                settings
            }
            Err(e) => {
                log::debug!("Using default app settings: {}", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save app settings to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::default_path()?)
    }

    /// Save settings to an explicit file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)?;

        log::debug!("Saved app settings to {:?}", path);
        Ok(())
    }

    /// Planner parameters derived from these settings
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            disc_capacity_mb: self.disc_capacity_mb,
            overhead_mb: self.menu_overhead_mb,
            audio_bitrate_kbps: self.audio.bitrate_kbps,
            max_titles_per_disc: None,
        }
    }

    /// Staging directory, falling back to the system temp dir
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dvd-menu-burner"))
    }

    /// Output directory for ISO images, falling back to the current dir
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.video_standard, VideoStandard::Ntsc);
        assert_eq!(settings.audio.bitrate_kbps, 448);
        assert_eq!(settings.planner_config().usable_capacity_mb(), 4400.0);
        assert!(!settings.simulate_burn);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("app_settings.json");

        let mut settings = AppSettings::default();
        settings.video_standard = VideoStandard::Pal;
        settings.menu_style = MenuStyle::Retro;
        settings.burn_device = Some("/dev/sr0".to_string());
        settings
            .tool_paths
            .insert("ffmpeg".to_string(), PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        settings.save_to(&path).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app_settings.json");
        std::fs::write(&path, r#"{ "video_standard": "pal", "simulate_burn": true }"#).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded.video_standard, VideoStandard::Pal);
        assert!(loaded.simulate_burn);
        assert_eq!(loaded.disc_capacity_mb, DVD_CAPACITY_MB);
        assert_eq!(loaded.audio, AudioSettings::default());
        assert_eq!(loaded.menu, MenuSettings::default());
    }

    #[test]
    fn test_partial_menu_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app_settings.json");
        std::fs::write(
            &path,
            r#"{ "menu": { "columns": 2, "highlight_color": [0, 128, 255] } }"#,
        )
        .unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded.menu.columns, 2);
        assert_eq!(loaded.menu.highlight_color, [0, 128, 255]);
        assert_eq!(loaded.menu.thumb_width, 160);
        assert_eq!(loaded.menu.background_color, [20, 20, 30]);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app_settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_standard_parameters() {
        assert_eq!(VideoStandard::Ntsc.resolution(), (720, 480));
        assert_eq!(VideoStandard::Pal.resolution(), (720, 576));
        assert_eq!(VideoStandard::Pal.ffmpeg_target(), "pal-dvd");
        assert_eq!(VideoStandard::Ntsc.frame_rate(), "30000/1001");
    }
}
