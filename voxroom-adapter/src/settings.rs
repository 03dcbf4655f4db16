//! Network adapter settings
//!
//! Settings are stored as JSON in `network.json` under the platform config
//! directory (`~/.config/voxroom/` on Linux). Missing fields take their
//! defaults so older files keep loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voxroom_common::{
    DEFAULT_AUDIO_EVENT_TAG, DeliveryMode, ErrorKind, RESERVED_EVENT_TAG_START,
    is_application_event_tag,
};

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "voxroom";

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "network.json";

/// Errors loading, saving, or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON for [`NetworkSettings`]
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured event tag collides with the transport's own codes
    #[error("event tag {0} is reserved (must be below {max})", max = RESERVED_EVENT_TAG_START)]
    ReservedEventTag(u8),

    /// The platform config directory could not be determined
    #[error("no config directory available on this platform")]
    NoConfigDir,
}

impl SettingsError {
    /// Machine-readable kind for this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

/// Settings for a [`ChatroomNetwork`](crate::network::ChatroomNetwork)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Application-level event code used for audio segments
    #[serde(default = "default_event_tag")]
    pub event_tag: u8,

    /// Delivery mode for outgoing audio
    #[serde(default)]
    pub delivery: DeliveryMode,

    /// Track per-peer sequence indices and log gaps
    #[serde(default = "default_true")]
    pub track_sequence_gaps: bool,

    /// Drop audio events that claim to come from the local peer
    #[serde(default = "default_true")]
    pub ignore_own_events: bool,
}

fn default_event_tag() -> u8 {
    DEFAULT_AUDIO_EVENT_TAG
}

fn default_true() -> bool {
    true
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            event_tag: default_event_tag(),
            delivery: DeliveryMode::default(),
            track_sequence_gaps: true,
            ignore_own_events: true,
        }
    }
}

impl NetworkSettings {
    /// Get the platform-specific settings file path
    ///
    /// Returns None if the config directory cannot be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Load and validate settings from `path`
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default path, or return defaults
    ///
    /// Falls back to defaults if the config directory cannot be determined,
    /// the file does not exist, or it fails to load (logged as a warning).
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    "Ignoring settings file {}: {}; using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save settings to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Save settings to the platform default path
    pub fn save_default(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save(&path)?;
        Ok(path)
    }

    /// Check that the settings can be used with the transport
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !is_application_event_tag(self.event_tag) {
            return Err(SettingsError::ReservedEventTag(self.event_tag));
        }
        Ok(())
    }
}
