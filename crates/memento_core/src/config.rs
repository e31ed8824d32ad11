use crate::error::Result;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::transition::Easing;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tuning. Every field has a default, so a partial or empty JSON
/// object is a valid config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub history_limit: usize,
    pub autosave: AutosaveConfig,
    pub playback: PlaybackConfig,
    pub project_defaults: ProjectSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            autosave: AutosaveConfig::default(),
            playback: PlaybackConfig::default(),
            project_defaults: ProjectSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub saved_display_ms: u64,
    pub error_display_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            saved_display_ms: 2000,
            error_display_ms: 3000,
        }
    }
}

impl AutosaveConfig {
    pub fn debounce(&self) -> TimeUs {
        TimeUs::from_millis(self.debounce_ms)
    }

    pub fn saved_display(&self) -> TimeUs {
        TimeUs::from_millis(self.saved_display_ms)
    }

    pub fn error_display(&self) -> TimeUs {
        TimeUs::from_millis(self.error_display_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    pub frame_rate: u32,
    pub easing: Easing,
    /// Photo display time used when neither the photo nor the project has a
    /// usable duration.
    pub fallback_photo_duration: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            easing: Easing::Linear,
            fallback_photo_duration: 5.0,
        }
    }
}

impl PlaybackConfig {
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / u64::from(self.frame_rate.max(1)))
    }
}

impl EngineConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        tracing::debug!(path = %path.as_ref().display(), "engine config loaded");
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// 1:1 preset.
pub fn preset_square() -> ProjectSettings {
    ProjectSettings {
        resolution: AspectRatio::Square,
        ..ProjectSettings::default()
    }
}

/// 9:16 (stories/reels) preset.
pub fn preset_portrait() -> ProjectSettings {
    ProjectSettings {
        resolution: AspectRatio::Portrait,
        ..ProjectSettings::default()
    }
}

/// 16:9 preset.
pub fn preset_landscape() -> ProjectSettings {
    ProjectSettings {
        resolution: AspectRatio::Landscape,
        ..ProjectSettings::default()
    }
}

/// 21:9 preset.
pub fn preset_cinema() -> ProjectSettings {
    ProjectSettings {
        resolution: AspectRatio::Cinema,
        ..ProjectSettings::default()
    }
}

pub fn preset_for(aspect: AspectRatio) -> ProjectSettings {
    match aspect {
        AspectRatio::Square => preset_square(),
        AspectRatio::Portrait => preset_portrait(),
        AspectRatio::Landscape => preset_landscape(),
        AspectRatio::Cinema => preset_cinema(),
    }
}
