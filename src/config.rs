//! Client configuration loaded from YAML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Edge length of one tile in canvas pixels.
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    /// Draw row 0 at the bottom of the canvas.
    #[serde(default = "default_flip_y")]
    pub flip_y: bool,
}

fn default_tile_size() -> f32 {
    32.0
}

fn default_flip_y() -> bool {
    true
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            flip_y: default_flip_y(),
        }
    }
}

/// What happens to a round payload that arrives ahead of the expected one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum OrderingPolicy {
    #[default]
    Reject,
    Reorder { window: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub ordering: OrderingPolicy,
    /// Move the scrubber to every newly ingested round.
    #[serde(default = "default_follow_latest")]
    pub follow_latest: bool,
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

fn default_follow_latest() -> bool {
    true
}

fn default_feed_capacity() -> usize {
    64
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::default(),
            follow_latest: default_follow_latest(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_grid_size")]
    pub width: u32,
    #[serde(default = "default_grid_size")]
    pub height: u32,
    #[serde(default = "default_initial_energy")]
    pub initial_energy: u32,
}

fn default_grid_size() -> u32 {
    20
}

fn default_initial_energy() -> u32 {
    500
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            width: default_grid_size(),
            height: default_grid_size(),
            initial_energy: default_initial_energy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse client configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))
    }
}
