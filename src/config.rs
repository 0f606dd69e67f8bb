use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::transport::CHANNEL_NAME;

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Channel name shared by controller and agent
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Connect/IO bound per send or request, milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Overlay engine configuration
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Movement-exploit configuration
    #[serde(default)]
    pub exploit: ExploitConfig,

    /// Agent frame-loop configuration (demo agent only)
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Pixels a label floats above the projected point
    #[serde(default = "default_label_offset_px")]
    pub label_offset_px: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitConfig {
    /// Per-frame velocity multiplier
    #[serde(default = "default_velocity_factor")]
    pub velocity_factor: f64,

    /// Constant upward kick added each frame
    #[serde(default = "default_lift")]
    pub lift: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Frame clock interval, milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Simulated screen size for the demo projector
    #[serde(default = "default_screen_width")]
    pub screen_width: f64,
    #[serde(default = "default_screen_height")]
    pub screen_height: f64,
}

fn default_channel() -> String {
    CHANNEL_NAME.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_label_offset_px() -> f64 {
    16.0
}

fn default_velocity_factor() -> f64 {
    1000.0
}

fn default_lift() -> f64 {
    500.0
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_screen_width() -> f64 {
    1920.0
}

fn default_screen_height() -> f64 {
    1080.0
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            label_offset_px: default_label_offset_px(),
        }
    }
}

impl Default for ExploitConfig {
    fn default() -> Self {
        Self {
            velocity_factor: default_velocity_factor(),
            lift: default_lift(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            connect_timeout_ms: default_connect_timeout_ms(),
            overlay: OverlayConfig::default(),
            exploit: ExploitConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(channel = %config.channel, "configuration loaded");
        Ok(config)
    }

    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.agent.frame_interval_ms)
    }
}
