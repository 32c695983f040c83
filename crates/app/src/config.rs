use blowout_core::sanitize_frame_rate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Application configuration for persisting user preferences.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_input")]
    pub last_input: String,
    /// Evaluation cadence in Hz; detection timing is rescaled to match.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    /// Give up listening after this many seconds. None waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_input() -> String {
    "default".to_string()
}

fn default_frame_rate() -> f32 {
    60.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            last_input: default_input(),
            frame_rate: default_frame_rate(),
            timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from disk, or returns default if not found.
    pub fn load() -> Self {
        config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| Self::parse(&content))
            .unwrap_or_default()
    }

    fn parse(content: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(content) {
            Ok(mut cfg) => {
                cfg.frame_rate = sanitize_frame_rate(cfg.frame_rate);
                Some(cfg)
            }
            Err(e) => {
                log::warn!("Ignoring unreadable config: {}", e);
                None
            }
        }
    }

    /// Saves configuration to disk in JSON format.
    pub fn save(&self) {
        if let Some(path) = config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Ok(json) = serde_json::to_string_pretty(self) {
                if let Err(e) = fs::write(&path, json) {
                    log::warn!("Failed to save config to {}: {}", path.display(), e);
                }
            }
        }
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "blowout", "blowout")
        .map(|dirs| dirs.config_dir().join("config.json"))
}
