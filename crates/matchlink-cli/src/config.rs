//! Application configuration

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use matchlink_runtime::CoordinatorConfig;

/// Settings for the scripted demo flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Name of the session the demo creates
    pub session_name: String,
    /// How many players register with the session
    pub players: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            session_name: "Game".to_string(),
            players: 3,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Coordinator tuning
    pub coordinator: CoordinatorConfig,
    /// Demo flow settings
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}
