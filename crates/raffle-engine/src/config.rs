//! Engine configuration
//!
//! ```yaml
//! chamber:
//!   warmup_ticks: 60
//!   frame_interval: 10
//! persistence_retries: 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use raffle_draw::{ChamberConfig, ConfigError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lottery chamber used by the production simulator
    pub chamber: ChamberConfig,
    /// Extra attempts after a persistence failure, each with a fresh seed
    pub persistence_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chamber: ChamberConfig::standard(),
            persistence_retries: 1,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load by extension: `.json` is JSON, anything else YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_yaml_str(&text)?,
        };
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chamber
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
