//! Lottery chamber configuration
//!
//! Physical quantities are integers (whole units or thousandths) so a config
//! file can never smuggle platform-dependent floats into the simulation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use raffle_core::SimulationError;

use crate::fixed::Fixed;

/// Config load failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Chamber geometry and physics constants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChamberConfig {
    /// Interior width (units)
    pub width: u32,
    /// Interior height (units)
    pub height: u32,
    /// Ball radius (units)
    pub ball_radius: u32,
    /// Downward acceleration per tick (thousandths of a unit)
    pub gravity_milli: i64,
    /// Peak air-jet impulse per tick (thousandths of a unit)
    pub jet_strength_milli: i64,
    /// Velocity kept after a wall bounce (thousandths)
    pub restitution_milli: i64,
    /// Velocity kept per tick (thousandths)
    pub damping_milli: i64,
    /// Per-axis speed cap (units per tick)
    pub max_speed: u32,
    /// Ticks of agitation before the gate first opens
    pub warmup_ticks: u32,
    /// Ticks between gate openings
    pub exit_interval: u32,
    /// Record a full chamber frame every N ticks (`None` = exits only)
    pub frame_interval: Option<u32>,
}

impl ChamberConfig {
    /// Default drum: 200×200, ~5 s warm-up at 25 ticks/s
    pub fn standard() -> Self {
        Self {
            width: 200,
            height: 200,
            ball_radius: 4,
            gravity_milli: 150,
            jet_strength_milli: 700,
            restitution_milli: 850,
            damping_milli: 990,
            max_speed: 12,
            warmup_ticks: 120,
            exit_interval: 24,
            frame_interval: None,
        }
    }

    /// Short agitation for tests and previews
    pub fn quick() -> Self {
        Self {
            warmup_ticks: 12,
            exit_interval: 3,
            ..Self::standard()
        }
    }

    /// Record frames every `interval` ticks
    pub fn with_frames(mut self, interval: u32) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |msg: &str| Err(SimulationError::InvalidConfig(msg.to_string()));

        if self.ball_radius == 0 {
            return invalid("ball_radius must be positive");
        }
        if self.width < self.ball_radius * 4 || self.height < self.ball_radius * 4 {
            return invalid("chamber must be at least four radii wide and tall");
        }
        if self.exit_interval == 0 {
            return invalid("exit_interval must be positive");
        }
        if self.frame_interval == Some(0) {
            return invalid("frame_interval must be positive");
        }
        if !(0..=1000).contains(&self.restitution_milli) {
            return invalid("restitution_milli must be within 0..=1000");
        }
        if !(0..=1000).contains(&self.damping_milli) {
            return invalid("damping_milli must be within 0..=1000");
        }
        if self.max_speed == 0 || self.max_speed >= self.width.min(self.height) / 2 {
            return invalid("max_speed must be positive and below half the chamber size");
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    // Fixed-point views used by the chamber

    pub(crate) fn width_fx(&self) -> Fixed {
        Fixed::from_int(self.width as i64)
    }

    pub(crate) fn height_fx(&self) -> Fixed {
        Fixed::from_int(self.height as i64)
    }

    pub(crate) fn radius_fx(&self) -> Fixed {
        Fixed::from_int(self.ball_radius as i64)
    }

    pub(crate) fn max_speed_fx(&self) -> Fixed {
        Fixed::from_int(self.max_speed as i64)
    }

    /// Tick at which gate opening `k` (0-based) happens
    pub fn exit_tick(&self, k: u32) -> u64 {
        self.warmup_ticks as u64 + k as u64 * self.exit_interval as u64
    }
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(ChamberConfig::standard().validate().is_ok());
        assert!(ChamberConfig::quick().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = ChamberConfig {
            exit_interval: 0,
            ..ChamberConfig::standard()
        };
        assert!(matches!(
            config.validate(),
            Err(SimulationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_tiny_chamber() {
        let config = ChamberConfig {
            width: 10,
            ..ChamberConfig::standard()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_override() {
        let config = ChamberConfig::from_yaml_str("warmup_ticks: 30\nframe_interval: 10\n").unwrap();
        assert_eq!(config.warmup_ticks, 30);
        assert_eq!(config.frame_interval, Some(10));
        assert_eq!(config.width, ChamberConfig::standard().width);
    }

    #[test]
    fn test_exit_ticks() {
        let config = ChamberConfig::quick();
        assert_eq!(config.exit_tick(0), 12);
        assert_eq!(config.exit_tick(2), 18);
    }
}
