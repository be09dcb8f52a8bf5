//! Simulation tuning
//!
//! Loaded once by the driver (usually from a JSON file shipped with the map)
//! and handed to the scene at construction.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{ConfigError, SettingsError};

/// Physics tunables shared by every object in a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    // === Collision response ===
    /// Restitution given to objects that don't set their own
    pub default_restitution: f32,
    /// Scale applied to the angular impulse derived from the contact offset
    pub angular_damping: f32,
    /// Fraction of speed a car keeps after hitting an immovable obstacle
    pub car_wall_speed_retention: f32,

    // === Broad phase ===
    /// Objects a quadtree leaf holds before splitting
    pub quadtree_capacity: usize,
    /// Maximum quadtree depth
    pub quadtree_max_depth: u32,

    // === Vehicle ===
    /// Gravitational acceleration used for axle loads
    pub gravity: f32,
    /// Below this speed an idle car is brought to rest
    pub stop_speed: f32,

    // === Determinism ===
    /// Seed for the scene RNG (slip effects)
    pub seed: u64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            default_restitution: 0.3,
            angular_damping: 0.5,
            car_wall_speed_retention: 0.6,

            quadtree_capacity: QUADTREE_CAPACITY,
            quadtree_max_depth: QUADTREE_MAX_DEPTH,

            gravity: GRAVITY,
            stop_speed: 0.05,

            seed: 0x5eed,
        }
    }
}

impl SimSettings {
    /// Parse settings from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        log::info!("Loaded simulation settings (seed {:#x})", settings.seed);
        Ok(settings)
    }

    /// Serialize settings to pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject values the integrator can't work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.default_restitution) {
            return Err(ConfigError::Settings(format!(
                "default_restitution must be in [0, 1], got {}",
                self.default_restitution
            )));
        }
        if !(0.0..=1.0).contains(&self.car_wall_speed_retention) {
            return Err(ConfigError::Settings(format!(
                "car_wall_speed_retention must be in [0, 1], got {}",
                self.car_wall_speed_retention
            )));
        }
        if self.quadtree_capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "quadtree_capacity",
                value: 0.0,
            });
        }
        if !(self.gravity > 0.0 && self.gravity.is_finite()) {
            return Err(ConfigError::NonPositive {
                field: "gravity",
                value: self.gravity,
            });
        }
        if self.angular_damping < 0.0 || self.stop_speed < 0.0 {
            return Err(ConfigError::Settings(
                "angular_damping and stop_speed must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
