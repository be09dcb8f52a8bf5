//! Apex Rally - simulation core for a top-down arcade racer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (vehicle dynamics, collisions, race progress)
//! - `settings`: Data-driven physics tuning
//! - `error`: Configuration and state errors surfaced to the caller

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, SettingsError, SimError, SimResult, StateError};
pub use settings::SimSettings;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for stable tire forces)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Gravitational acceleration (m/s²)
    pub const GRAVITY: f32 = 9.81;
    /// Steering lock (radians, ±45°)
    pub const MAX_STEER: f32 = std::f32::consts::FRAC_PI_4;

    /// Default leaf capacity before a quadtree node splits
    pub const QUADTREE_CAPACITY: usize = 4;
    /// Hard limit on quadtree subdivision
    pub const QUADTREE_MAX_DEPTH: u32 = 8;

    /// Tolerance for wheelbase == front + rear axle distance
    pub const AXLE_TOLERANCE: f32 = 1e-3;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.0;
    }
    // rem_euclid can round up to TAU itself
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped >= PI { -PI } else { wrapped }
}

/// Unit heading vector for a rotation (radians)
#[inline]
pub fn heading(rotation: f32) -> Vec2 {
    Vec2::new(rotation.cos(), rotation.sin())
}

/// True when every component of the vector is finite
#[inline]
pub fn is_finite_vec(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
