//! Error types
//!
//! Configuration and state errors are surfaced to the caller immediately and
//! never retried. Numeric degeneracies (zero-speed slip angles, impulses
//! between two immovable bodies) are handled where they occur and never
//! appear here.

use thiserror::Error;

use crate::sim::ObjectId;

/// Top-level error for every fallible simulation operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Malformed or inconsistent construction input
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Operation on an identity the scene does not know about
    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Malformed or inconsistent construction input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),
    #[error("line segment endpoints coincide at ({x}, {y})")]
    DegenerateSegment { x: f32, y: f32 },
    #[error("box extents must be non-negative, got {width} x {height}")]
    NegativeExtent { width: f32, height: f32 },
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(f32),
    #[error("axle distances {front} + {rear} do not sum to wheelbase {wheelbase}")]
    AxleMismatch { front: f32, rear: f32, wheelbase: f32 },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f32),
    #[error("finish line must have order 0, got order {0}")]
    FinishLineOrder(u32),
    #[error("duplicate checkpoint order {0}")]
    DuplicateCheckpoint(u32),
    #[error("checkpoint orders must be contiguous from 0, missing order {0}")]
    MissingCheckpoint(u32),
    #[error("race has no finish line")]
    NoFinishLine,
    #[error("race needs at least one lap")]
    NoLaps,
    #[error("surface segment {index} overlaps segment {other}")]
    OverlappingSurface { index: usize, other: usize },
    #[error("invalid settings: {0}")]
    Settings(String),
}

/// Failure loading a settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("malformed settings JSON")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Operation on a removed, unregistered or mismatched object identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("object {0} is not in the scene")]
    UnknownObject(ObjectId),
    #[error("object {0} is not a car")]
    NotACar(ObjectId),
    #[error("object {0} is not a moving barrier")]
    NotABarrier(ObjectId),
    #[error("overlap between {0} and itself")]
    SelfOverlap(ObjectId),
    #[error("car {0} is not registered with the race")]
    UnregisteredCar(ObjectId),
    #[error("checkpoint {0} is part of the running race")]
    CourseCheckpoint(ObjectId),
    #[error("race has not been started")]
    RaceNotStarted,
}

pub type SimResult<T> = Result<T, SimError>;
