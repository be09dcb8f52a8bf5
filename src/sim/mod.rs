//! Deterministic simulation module
//!
//! All racing logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by object ID)
//! - No rendering, audio or input dependencies

pub mod barrier;
pub mod car;
pub mod collision;
pub mod events;
pub mod geom;
pub mod object;
pub mod overlap;
pub mod quadtree;
pub mod race;
pub mod response;
pub mod state;
pub mod surface;
pub mod tick;

pub use barrier::{BarrierConfig, BarrierState, MovingBarrier};
pub use car::{Car, CarControls, CarSpec, SurfaceEffect, TireState};
pub use collision::{Collider, Contact, ShapeKind, narrow_phase_fn};
pub use events::SimEvent;
pub use geom::{BoundingBox, Ray};
pub use object::{Body, Bonus, BonusKind, Checkpoint, ObjectId, ObjectKind, PhysicsObject};
pub use overlap::{CollisionRecord, OverlapCallback, OverlapManager, OverlapOptions, OverlapResponse};
pub use quadtree::QuadTree;
pub use race::{CarProgress, RaceConfig, RaceManager};
pub use response::on_collision;
pub use state::{RayHit, RayQuery, Scene, TrackDescriptor};
pub use surface::{
    SurfaceMap, SurfaceOverlapPolicy, SurfaceProperties, SurfaceSegment, SurfaceSegmentConfig,
    SurfaceType, WeatherModifier, WeatherZone,
};
pub use tick::{TickInput, tick};
