//! Physics objects
//!
//! Every simulated thing is a `PhysicsObject`: a rigid body, a collider and a
//! variant tag carrying the variant's own state. Collision and race logic
//! dispatch on the tag instead of inspecting concrete types.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::barrier::{BarrierConfig, MovingBarrier};
use super::car::{Car, CarSpec};
use super::collision::Collider;
use super::geom::BoundingBox;
use super::surface::SurfaceProperties;
use crate::error::ConfigError;

/// Scene-assigned identity, unique for the scene's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Placeholder carried by objects not yet inserted into a scene
    pub const UNASSIGNED: ObjectId = ObjectId(0);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinematic state integrated every tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub position: Vec2,
    /// Radians
    pub rotation: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
}

/// Race checkpoint; order 0 with `is_finish_line` is the start/finish line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub order: u32,
    pub is_finish_line: bool,
    /// Set once any car has activated this checkpoint during the race
    pub activated: bool,
}

/// What a collectible does to the car that drives over it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BonusKind {
    /// Refill the nitro tank
    Nitro { amount: f32 },
    /// Banana peel: one-shot spin-out
    Banana,
    /// Temporary grip/drag change (oil slick, deep puddle)
    Puddle {
        modifier: SurfaceProperties,
        duration: f32,
    },
}

/// Collectible or hazard with an optional respawn timer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    pub kind: BonusKind,
    pub active: bool,
    /// Seconds until reactivation after pickup; `None` = single use
    pub respawn_time: Option<f32>,
    /// Seconds left until reactivation
    pub respawn_timer: f32,
}

impl Bonus {
    pub fn new(kind: BonusKind, respawn_time: Option<f32>) -> Self {
        Self {
            kind,
            active: true,
            respawn_time,
            respawn_timer: 0.0,
        }
    }

    /// Deactivate after pickup; returns false if it was already inactive
    pub fn collect(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.respawn_timer = self.respawn_time.unwrap_or(0.0);
        true
    }

    pub fn update(&mut self, dt: f32) {
        if self.active || self.respawn_time.is_none() {
            return;
        }
        self.respawn_timer -= dt;
        if self.respawn_timer <= 0.0 {
            self.respawn_timer = 0.0;
            self.active = true;
        }
    }
}

/// Variant tag with per-variant state
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// Plain body with linear motion (crates, cones, walls)
    Generic,
    Car(Car),
    Checkpoint(Checkpoint),
    Barrier(MovingBarrier),
    Bonus(Bonus),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Generic => "generic",
            ObjectKind::Car(_) => "car",
            ObjectKind::Checkpoint(_) => "checkpoint",
            ObjectKind::Barrier(_) => "barrier",
            ObjectKind::Bonus(_) => "bonus",
        }
    }
}

/// The unit of simulation
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsObject {
    pub id: ObjectId,
    pub body: Body,
    /// Kilograms; ignored when `movable` is false
    pub mass: f32,
    /// Immovable objects absorb no velocity change from impulses
    pub movable: bool,
    /// Takes part in automatic broad-phase collision response
    pub solid: bool,
    /// Visible to AI navigation probes
    pub ai_detectable: bool,
    /// Per-object restitution; `None` uses the scene default
    pub restitution: Option<f32>,
    pub collider: Collider,
    pub kind: ObjectKind,
}

impl PhysicsObject {
    /// Generic movable body with linear motion
    pub fn new(collider: Collider, mass: f32) -> Result<Self, ConfigError> {
        if !(mass > 0.0) {
            return Err(ConfigError::InvalidMass(mass));
        }
        // Segments are static boundaries only
        let movable = !matches!(collider, Collider::Segment(_));
        let mut obj = Self {
            id: ObjectId::UNASSIGNED,
            body: Body::default(),
            mass,
            movable,
            solid: true,
            ai_detectable: true,
            restitution: None,
            collider,
            kind: ObjectKind::Generic,
        };
        obj.update_collider();
        Ok(obj)
    }

    /// Immovable track barrier from `a` to `b` (world coordinates)
    pub fn wall(a: Vec2, b: Vec2) -> Result<Self, ConfigError> {
        let mid = (a + b) * 0.5;
        let collider = Collider::segment(a - mid, b - mid)?;
        Ok(Self::new(collider, 1.0)?.at(mid, 0.0).immovable())
    }

    /// Car with a rectangular collider sized from its spec
    pub fn car(spec: CarSpec, position: Vec2, rotation: f32) -> Result<Self, ConfigError> {
        let collider = Collider::rectangle(spec.length, spec.width)?;
        let mass = spec.mass;
        let mut obj = Self::new(collider, mass)?.at(position, rotation);
        obj.kind = ObjectKind::Car(Car::new(spec)?);
        Ok(obj)
    }

    /// Race checkpoint; only order 0 may be the finish line
    pub fn checkpoint(
        order: u32,
        is_finish_line: bool,
        collider: Collider,
        position: Vec2,
        rotation: f32,
    ) -> Result<Self, ConfigError> {
        if is_finish_line && order != 0 {
            return Err(ConfigError::FinishLineOrder(order));
        }
        let mut obj = Self::new(collider, 1.0)?.at(position, rotation).immovable();
        obj.solid = false;
        obj.ai_detectable = false;
        obj.kind = ObjectKind::Checkpoint(Checkpoint {
            order,
            is_finish_line,
            activated: false,
        });
        Ok(obj)
    }

    /// Gate that slides open and closed; kinematic, so immovable for impulses
    pub fn barrier(
        config: BarrierConfig,
        collider: Collider,
        closed_position: Vec2,
    ) -> Result<Self, ConfigError> {
        let barrier = MovingBarrier::new(config, closed_position)?;
        let mut obj = Self::new(collider, 1.0)?.at(closed_position, 0.0).immovable();
        obj.kind = ObjectKind::Barrier(barrier);
        Ok(obj)
    }

    /// Collectible or hazard; non-solid, triggers on contact with cars
    pub fn bonus(
        kind: BonusKind,
        collider: Collider,
        position: Vec2,
        respawn_time: Option<f32>,
    ) -> Result<Self, ConfigError> {
        let mut obj = Self::new(collider, 1.0)?.at(position, 0.0).immovable();
        obj.solid = false;
        obj.kind = ObjectKind::Bonus(Bonus::new(kind, respawn_time));
        Ok(obj)
    }

    /// Place the object and refresh its collider
    pub fn at(mut self, position: Vec2, rotation: f32) -> Self {
        self.body.position = position;
        self.body.rotation = rotation;
        self.update_collider();
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.body.velocity = velocity;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution.clamp(0.0, 1.0));
        self
    }

    pub fn immovable(mut self) -> Self {
        self.movable = false;
        self.body.velocity = Vec2::ZERO;
        self.body.angular_velocity = 0.0;
        self
    }

    /// 1/mass, or 0 for immovable bodies
    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        if self.movable && self.mass.is_finite() && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Yaw inertia (simplified as mass / 2)
    #[inline]
    pub fn inverse_inertia(&self) -> f32 {
        let inv = self.inverse_mass();
        inv * 2.0
    }

    /// Re-derive world collider geometry from the body pose
    pub fn update_collider(&mut self) {
        self.collider.update(self.body.position, self.body.rotation);
    }

    pub fn bounds(&self) -> BoundingBox {
        self.collider.bounds()
    }

    pub fn is_car(&self) -> bool {
        matches!(self.kind, ObjectKind::Car(_))
    }

    pub fn as_car(&self) -> Option<&Car> {
        match &self.kind {
            ObjectKind::Car(car) => Some(car),
            _ => None,
        }
    }

    pub fn as_car_mut(&mut self) -> Option<&mut Car> {
        match &mut self.kind {
            ObjectKind::Car(car) => Some(car),
            _ => None,
        }
    }

    pub fn as_checkpoint(&self) -> Option<&Checkpoint> {
        match &self.kind {
            ObjectKind::Checkpoint(cp) => Some(cp),
            _ => None,
        }
    }

    /// Whether this object currently takes part in contact tests at all
    pub fn is_collidable(&self) -> bool {
        match &self.kind {
            ObjectKind::Bonus(bonus) => bonus.active,
            _ => true,
        }
    }
}

/// Position of `id` in an id-sorted object table
pub(crate) fn index_of(objects: &[PhysicsObject], id: ObjectId) -> Option<usize> {
    objects.binary_search_by_key(&id, |o| o.id).ok()
}

/// Two distinct objects borrowed mutably, returned in argument order
pub(crate) fn pair_mut(
    objects: &mut [PhysicsObject],
    i: usize,
    j: usize,
) -> (&mut PhysicsObject, &mut PhysicsObject) {
    debug_assert_ne!(i, j);
    if i < j {
        let (lo, hi) = objects.split_at_mut(j);
        (&mut lo[i], &mut hi[0])
    } else {
        let (lo, hi) = objects.split_at_mut(i);
        (&mut hi[0], &mut lo[j])
    }
}
