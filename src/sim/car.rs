//! Vehicle dynamics
//!
//! A bicycle-model car: one front and one rear axle, lateral tire forces from
//! slip angles, static weight distribution plus longitudinal weight transfer,
//! and a throttle/brake/drag longitudinal model. Integration is semi-implicit
//! Euler over the fixed timestep.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::object::Body;
use super::surface::SurfaceProperties;
use crate::consts::*;
use crate::error::ConfigError;
use crate::{heading, is_finite_vec, normalize_angle};

/// Below this speed lateral tire forces fade out to avoid spinning in place
const LOW_SPEED_GRIP_BLEND: f32 = 1.0;
/// Angular velocity gained per m/s of speed when a slip hazard is hit
const SLIP_SPIN_PER_SPEED: f32 = 0.15;

/// Vehicle geometry and tuning, as loaded from the car definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarSpec {
    /// Kilograms
    pub mass: f32,
    /// Distance between axles (must equal cg_to_front + cg_to_rear)
    pub wheelbase: f32,
    pub cg_to_front: f32,
    pub cg_to_rear: f32,
    /// Center of gravity height, drives longitudinal weight transfer
    pub cg_height: f32,
    /// Body length (collider)
    pub length: f32,
    /// Body width (collider)
    pub width: f32,
    /// Lateral force per radian of slip per newton of axle load
    pub cornering_stiffness_front: f32,
    pub cornering_stiffness_rear: f32,
    /// Tire friction cap, in multiples of axle load
    pub max_grip: f32,
    /// Drive force at full throttle (N)
    pub engine_force: f32,
    /// Brake force at full pedal (N)
    pub brake_force: f32,
    /// Linear rolling resistance coefficient
    pub rolling_resistance: f32,
    /// Aerodynamic drag coefficient (scaled by |speed|)
    pub drag: f32,
    /// Nitro tank size
    pub nitro_capacity: f32,
    /// Drive force multiplier while nitro burns
    pub nitro_strength: f32,
    /// Nitro consumed per second while active
    pub nitro_drain_rate: f32,
}

impl Default for CarSpec {
    fn default() -> Self {
        Self {
            mass: 1200.0,
            wheelbase: 2.5,
            cg_to_front: 1.2,
            cg_to_rear: 1.3,
            cg_height: 0.55,
            length: 4.2,
            width: 1.8,
            cornering_stiffness_front: 5.0,
            cornering_stiffness_rear: 5.2,
            max_grip: 2.0,
            engine_force: 8000.0,
            brake_force: 12000.0,
            rolling_resistance: 30.0,
            drag: 2.5,
            nitro_capacity: 100.0,
            nitro_strength: 1.8,
            nitro_drain_rate: 25.0,
        }
    }
}

impl CarSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(ConfigError::InvalidMass(self.mass));
        }
        for (field, value) in [
            ("wheelbase", self.wheelbase),
            ("cg_to_front", self.cg_to_front),
            ("cg_to_rear", self.cg_to_rear),
            ("length", self.length),
            ("width", self.width),
            ("max_grip", self.max_grip),
            ("nitro_strength", self.nitro_strength),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if (self.cg_to_front + self.cg_to_rear - self.wheelbase).abs() > AXLE_TOLERANCE {
            return Err(ConfigError::AxleMismatch {
                front: self.cg_to_front,
                rear: self.cg_to_rear,
                wheelbase: self.wheelbase,
            });
        }
        if self.nitro_capacity < 0.0 || self.nitro_drain_rate < 0.0 || self.cg_height < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "nitro_capacity/nitro_drain_rate/cg_height",
                value: self.nitro_capacity.min(self.nitro_drain_rate).min(self.cg_height),
            });
        }
        Ok(())
    }

    /// Simplified yaw inertia
    #[inline]
    pub fn inertia(&self) -> f32 {
        self.mass * 0.5
    }
}

/// Temporary grip/drag change (puddle, oil) with its remaining time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceEffect {
    pub modifier: SurfaceProperties,
    /// Seconds left
    pub remaining: f32,
}

/// Per-tick driver inputs for one car
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarControls {
    /// Signed drive request (1.0 = full forward, negative = reverse)
    pub throttle: f32,
    /// Brake pedal, 0..1
    pub brake: f32,
    /// Steering angle in radians (clamped to ±45°)
    pub steer: f32,
    /// Request nitro this tick
    pub nitro: bool,
}

/// Forces computed in the car's local frame for one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TireState {
    pub slip_front: f32,
    pub slip_rear: f32,
    pub lateral_front: f32,
    pub lateral_rear: f32,
    pub longitudinal: f32,
    pub front_load: f32,
    pub rear_load: f32,
}

/// Car-specific simulation state
#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    spec: CarSpec,
    throttle: f32,
    brake: f32,
    steer: f32,
    nitro: f32,
    nitro_active: bool,
    effects: Vec<SurfaceEffect>,
    /// Local longitudinal acceleration from the previous step (weight transfer)
    long_accel: f32,
    tires: TireState,
}

impl Car {
    pub fn new(spec: CarSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        Ok(Self {
            nitro: spec.nitro_capacity,
            spec,
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
            nitro_active: false,
            effects: Vec::new(),
            long_accel: 0.0,
            tires: TireState::default(),
        })
    }

    pub fn spec(&self) -> &CarSpec {
        &self.spec
    }

    pub fn steer(&self) -> f32 {
        self.steer
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn brake(&self) -> f32 {
        self.brake
    }

    /// Last computed tire forces (for HUD/telemetry collaborators)
    pub fn tires(&self) -> TireState {
        self.tires
    }

    pub fn set_steer(&mut self, angle: f32) {
        self.steer = if angle.is_finite() {
            angle.clamp(-MAX_STEER, MAX_STEER)
        } else {
            0.0
        };
    }

    pub fn set_throttle(&mut self, throttle: f32) {
        self.throttle = if throttle.is_finite() { throttle } else { 0.0 };
    }

    pub fn set_brake(&mut self, brake: f32) {
        self.brake = if brake.is_finite() { brake.max(0.0) } else { 0.0 };
    }

    /// Apply a full set of controls; nitro burns only while requested
    pub fn apply_controls(&mut self, controls: &CarControls) {
        self.set_throttle(controls.throttle);
        self.set_brake(controls.brake);
        self.set_steer(controls.steer);
        if controls.nitro {
            self.activate_nitro();
        } else {
            self.deactivate_nitro();
        }
    }

    // === Nitro ===

    pub fn nitro(&self) -> f32 {
        self.nitro
    }

    pub fn is_nitro_active(&self) -> bool {
        self.nitro_active
    }

    /// Start burning nitro; fails when empty or already burning
    pub fn activate_nitro(&mut self) -> bool {
        if self.nitro > 0.0 && !self.nitro_active {
            self.nitro_active = true;
            true
        } else {
            false
        }
    }

    pub fn deactivate_nitro(&mut self) {
        self.nitro_active = false;
    }

    /// Refill from a pickup, capped at the tank size
    pub fn add_nitro(&mut self, amount: f32) {
        self.nitro = (self.nitro + amount.max(0.0)).min(self.spec.nitro_capacity);
    }

    fn drain_nitro(&mut self, dt: f32) {
        if !self.nitro_active {
            return;
        }
        self.nitro -= self.spec.nitro_drain_rate * dt;
        if self.nitro <= 0.0 {
            self.nitro = 0.0;
            self.nitro_active = false;
        }
    }

    // === Hazards ===

    pub fn effects(&self) -> &[SurfaceEffect] {
        &self.effects
    }

    pub fn apply_surface_effect(&mut self, modifier: SurfaceProperties, duration: f32) {
        if duration > 0.0 {
            self.effects.push(SurfaceEffect {
                modifier,
                remaining: duration,
            });
        }
    }

    /// Combined multiplier of every active effect
    fn effect_modifier(&self) -> SurfaceProperties {
        self.effects
            .iter()
            .fold(SurfaceProperties::NEUTRAL, |acc, e| acc.combine(e.modifier))
    }

    fn decay_effects(&mut self, dt: f32) {
        for effect in &mut self.effects {
            effect.remaining -= dt;
        }
        self.effects.retain(|e| e.remaining > 0.0);
    }

    /// One-shot loss of control: random-direction spin, half the speed
    pub fn apply_slip<R: Rng + ?Sized>(&mut self, body: &mut Body, rng: &mut R) {
        let sign = if rng.random::<bool>() { 1.0 } else { -1.0 };
        let speed = body.velocity.length();
        body.angular_velocity += sign * SLIP_SPIN_PER_SPEED * speed;
        body.velocity *= 0.5;
    }

    // === Integration ===

    /// Advance the car one step on a surface with the given base multipliers
    pub fn step(
        &mut self,
        body: &mut Body,
        surface: SurfaceProperties,
        gravity: f32,
        stop_speed: f32,
        dt: f32,
    ) {
        let surface = surface.combine(self.effect_modifier());
        let before = *body;
        let spec = &self.spec;

        // 1. Local frame velocity
        let fwd = heading(body.rotation);
        let side = fwd.perp();
        let forward_speed = body.velocity.dot(fwd);
        let lateral_speed = body.velocity.dot(side);

        // 2. Axle loads: static split plus transfer from last step's acceleration
        let weight = spec.mass * gravity;
        let transfer = spec.cg_height / spec.wheelbase * spec.mass * self.long_accel;
        let front_load = (weight * spec.cg_to_rear / spec.wheelbase - transfer).max(0.0);
        let rear_load = (weight * spec.cg_to_front / spec.wheelbase + transfer).max(0.0);

        // 3. Slip angles
        let (slip_front, slip_rear) = slip_angles(
            forward_speed,
            lateral_speed,
            body.angular_velocity,
            spec.cg_to_front,
            spec.cg_to_rear,
            self.steer,
        );

        // 4. Lateral tire forces
        let fade = (body.velocity.length() / LOW_SPEED_GRIP_BLEND).min(1.0);
        let lateral_front = fade
            * lateral_force(
                spec.cornering_stiffness_front,
                slip_front,
                front_load,
                surface.grip,
                spec.max_grip,
            );
        let lateral_rear = fade
            * lateral_force(
                spec.cornering_stiffness_rear,
                slip_rear,
                rear_load,
                surface.grip,
                spec.max_grip,
            );

        // 5. Longitudinal force
        let boost = if self.nitro_active {
            spec.nitro_strength
        } else {
            1.0
        };
        let drive = self.throttle * spec.engine_force * boost;
        // Brakes can stop the car but never push it backwards
        let brake_cap = forward_speed.abs() * spec.mass / dt;
        let braking = -forward_speed.signum() * (self.brake * spec.brake_force).min(brake_cap);
        let resistance = -(spec.rolling_resistance + spec.drag * forward_speed.abs())
            * forward_speed
            * surface.drag;
        let longitudinal = drive + braking + resistance;

        // 6. Integrate (semi-implicit Euler)
        let cos_steer = self.steer.cos();
        let force_local = Vec2::new(longitudinal, cos_steer * lateral_front + lateral_rear);
        let torque = cos_steer * lateral_front * spec.cg_to_front - lateral_rear * spec.cg_to_rear;

        let accel_local = force_local / spec.mass;
        let accel = fwd * accel_local.x + side * accel_local.y;
        let angular_accel = torque / spec.inertia();

        body.velocity += accel * dt;
        body.angular_velocity += angular_accel * dt;
        body.position += body.velocity * dt;
        body.rotation = normalize_angle(body.rotation + body.angular_velocity * dt);

        // Settle an idle car instead of creeping forever
        if self.throttle == 0.0 && body.velocity.length() < stop_speed {
            body.velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
        }

        if !is_finite_vec(body.velocity)
            || !is_finite_vec(body.position)
            || !body.angular_velocity.is_finite()
            || !body.rotation.is_finite()
        {
            // Numeric blow-up: keep the last good pose and stop the car
            log::warn!("car integration produced non-finite state, halting car");
            *body = Body {
                velocity: Vec2::ZERO,
                angular_velocity: 0.0,
                ..before
            };
            self.long_accel = 0.0;
        } else {
            self.long_accel = accel_local.x;
        }

        self.tires = TireState {
            slip_front,
            slip_rear,
            lateral_front,
            lateral_rear,
            longitudinal,
            front_load,
            rear_load,
        };

        self.drain_nitro(dt);
        self.decay_effects(dt);
    }
}

/// Front and rear slip angles; zero at exactly zero forward speed
pub fn slip_angles(
    forward_speed: f32,
    lateral_speed: f32,
    angular_velocity: f32,
    cg_to_front: f32,
    cg_to_rear: f32,
    steer: f32,
) -> (f32, f32) {
    if forward_speed == 0.0 || !forward_speed.is_finite() {
        return (0.0, 0.0);
    }
    let speed = forward_speed.abs();
    // Steering reverses sense when rolling backwards
    let steer = steer * forward_speed.signum();
    let front = (lateral_speed + angular_velocity * cg_to_front).atan2(speed) - steer;
    let rear = (lateral_speed - angular_velocity * cg_to_rear).atan2(speed);
    (front, rear)
}

/// Cornering force for one axle, capped by the friction limit
pub fn lateral_force(stiffness: f32, slip: f32, load: f32, grip: f32, max_grip: f32) -> f32 {
    let force = -stiffness * slip * load * grip;
    let cap = max_grip * load * grip;
    force.clamp(-cap, cap)
}
