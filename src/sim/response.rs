//! Impulse-based collision response
//!
//! One exchange of momentum along the contact normal, applied to both
//! participants with opposite signs. Immovable bodies have zero inverse mass
//! so they take no velocity change. Variant-specific reactions (a car
//! scrubbing speed against a wall) run after the shared impulse.

use glam::Vec2;

use super::collision::Contact;
use super::object::{ObjectKind, PhysicsObject};
use crate::settings::SimSettings;
use crate::is_finite_vec;

/// Effective restitution of a pair: the less bouncy of the two
fn pair_restitution(a: &PhysicsObject, b: &PhysicsObject, settings: &SimSettings) -> f32 {
    let ea = a.restitution.unwrap_or(settings.default_restitution);
    let eb = b.restitution.unwrap_or(settings.default_restitution);
    ea.min(eb)
}

/// Resolve a contact between `a` and `b`; `contact.normal` points from a to b.
///
/// Returns the impulse magnitude, or `None` when nothing was applied (both
/// bodies immovable, already separating, or a non-finite result).
pub fn on_collision(
    a: &mut PhysicsObject,
    b: &mut PhysicsObject,
    contact: &Contact,
    settings: &SimSettings,
) -> Option<f32> {
    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return None;
    }

    let n = contact.normal;
    let rel = b.body.velocity - a.body.velocity;
    let vn = rel.dot(n);
    if vn >= 0.0 {
        return None;
    }

    let e = pair_restitution(a, b, settings);
    let j = -(1.0 + e) * vn / inv_sum;
    let impulse = n * j;
    if !is_finite_vec(impulse) {
        log::warn!("non-finite impulse between {} and {}, skipped", a.id, b.id);
        return None;
    }

    apply_impulse(a, -impulse, contact.point, settings.angular_damping);
    apply_impulse(b, impulse, contact.point, settings.angular_damping);

    react(a, b.movable, settings);
    react(b, a.movable, settings);
    Some(j)
}

/// Linear plus damped angular change from an impulse applied at `point`
fn apply_impulse(obj: &mut PhysicsObject, impulse: Vec2, point: Vec2, angular_damping: f32) {
    let inv_mass = obj.inverse_mass();
    if inv_mass == 0.0 {
        return;
    }
    obj.body.velocity += impulse * inv_mass;
    let r = point - obj.body.position;
    obj.body.angular_velocity += r.perp_dot(impulse) * obj.inverse_inertia() * angular_damping;
}

/// Per-variant follow-up to the shared impulse
fn react(obj: &mut PhysicsObject, other_movable: bool, settings: &SimSettings) {
    if let ObjectKind::Car(_) = obj.kind {
        if !other_movable && obj.movable {
            obj.body.velocity *= settings.car_wall_speed_retention;
        }
    }
}
