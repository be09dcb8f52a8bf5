//! Overlap manager
//!
//! Holds the explicitly registered object pairs and runs the per-tick
//! narrow phase. Registered pairs go first, in registration order, with their
//! own response. Then pairs discovered through the quadtree (movable vs
//! anything) get the default response: impulses between solids, a trigger
//! record for car/collectible contact. A pair is never processed twice in one
//! pass.
//!
//! Overlap processing never moves objects, so running it twice on unchanged
//! positions reports the same contacts.

use std::collections::BTreeSet;
use std::fmt;

use super::collision::Contact;
use super::object::{ObjectId, ObjectKind, PhysicsObject, index_of, pair_mut};
use super::quadtree::QuadTree;
use super::response::on_collision;
use crate::error::StateError;
use crate::settings::SimSettings;

/// User response for a registered pair; the contact is `None` only when
/// `always_invoke_callback` is set and the shapes are apart
pub type OverlapCallback =
    Box<dyn FnMut(&mut PhysicsObject, &mut PhysicsObject, Option<&Contact>)>;

/// What happens when a registered pair touches
pub enum OverlapResponse {
    /// Default impulse resolution
    Resolve,
    /// Detect only; the contact is reported but velocities are left alone
    Report,
    Callback(OverlapCallback),
}

impl fmt::Debug for OverlapResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapResponse::Resolve => f.write_str("Resolve"),
            OverlapResponse::Report => f.write_str("Report"),
            OverlapResponse::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapOptions {
    /// Invoke the callback every pass, with no contact when apart
    pub always_invoke_callback: bool,
}

/// Confirmed contact from one pass; `contact.normal` points from a to b
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionRecord {
    pub a: ObjectId,
    pub b: ObjectId,
    pub contact: Contact,
}

#[derive(Debug)]
struct Registration {
    a: ObjectId,
    b: ObjectId,
    response: OverlapResponse,
    options: OverlapOptions,
}

impl Registration {
    fn involves(&self, id: ObjectId) -> bool {
        self.a == id || self.b == id
    }

    fn matches(&self, a: ObjectId, b: ObjectId) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

#[derive(Debug, Default)]
pub struct OverlapManager {
    registrations: Vec<Registration>,
}

impl OverlapManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair of interest. Both ids must already be validated by the
    /// owner; registering the same pair again adds a second response.
    pub fn register(
        &mut self,
        a: ObjectId,
        b: ObjectId,
        response: OverlapResponse,
        options: OverlapOptions,
    ) -> Result<(), StateError> {
        if a == b {
            return Err(StateError::SelfOverlap(a));
        }
        log::debug!("overlap registered {} <-> {} ({:?})", a, b, response);
        self.registrations.push(Registration {
            a,
            b,
            response,
            options,
        });
        Ok(())
    }

    pub fn is_registered(&self, a: ObjectId, b: ObjectId) -> bool {
        self.registrations.iter().any(|r| r.matches(a, b))
    }

    /// Drop every registration referencing `id`; returns how many went
    pub fn purge(&mut self, id: ObjectId) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|r| !r.involves(id));
        let removed = before - self.registrations.len();
        if removed > 0 {
            log::debug!("purged {} overlap registration(s) for {}", removed, id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Run the narrow phase for registered and discovered pairs.
    ///
    /// `objects` must be sorted by id; `tree` must have been built from the
    /// current collider bounds.
    pub fn process(
        &mut self,
        objects: &mut [PhysicsObject],
        tree: &QuadTree<ObjectId>,
        settings: &SimSettings,
    ) -> Vec<CollisionRecord> {
        let mut records = Vec::new();

        for reg in &mut self.registrations {
            let (Some(i), Some(j)) = (index_of(objects, reg.a), index_of(objects, reg.b)) else {
                log::warn!("stale overlap {} <-> {} skipped", reg.a, reg.b);
                continue;
            };
            let (a, b) = pair_mut(objects, i, j);
            let contact = if a.is_collidable() && b.is_collidable() {
                a.collider.intersect(&b.collider)
            } else {
                None
            };

            match &mut reg.response {
                OverlapResponse::Resolve => {
                    if let Some(c) = &contact {
                        on_collision(a, b, c, settings);
                    }
                }
                OverlapResponse::Report => {}
                OverlapResponse::Callback(callback) => {
                    if contact.is_some() || reg.options.always_invoke_callback {
                        callback(a, b, contact.as_ref());
                    }
                }
            }

            if let Some(contact) = contact {
                records.push(CollisionRecord {
                    a: reg.a,
                    b: reg.b,
                    contact,
                });
            }
        }

        for (id_a, id_b) in self.discover(objects, tree) {
            let (Some(i), Some(j)) = (index_of(objects, id_a), index_of(objects, id_b)) else {
                continue;
            };
            let (a, b) = pair_mut(objects, i, j);
            let Some(interaction) = Interaction::of(a, b) else {
                continue;
            };
            let Some(contact) = a.collider.intersect(&b.collider) else {
                continue;
            };
            if interaction == Interaction::Impact {
                on_collision(a, b, &contact, settings);
            }
            log::trace!("contact {} <-> {} depth {:.3}", id_a, id_b, contact.depth);
            records.push(CollisionRecord {
                a: id_a,
                b: id_b,
                contact,
            });
        }

        records
    }

    /// Candidate pairs from the quadtree, lower id first, registered pairs excluded
    fn discover(
        &self,
        objects: &[PhysicsObject],
        tree: &QuadTree<ObjectId>,
    ) -> BTreeSet<(ObjectId, ObjectId)> {
        let mut pairs = BTreeSet::new();
        for obj in objects.iter().filter(|o| o.movable && o.is_collidable()) {
            for other in tree.query(&obj.bounds()) {
                if other == obj.id {
                    continue;
                }
                let key = (obj.id.min(other), obj.id.max(other));
                if !self.is_registered(key.0, key.1) {
                    pairs.insert(key);
                }
            }
        }
        pairs
    }
}

/// Default behavior of a discovered pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interaction {
    /// Two solids exchange momentum
    Impact,
    /// Car touching a collectible
    Trigger,
}

impl Interaction {
    fn of(a: &PhysicsObject, b: &PhysicsObject) -> Option<Self> {
        if !a.is_collidable() || !b.is_collidable() {
            return None;
        }
        if a.solid && b.solid {
            return Some(Interaction::Impact);
        }
        match (&a.kind, &b.kind) {
            (ObjectKind::Car(_), ObjectKind::Bonus(_)) | (ObjectKind::Bonus(_), ObjectKind::Car(_)) => {
                Some(Interaction::Trigger)
            }
            _ => None,
        }
    }
}
