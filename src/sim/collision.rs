//! Collider shapes and narrow-phase intersection
//!
//! Three shapes take part in collisions: axis-aligned boxes, convex polygons
//! and line segments. Segments are the infinitely thin track barriers and only
//! ever appear on static objects; for SAT purposes they are degenerate
//! two-vertex polygons with a single axis.
//!
//! Pairwise tests are looked up in a small dispatch table keyed by the two
//! shape tags. Every entry is a pure function returning the contact with its
//! normal oriented from the first shape toward the second.

use std::borrow::Cow;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::{BoundingBox, Ray};
use crate::error::ConfigError;

/// Shape tag used for narrow-phase dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Aabb,
    Polygon,
    Segment,
}

/// Result of a positive narrow-phase test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Approximate world-space contact point
    pub point: Vec2,
    /// Unit normal pointing from the first shape toward the second
    pub normal: Vec2,
    /// Penetration depth along `normal` (always > 0)
    pub depth: f32,
}

impl Contact {
    /// Minimum translation vector that separates the second shape from the first
    #[inline]
    pub fn mtv(&self) -> Vec2 {
        self.normal * self.depth
    }
}

/// Axis-aligned box; ignores rotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AabbCollider {
    pub half_extents: Vec2,
    /// World-space center, refreshed by `update`
    pub center: Vec2,
}

/// Convex polygon with vertices in counter-clockwise order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonCollider {
    /// Vertices relative to the owning object's position
    pub local: Vec<Vec2>,
    /// Transformed vertices, refreshed by `update`
    pub world: Vec<Vec2>,
}

/// Static, infinitely thin boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCollider {
    pub local_a: Vec2,
    pub local_b: Vec2,
    pub world_a: Vec2,
    pub world_b: Vec2,
}

/// A collision shape with its world-space snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    Aabb(AabbCollider),
    Polygon(PolygonCollider),
    Segment(SegmentCollider),
}

impl Collider {
    /// Box of the given full width and height
    pub fn aabb(width: f32, height: f32) -> Result<Self, ConfigError> {
        if !(width >= 0.0 && height >= 0.0) {
            return Err(ConfigError::NegativeExtent { width, height });
        }
        Ok(Collider::Aabb(AabbCollider {
            half_extents: Vec2::new(width, height) * 0.5,
            center: Vec2::ZERO,
        }))
    }

    /// Convex polygon from local vertices; clockwise input is rewound
    pub fn polygon(vertices: Vec<Vec2>) -> Result<Self, ConfigError> {
        if vertices.len() < 3 {
            return Err(ConfigError::DegeneratePolygon(vertices.len()));
        }
        let mut local = vertices;
        if signed_area(&local) < 0.0 {
            local.reverse();
        }
        let world = local.clone();
        Ok(Collider::Polygon(PolygonCollider { local, world }))
    }

    /// Rectangle polygon centered on the object (rotates with it)
    pub fn rectangle(width: f32, height: f32) -> Result<Self, ConfigError> {
        if !(width > 0.0 && height > 0.0) {
            return Err(ConfigError::NegativeExtent { width, height });
        }
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self::polygon(vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ])
    }

    /// Segment between two points relative to the owning object
    pub fn segment(a: Vec2, b: Vec2) -> Result<Self, ConfigError> {
        if a == b {
            return Err(ConfigError::DegenerateSegment { x: a.x, y: a.y });
        }
        Ok(Collider::Segment(SegmentCollider {
            local_a: a,
            local_b: b,
            world_a: a,
            world_b: b,
        }))
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Collider::Aabb(_) => ShapeKind::Aabb,
            Collider::Polygon(_) => ShapeKind::Polygon,
            Collider::Segment(_) => ShapeKind::Segment,
        }
    }

    /// Re-derive world geometry from the owner's position and rotation
    pub fn update(&mut self, position: Vec2, rotation: f32) {
        match self {
            Collider::Aabb(aabb) => aabb.center = position,
            Collider::Polygon(poly) => {
                let rot = Vec2::from_angle(rotation);
                poly.world.clear();
                poly.world
                    .extend(poly.local.iter().map(|v| position + rot.rotate(*v)));
            }
            Collider::Segment(seg) => {
                let rot = Vec2::from_angle(rotation);
                seg.world_a = position + rot.rotate(seg.local_a);
                seg.world_b = position + rot.rotate(seg.local_b);
            }
        }
    }

    /// World-space bounding box of the current snapshot
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Collider::Aabb(aabb) => BoundingBox::from_center(aabb.center, aabb.half_extents),
            Collider::Polygon(poly) => BoundingBox::from_points(&poly.world),
            Collider::Segment(seg) => BoundingBox::from_corners(seg.world_a, seg.world_b),
        }
    }

    /// World-space centroid
    pub fn center(&self) -> Vec2 {
        match self {
            Collider::Aabb(aabb) => aabb.center,
            Collider::Polygon(poly) => centroid(&poly.world),
            Collider::Segment(seg) => (seg.world_a + seg.world_b) * 0.5,
        }
    }

    /// World-space vertices (boxes expand to their four corners)
    pub fn vertices(&self) -> Cow<'_, [Vec2]> {
        match self {
            Collider::Aabb(_) => Cow::Owned(self.bounds().corners().to_vec()),
            Collider::Polygon(poly) => Cow::Borrowed(&poly.world),
            Collider::Segment(seg) => Cow::Owned(vec![seg.world_a, seg.world_b]),
        }
    }

    /// Candidate separating axes (unit edge normals)
    fn axes(&self) -> Vec<Vec2> {
        match self {
            Collider::Aabb(_) => vec![Vec2::X, Vec2::Y],
            Collider::Polygon(poly) => edge_normals(&poly.world),
            Collider::Segment(seg) => {
                let n = (seg.world_b - seg.world_a).perp().normalize_or_zero();
                vec![n]
            }
        }
    }

    /// Narrow-phase test against any other collider
    pub fn intersect(&self, other: &Collider) -> Option<Contact> {
        narrow_phase_fn(self.kind(), other.kind())(self, other)
    }

    /// Distance along `ray` to this shape, if hit
    pub fn raycast(&self, ray: &Ray) -> Option<f32> {
        match self {
            Collider::Aabb(_) => ray.cast_box(&self.bounds()),
            Collider::Polygon(poly) => {
                let n = poly.world.len();
                (0..n)
                    .filter_map(|i| ray.cast_segment(poly.world[i], poly.world[(i + 1) % n]))
                    .reduce(f32::min)
            }
            Collider::Segment(seg) => ray.cast_segment(seg.world_a, seg.world_b),
        }
    }
}

/// Pure narrow-phase entry
pub type NarrowPhaseFn = fn(&Collider, &Collider) -> Option<Contact>;

/// Dispatch table keyed by the pair of shape tags
pub fn narrow_phase_fn(a: ShapeKind, b: ShapeKind) -> NarrowPhaseFn {
    match (a, b) {
        (ShapeKind::Aabb, ShapeKind::Aabb) => aabb_vs_aabb,
        // Two static boundaries never need resolving
        (ShapeKind::Segment, ShapeKind::Segment) => segment_vs_segment,
        _ => sat_convex,
    }
}

fn aabb_vs_aabb(a: &Collider, b: &Collider) -> Option<Contact> {
    let (ba, bb) = (a.bounds(), b.bounds());
    let (a_min, a_max) = (ba.min(), ba.max());
    let (b_min, b_max) = (bb.min(), bb.max());

    let overlap_x = a_max.x.min(b_max.x) - a_min.x.max(b_min.x);
    let overlap_y = a_max.y.min(b_max.y) - a_min.y.max(b_min.y);
    // Strict: touching boxes are not colliding
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }

    let delta = bb.center() - ba.center();
    let (normal, depth) = if overlap_x < overlap_y {
        (Vec2::new(if delta.x < 0.0 { -1.0 } else { 1.0 }, 0.0), overlap_x)
    } else {
        (Vec2::new(0.0, if delta.y < 0.0 { -1.0 } else { 1.0 }), overlap_y)
    };

    let point = Vec2::new(
        (a_min.x.max(b_min.x) + a_max.x.min(b_max.x)) * 0.5,
        (a_min.y.max(b_min.y) + a_max.y.min(b_max.y)) * 0.5,
    );

    Some(Contact {
        point,
        normal,
        depth,
    })
}

fn segment_vs_segment(_a: &Collider, _b: &Collider) -> Option<Contact> {
    None
}

/// Separating Axis Theorem over both shapes' edge normals
fn sat_convex(a: &Collider, b: &Collider) -> Option<Contact> {
    let verts_a = a.vertices();
    let verts_b = b.vertices();

    let mut min_depth = f32::INFINITY;
    let mut best_axis = Vec2::ZERO;

    for axis in a.axes().into_iter().chain(b.axes()) {
        if axis == Vec2::ZERO {
            continue;
        }
        let (min_a, max_a) = project(&verts_a, axis);
        let (min_b, max_b) = project(&verts_b, axis);

        let depth = (max_a - min_b).min(max_b - min_a);
        if depth <= 0.0 {
            return None; // Separating axis found
        }
        if depth < min_depth {
            min_depth = depth;
            best_axis = axis;
        }
    }

    if best_axis == Vec2::ZERO {
        return None;
    }

    // Orient from A toward B
    let mut normal = best_axis;
    if (b.center() - a.center()).dot(normal) < 0.0 {
        normal = -normal;
    }

    // Midpoint of the two deepest support points
    let deepest_b = support(&verts_b, -normal);
    let deepest_a = support(&verts_a, normal);
    let point = (deepest_a + deepest_b) * 0.5;

    Some(Contact {
        point,
        normal,
        depth: min_depth,
    })
}

/// Project vertices onto an axis, returning (min, max)
fn project(verts: &[Vec2], axis: Vec2) -> (f32, f32) {
    verts.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        let p = v.dot(axis);
        (lo.min(p), hi.max(p))
    })
}

/// Vertex furthest along `dir`
fn support(verts: &[Vec2], dir: Vec2) -> Vec2 {
    verts
        .iter()
        .copied()
        .max_by(|a, b| a.dot(dir).total_cmp(&b.dot(dir)))
        .unwrap_or(Vec2::ZERO)
}

fn edge_normals(verts: &[Vec2]) -> Vec<Vec2> {
    let n = verts.len();
    (0..n)
        .map(|i| {
            let edge = verts[(i + 1) % n] - verts[i];
            Vec2::new(edge.y, -edge.x).normalize_or_zero()
        })
        .collect()
}

fn centroid(verts: &[Vec2]) -> Vec2 {
    if verts.is_empty() {
        return Vec2::ZERO;
    }
    verts.iter().copied().sum::<Vec2>() / verts.len() as f32
}

fn signed_area(verts: &[Vec2]) -> f32 {
    let n = verts.len();
    (0..n)
        .map(|i| verts[i].perp_dot(verts[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}
