//! Geometry primitives: bounding boxes, rays and segment helpers
//!
//! Everything here is pure; colliders and the quadtree build on it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Axis-aligned rectangle given by its minimum corner and size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub origin: Vec2,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(origin: Vec2, width: f32, height: f32) -> Result<Self, ConfigError> {
        if !(width >= 0.0 && height >= 0.0) {
            return Err(ConfigError::NegativeExtent { width, height });
        }
        Ok(Self {
            origin,
            width,
            height,
        })
    }

    /// Smallest box containing both corners (any order)
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            origin: min,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    /// Box centered on `center` with the given half extents
    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self::from_corners(center - half, center + half)
    }

    /// Tight bounds of a point cloud (empty input gives a zero box at the origin)
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::from_corners(Vec2::ZERO, Vec2::ZERO);
        };
        let (min, max) = points
            .iter()
            .skip(1)
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Self::from_corners(min, max)
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.origin + Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.origin + Vec2::new(self.width, self.height) * 0.5
    }

    /// Overlap test, touching edges count
    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        a_min.x <= b_max.x && b_min.x <= a_max.x && a_min.y <= b_max.y && b_min.y <= a_max.y
    }

    /// True when `other` lies entirely inside this box
    #[inline]
    pub fn contains(&self, other: &BoundingBox) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        b_min.x >= a_min.x && b_min.y >= a_min.y && b_max.x <= a_max.x && b_max.y <= a_max.y
    }

    /// Split into four equal quadrants (NW, NE, SW, SE in y-down order)
    pub fn quadrants(&self) -> [BoundingBox; 4] {
        let hw = self.width * 0.5;
        let hh = self.height * 0.5;
        let o = self.origin;
        [
            BoundingBox { origin: o, width: hw, height: hh },
            BoundingBox { origin: o + Vec2::new(hw, 0.0), width: hw, height: hh },
            BoundingBox { origin: o + Vec2::new(0.0, hh), width: hw, height: hh },
            BoundingBox { origin: o + Vec2::new(hw, hh), width: hw, height: hh },
        ]
    }

    /// Corners in counter-clockwise order (y up)
    pub fn corners(&self) -> [Vec2; 4] {
        let (min, max) = (self.min(), self.max());
        [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)]
    }
}

/// A half-line used for line-of-sight and AI probing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec2,
    /// Unit direction
    pub dir: Vec2,
}

impl Ray {
    /// Build a ray; a zero direction yields `None`
    pub fn new(origin: Vec2, dir: Vec2) -> Option<Self> {
        let dir = dir.normalize_or_zero();
        if dir == Vec2::ZERO {
            return None;
        }
        Some(Self { origin, dir })
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec2 {
        self.origin + self.dir * t
    }

    /// Distance along the ray to segment `a`-`b`, if it is hit
    pub fn cast_segment(&self, a: Vec2, b: Vec2) -> Option<f32> {
        let edge = b - a;
        let denom = self.dir.perp_dot(edge);
        if denom.abs() < f32::EPSILON {
            return None; // Parallel
        }
        let rel = a - self.origin;
        let t = rel.perp_dot(edge) / denom;
        let u = rel.perp_dot(self.dir) / denom;
        (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
    }

    /// Slab test; origin inside the box returns 0
    pub fn cast_box(&self, bounds: &BoundingBox) -> Option<f32> {
        let (min, max) = (bounds.min(), bounds.max());
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;

        for axis in 0..2 {
            let o = self.origin[axis];
            let d = self.dir[axis];
            if d.abs() < f32::EPSILON {
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (min[axis] - o) * inv;
            let mut t1 = (max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// Closest point to `p` on segment `a`-`b`
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// True when segments `a`-`b` and `c`-`d` cross or touch
pub fn segments_intersect(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> bool {
    let d1 = (b - a).perp_dot(c - a);
    let d2 = (b - a).perp_dot(d - a);
    let d3 = (d - c).perp_dot(a - c);
    let d4 = (d - c).perp_dot(b - c);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    // Collinear / endpoint-touching cases
    (d1 == 0.0 && closest_point_on_segment(c, a, b) == c)
        || (d2 == 0.0 && closest_point_on_segment(d, a, b) == d)
        || (d3 == 0.0 && closest_point_on_segment(a, c, d) == a)
        || (d4 == 0.0 && closest_point_on_segment(b, c, d) == b)
}

/// Minimum distance between segments `a`-`b` and `c`-`d`
pub fn segment_distance(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> f32 {
    if segments_intersect(a, b, c, d) {
        return 0.0;
    }
    [
        (a - closest_point_on_segment(a, c, d)).length(),
        (b - closest_point_on_segment(b, c, d)).length(),
        (c - closest_point_on_segment(c, a, b)).length(),
        (d - closest_point_on_segment(d, a, b)).length(),
    ]
    .into_iter()
    .fold(f32::INFINITY, f32::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_extent_rejected() {
        assert!(BoundingBox::new(Vec2::ZERO, -1.0, 2.0).is_err());
        assert!(BoundingBox::new(Vec2::ZERO, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_intersects_and_contains() {
        let a = BoundingBox::from_corners(Vec2::ZERO, Vec2::new(10.0, 10.0));
        let b = BoundingBox::from_corners(Vec2::new(5.0, 5.0), Vec2::new(8.0, 8.0));
        let c = BoundingBox::from_corners(Vec2::new(10.0, 0.0), Vec2::new(12.0, 4.0));
        let d = BoundingBox::from_corners(Vec2::new(20.0, 20.0), Vec2::new(21.0, 21.0));

        assert!(a.contains(&b));
        assert!(!b.contains(&a));
        assert!(a.intersects(&c)); // Shared edge
        assert!(!a.intersects(&d));
    }

    #[test]
    fn test_quadrants_tile_parent() {
        let parent = BoundingBox::from_corners(Vec2::new(-4.0, -4.0), Vec2::new(4.0, 4.0));
        let quads = parent.quadrants();
        let area: f32 = quads.iter().map(|q| q.width * q.height).sum();
        assert!((area - 64.0).abs() < 1e-4);
        assert!(quads.iter().all(|q| parent.contains(q)));
    }

    #[test]
    fn test_ray_hits_segment() {
        let ray = Ray::new(Vec2::ZERO, Vec2::X).unwrap();
        let t = ray.cast_segment(Vec2::new(5.0, -1.0), Vec2::new(5.0, 1.0));
        assert!((t.unwrap() - 5.0).abs() < 1e-5);

        // Behind the origin
        assert!(ray
            .cast_segment(Vec2::new(-5.0, -1.0), Vec2::new(-5.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_ray_box() {
        let ray = Ray::new(Vec2::new(-10.0, 1.0), Vec2::X).unwrap();
        let bounds = BoundingBox::from_corners(Vec2::ZERO, Vec2::new(2.0, 2.0));
        assert!((ray.cast_box(&bounds).unwrap() - 10.0).abs() < 1e-5);

        let miss = Ray::new(Vec2::new(-10.0, 5.0), Vec2::X).unwrap();
        assert!(miss.cast_box(&bounds).is_none());

        assert!(Ray::new(Vec2::ZERO, Vec2::ZERO).is_none());
    }

    #[test]
    fn test_segment_distance() {
        let d = segment_distance(
            Vec2::ZERO,
            Vec2::new(10.0, 0.0),
            Vec2::new(0.0, 3.0),
            Vec2::new(10.0, 3.0),
        );
        assert!((d - 3.0).abs() < 1e-5);

        let crossing = segment_distance(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        );
        assert_eq!(crossing, 0.0);
    }
}
