//! Track surface lookup
//!
//! A surface map is an ordered list of capsule-shaped segments, each tagged
//! with a surface type. Weather adds a global multiplier pair plus circular
//! zones (puddles), all combined multiplicatively with the base surface.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::{closest_point_on_segment, segment_distance};
use crate::error::ConfigError;

/// Surface material under a track segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SurfaceType {
    Asphalt,
    Dirt,
    Ice,
    Grass,
    Gravel,
}

impl SurfaceType {
    /// Base (grip, drag) multipliers
    pub fn properties(&self) -> SurfaceProperties {
        let (grip, drag) = match self {
            SurfaceType::Asphalt => (1.0, 1.0),
            SurfaceType::Dirt => (0.7, 1.5),
            SurfaceType::Ice => (0.25, 0.8),
            SurfaceType::Grass => (0.6, 2.0),
            SurfaceType::Gravel => (0.5, 2.5),
        };
        SurfaceProperties { grip, drag }
    }
}

/// Multipliers applied to tire grip and rolling drag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceProperties {
    pub grip: f32,
    pub drag: f32,
}

impl SurfaceProperties {
    pub const NEUTRAL: SurfaceProperties = SurfaceProperties {
        grip: 1.0,
        drag: 1.0,
    };

    /// Component-wise product
    #[inline]
    pub fn combine(self, other: SurfaceProperties) -> SurfaceProperties {
        SurfaceProperties {
            grip: self.grip * other.grip,
            drag: self.drag * other.drag,
        }
    }
}

impl Default for SurfaceProperties {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Numeric effect of weather (rain, snow); the visuals live elsewhere
pub type WeatherModifier = SurfaceProperties;

/// One labeled stretch of track, as read from the map file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSegmentConfig {
    pub start: Vec2,
    pub end: Vec2,
    pub width: f32,
    pub surface: SurfaceType,
}

/// Validated surface segment
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSegment {
    start: Vec2,
    end: Vec2,
    width: f32,
    surface: SurfaceType,
}

impl SurfaceSegment {
    pub fn new(start: Vec2, end: Vec2, width: f32, surface: SurfaceType) -> Result<Self, ConfigError> {
        if !(width > 0.0 && width.is_finite()) {
            return Err(ConfigError::NonPositive {
                field: "surface width",
                value: width,
            });
        }
        Ok(Self {
            start,
            end,
            width,
            surface,
        })
    }

    pub fn surface(&self) -> SurfaceType {
        self.surface
    }

    /// Point lies within half the width of the centerline
    pub fn covers(&self, p: Vec2) -> bool {
        let closest = closest_point_on_segment(p, self.start, self.end);
        (p - closest).length_squared() <= (self.width * 0.5).powi(2)
    }

    fn overlaps(&self, other: &SurfaceSegment) -> bool {
        segment_distance(self.start, self.end, other.start, other.end)
            < (self.width + other.width) * 0.5
    }
}

impl TryFrom<&SurfaceSegmentConfig> for SurfaceSegment {
    type Error = ConfigError;

    fn try_from(cfg: &SurfaceSegmentConfig) -> Result<Self, Self::Error> {
        SurfaceSegment::new(cfg.start, cfg.end, cfg.width, cfg.surface)
    }
}

/// How overlapping segments are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SurfaceOverlapPolicy {
    /// The most recently added segment under a point wins
    #[default]
    LastWins,
    /// Overlapping segments are a configuration error
    Reject,
}

/// Circular weather zone such as a puddle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherZone {
    pub center: Vec2,
    pub radius: f32,
    pub modifier: WeatherModifier,
}

impl WeatherZone {
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        (p - self.center).length_squared() <= self.radius * self.radius
    }
}

/// Piecewise surface lookup with weather overrides
#[derive(Debug, Clone, Default)]
pub struct SurfaceMap {
    segments: Vec<SurfaceSegment>,
    policy: SurfaceOverlapPolicy,
    weather: WeatherModifier,
    zones: Vec<WeatherZone>,
}

impl SurfaceMap {
    pub fn new(policy: SurfaceOverlapPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Build from map configuration in order
    pub fn from_config(
        segments: &[SurfaceSegmentConfig],
        policy: SurfaceOverlapPolicy,
    ) -> Result<Self, ConfigError> {
        let mut map = Self::new(policy);
        for cfg in segments {
            map.add_segment(SurfaceSegment::try_from(cfg)?)?;
        }
        Ok(map)
    }

    pub fn policy(&self) -> SurfaceOverlapPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment; under `Reject` an overlap is an error
    pub fn add_segment(&mut self, segment: SurfaceSegment) -> Result<(), ConfigError> {
        if self.policy == SurfaceOverlapPolicy::Reject {
            if let Some(other) = self.segments.iter().position(|s| s.overlaps(&segment)) {
                return Err(ConfigError::OverlappingSurface {
                    index: self.segments.len(),
                    other,
                });
            }
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Surface type under a point, if any segment covers it
    pub fn surface_at(&self, p: Vec2) -> Option<SurfaceType> {
        // Later segments override earlier ones
        self.segments
            .iter()
            .rev()
            .find(|s| s.covers(p))
            .map(|s| s.surface)
    }

    /// Base multipliers combined with global weather and every zone covering `p`
    pub fn properties_at(&self, p: Vec2) -> SurfaceProperties {
        let base = self
            .surface_at(p)
            .map_or(SurfaceProperties::NEUTRAL, |s| s.properties());
        self.zones
            .iter()
            .filter(|z| z.contains(p))
            .fold(base.combine(self.weather), |acc, z| acc.combine(z.modifier))
    }

    /// Replace the global weather multipliers (called once per tick by the feed)
    pub fn set_weather(&mut self, weather: WeatherModifier) {
        self.weather = weather;
    }

    pub fn weather(&self) -> WeatherModifier {
        self.weather
    }

    pub fn add_zone(&mut self, zone: WeatherZone) {
        self.zones.push(zone);
    }

    pub fn clear_zones(&mut self) {
        self.zones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(y: f32, surface: SurfaceType) -> SurfaceSegment {
        SurfaceSegment::new(Vec2::new(0.0, y), Vec2::new(100.0, y), 10.0, surface).unwrap()
    }

    #[test]
    fn test_neutral_off_track() {
        let mut map = SurfaceMap::default();
        map.add_segment(straight(0.0, SurfaceType::Ice)).unwrap();
        assert_eq!(map.properties_at(Vec2::new(50.0, 50.0)), SurfaceProperties::NEUTRAL);
        assert_eq!(map.properties_at(Vec2::new(50.0, 4.0)).grip, 0.25);
    }

    #[test]
    fn test_last_added_wins() {
        let mut map = SurfaceMap::new(SurfaceOverlapPolicy::LastWins);
        map.add_segment(straight(0.0, SurfaceType::Asphalt)).unwrap();
        map.add_segment(
            SurfaceSegment::new(Vec2::new(40.0, 0.0), Vec2::new(60.0, 0.0), 10.0, SurfaceType::Gravel)
                .unwrap(),
        )
        .unwrap();

        assert_eq!(map.surface_at(Vec2::new(50.0, 0.0)), Some(SurfaceType::Gravel));
        assert_eq!(map.surface_at(Vec2::new(10.0, 0.0)), Some(SurfaceType::Asphalt));
    }

    #[test]
    fn test_reject_policy_refuses_overlap() {
        let mut map = SurfaceMap::new(SurfaceOverlapPolicy::Reject);
        map.add_segment(straight(0.0, SurfaceType::Asphalt)).unwrap();
        let err = map.add_segment(straight(5.0, SurfaceType::Dirt)).unwrap_err();
        assert_eq!(err, ConfigError::OverlappingSurface { index: 1, other: 0 });

        // Far enough apart
        map.add_segment(straight(20.0, SurfaceType::Dirt)).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_weather_and_puddles_multiply() {
        let mut map = SurfaceMap::default();
        map.add_segment(straight(0.0, SurfaceType::Dirt)).unwrap();
        map.set_weather(SurfaceProperties { grip: 0.8, drag: 1.0 });
        map.add_zone(WeatherZone {
            center: Vec2::new(50.0, 0.0),
            radius: 3.0,
            modifier: SurfaceProperties { grip: 0.5, drag: 1.2 },
        });

        let wet = map.properties_at(Vec2::new(50.0, 0.0));
        assert!((wet.grip - 0.7 * 0.8 * 0.5).abs() < 1e-6);
        assert!((wet.drag - 1.5 * 1.2).abs() < 1e-6);

        let dry = map.properties_at(Vec2::new(10.0, 0.0));
        assert!((dry.grip - 0.7 * 0.8).abs() < 1e-6);

        map.clear_zones();
        assert!((map.properties_at(Vec2::new(50.0, 0.0)).grip - 0.56).abs() < 1e-6);
    }

    #[test]
    fn test_from_config_parses_json() {
        let json = r#"[
            { "start": [0.0, 0.0], "end": [50.0, 0.0], "width": 12.0, "surface": "ASPHALT" },
            { "start": [50.0, 0.0], "end": [50.0, 50.0], "width": 12.0, "surface": "ICE" }
        ]"#;
        let cfgs: Vec<SurfaceSegmentConfig> = serde_json::from_str(json).unwrap();
        let map = SurfaceMap::from_config(&cfgs, SurfaceOverlapPolicy::LastWins).unwrap();
        assert_eq!(map.surface_at(Vec2::new(50.0, 30.0)), Some(SurfaceType::Ice));
        assert!(SurfaceSegment::new(Vec2::ZERO, Vec2::X, 0.0, SurfaceType::Dirt).is_err());
    }
}
