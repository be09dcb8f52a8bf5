//! Scene state
//!
//! The scene exclusively owns every object, the broad-phase tree, the overlap
//! registrations, the race and the surface map. Objects are kept sorted by
//! id so iteration order (and therefore the whole tick) is deterministic.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::barrier::MovingBarrier;
use super::car::Car;
use super::events::SimEvent;
use super::geom::{BoundingBox, Ray};
use super::object::{ObjectId, ObjectKind, PhysicsObject, index_of};
use super::overlap::{OverlapManager, OverlapOptions, OverlapResponse};
use super::quadtree::QuadTree;
use super::race::{CarProgress, RaceConfig, RaceManager};
use super::surface::{SurfaceMap, SurfaceOverlapPolicy, SurfaceSegmentConfig, WeatherZone};
use crate::error::{SimResult, StateError};
use crate::settings::SimSettings;

/// Track description handed over by the map loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackDescriptor {
    pub name: String,
    pub surfaces: Vec<SurfaceSegmentConfig>,
    pub surface_policy: SurfaceOverlapPolicy,
    pub weather_zones: Vec<WeatherZone>,
}

/// Nearest object hit by a scene raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub id: ObjectId,
    pub distance: f32,
    pub point: Vec2,
}

/// Parameters for `Scene::raycast`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayQuery {
    pub origin: Vec2,
    pub dir: Vec2,
    pub max_distance: f32,
    /// Only objects flagged `ai_detectable`
    pub ai_only: bool,
    /// Usually the object casting the ray
    pub exclude: Option<ObjectId>,
}

impl RayQuery {
    pub fn new(origin: Vec2, dir: Vec2, max_distance: f32) -> Self {
        Self {
            origin,
            dir,
            max_distance,
            ai_only: false,
            exclude: None,
        }
    }

    /// AI navigation probe from `from`, ignoring the caster itself
    pub fn navigation(from: &PhysicsObject, dir: Vec2, max_distance: f32) -> Self {
        Self {
            origin: from.body.position,
            dir,
            max_distance,
            ai_only: true,
            exclude: Some(from.id),
        }
    }
}

pub struct Scene {
    bounds: BoundingBox,
    track: TrackDescriptor,
    pub(crate) settings: SimSettings,
    pub(crate) objects: Vec<PhysicsObject>,
    next_id: u32,
    pub(crate) rng: Pcg32,
    pub(crate) quadtree: QuadTree<ObjectId>,
    pub(crate) overlaps: OverlapManager,
    pub(crate) race: RaceManager,
    pub(crate) surfaces: SurfaceMap,
    pub(crate) events: Vec<SimEvent>,
    /// Seconds since construction
    pub(crate) time: f64,
    pub(crate) time_ticks: u64,
}

impl Scene {
    pub fn new(bounds: BoundingBox, track: TrackDescriptor, settings: SimSettings) -> SimResult<Self> {
        settings.validate()?;
        let mut surfaces = SurfaceMap::from_config(&track.surfaces, track.surface_policy)?;
        for zone in &track.weather_zones {
            surfaces.add_zone(*zone);
        }
        log::info!(
            "Scene '{}' created: {} surface segments, {} weather zones",
            track.name,
            surfaces.len(),
            track.weather_zones.len()
        );
        Ok(Self {
            bounds,
            quadtree: QuadTree::with_capacity(bounds, settings.quadtree_capacity, settings.quadtree_max_depth),
            rng: Pcg32::seed_from_u64(settings.seed),
            track,
            settings,
            objects: Vec::new(),
            next_id: 1,
            overlaps: OverlapManager::new(),
            race: RaceManager::new(),
            surfaces,
            events: Vec::new(),
            time: 0.0,
            time_ticks: 0,
        })
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn track(&self) -> &TrackDescriptor {
        &self.track
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    /// Seconds of simulated time
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    // === Objects ===

    /// Take ownership of an object and assign its identity.
    ///
    /// Checkpoints are registered with the race; cars join the race through
    /// `register_car`.
    pub fn insert(&mut self, mut object: PhysicsObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        object.id = id;
        object.update_collider();
        if let ObjectKind::Checkpoint(cp) = &object.kind {
            self.race.register_checkpoint(id, cp);
        }
        log::debug!("inserted {} {}", object.kind.name(), id);
        // Ids only grow, so pushing keeps the table sorted
        self.objects.push(object);
        id
    }

    /// Remove an object and every registration that references it
    pub fn remove(&mut self, id: ObjectId) -> SimResult<PhysicsObject> {
        let index = index_of(&self.objects, id).ok_or(StateError::UnknownObject(id))?;
        if self.race.is_course_checkpoint(id) {
            return Err(StateError::CourseCheckpoint(id).into());
        }
        let object = self.objects.remove(index);
        self.overlaps.purge(id);
        self.race.unregister(id);
        log::debug!("removed {} {}", object.kind.name(), id);
        Ok(object)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        index_of(&self.objects, id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> SimResult<&PhysicsObject> {
        let index = index_of(&self.objects, id).ok_or(StateError::UnknownObject(id))?;
        Ok(&self.objects[index])
    }

    /// Mutable access; colliders are re-derived on the next tick
    pub fn get_mut(&mut self, id: ObjectId) -> SimResult<&mut PhysicsObject> {
        let index = index_of(&self.objects, id).ok_or(StateError::UnknownObject(id))?;
        Ok(&mut self.objects[index])
    }

    /// Objects in id order
    pub fn objects(&self) -> &[PhysicsObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn car(&self, id: ObjectId) -> SimResult<&Car> {
        Ok(self.get(id)?.as_car().ok_or(StateError::NotACar(id))?)
    }

    pub fn car_mut(&mut self, id: ObjectId) -> SimResult<&mut Car> {
        Ok(self.get_mut(id)?.as_car_mut().ok_or(StateError::NotACar(id))?)
    }

    pub fn barrier_mut(&mut self, id: ObjectId) -> SimResult<&mut MovingBarrier> {
        match &mut self.get_mut(id)?.kind {
            ObjectKind::Barrier(barrier) => Ok(barrier),
            _ => Err(StateError::NotABarrier(id).into()),
        }
    }

    // === Overlaps ===

    /// Register a pair of interest; both objects must be in the scene
    pub fn register_overlap(
        &mut self,
        a: ObjectId,
        b: ObjectId,
        response: OverlapResponse,
        options: OverlapOptions,
    ) -> SimResult<()> {
        for id in [a, b] {
            if !self.contains(id) {
                return Err(StateError::UnknownObject(id).into());
            }
        }
        Ok(self.overlaps.register(a, b, response, options)?)
    }

    pub fn overlaps(&self) -> &OverlapManager {
        &self.overlaps
    }

    // === Race ===

    /// Enter a car into the race; its current pose is the first reset point
    pub fn register_car(&mut self, id: ObjectId) -> SimResult<()> {
        let object = self.get(id)?;
        if !object.is_car() {
            return Err(StateError::NotACar(id).into());
        }
        let pose = object.body;
        self.race.register_car(id, pose, self.time);
        Ok(())
    }

    /// Validate the checkpoint course and start the clock on the race
    pub fn start_race(&mut self, config: RaceConfig) -> SimResult<()> {
        self.race.start(config, self.time)?;
        for obj in &mut self.objects {
            if let ObjectKind::Checkpoint(cp) = &mut obj.kind {
                cp.activated = false;
            }
        }
        Ok(())
    }

    pub fn race(&self) -> &RaceManager {
        &self.race
    }

    pub fn progress(&self, id: ObjectId) -> SimResult<&CarProgress> {
        if !self.race.is_started() {
            return Err(StateError::RaceNotStarted.into());
        }
        Ok(self.race.progress(id).ok_or(StateError::UnregisteredCar(id))?)
    }

    pub fn leaderboard(&self) -> Vec<ObjectId> {
        self.race.leaderboard()
    }

    pub fn race_over(&self) -> bool {
        self.race.race_over()
    }

    // === Surfaces ===

    pub fn surfaces(&self) -> &SurfaceMap {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut SurfaceMap {
        &mut self.surfaces
    }

    // === Queries ===

    /// Nearest object along a ray, within `max_distance`
    pub fn raycast(&self, query: &RayQuery) -> Option<RayHit> {
        let ray = Ray::new(query.origin, query.dir)?;
        let mut best: Option<RayHit> = None;
        for obj in &self.objects {
            if Some(obj.id) == query.exclude
                || (query.ai_only && !obj.ai_detectable)
                || !obj.is_collidable()
            {
                continue;
            }
            let limit = best.map_or(query.max_distance, |b| b.distance);
            // Cheap reject on the bounding box first
            if ray.cast_box(&obj.bounds()).is_none_or(|t| t > limit) {
                continue;
            }
            if let Some(t) = obj.collider.raycast(&ray) {
                if t <= limit {
                    best = Some(RayHit {
                        id: obj.id,
                        distance: t,
                        point: ray.at(t),
                    });
                }
            }
        }
        best
    }

    /// Events produced since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Rebuild the broad-phase tree from current collider bounds
    pub(crate) fn rebuild_quadtree(&mut self) {
        self.quadtree.clear();
        for obj in self.objects.iter().filter(|o| o.is_collidable()) {
            self.quadtree.insert(obj.id, obj.bounds());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::sim::car::CarSpec;
    use crate::sim::collision::Collider;

    fn empty_scene() -> Scene {
        Scene::new(
            BoundingBox::from_corners(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)),
            TrackDescriptor::default(),
            SimSettings::default(),
        )
        .unwrap()
    }

    fn crate_at(x: f32, y: f32) -> PhysicsObject {
        PhysicsObject::new(Collider::aabb(2.0, 2.0).unwrap(), 50.0)
            .unwrap()
            .at(Vec2::new(x, y), 0.0)
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut scene = empty_scene();
        let a = scene.insert(crate_at(0.0, 0.0));
        let b = scene.insert(crate_at(5.0, 0.0));
        scene.remove(a).unwrap();
        let c = scene.insert(crate_at(10.0, 0.0));

        assert_eq!((a, b, c), (ObjectId(1), ObjectId(2), ObjectId(3)));
        assert_eq!(
            scene.get(a).unwrap_err(),
            SimError::State(StateError::UnknownObject(a))
        );
        assert!(scene.remove(a).is_err());
        assert_eq!(scene.objects().iter().map(|o| o.id).collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn test_remove_purges_overlaps_and_race() {
        let mut scene = empty_scene();
        let car = scene
            .insert(PhysicsObject::car(CarSpec::default(), Vec2::ZERO, 0.0).unwrap());
        let other = scene.insert(crate_at(10.0, 0.0));
        scene
            .register_overlap(car, other, OverlapResponse::Report, OverlapOptions::default())
            .unwrap();
        scene.register_car(car).unwrap();

        scene.remove(car).unwrap();
        assert!(scene.overlaps().is_empty());
        assert!(!scene.race().is_registered(car));

        let err = scene
            .register_overlap(car, other, OverlapResponse::Report, OverlapOptions::default())
            .unwrap_err();
        assert_eq!(err, SimError::State(StateError::UnknownObject(car)));
    }

    #[test]
    fn test_course_checkpoint_removal_refused_while_racing() {
        let mut scene = empty_scene();
        let gate = |order: u32, x: f32| {
            PhysicsObject::checkpoint(order, order == 0, Collider::aabb(1.0, 10.0).unwrap(), Vec2::new(x, 0.0), 0.0)
                .unwrap()
        };
        let finish = scene.insert(gate(0, 0.0));
        let split = scene.insert(gate(1, 20.0));
        let spare = scene.insert(gate(1, 40.0));

        // Course is built only from what is present at the start
        scene.remove(spare).unwrap();
        scene.start_race(RaceConfig::default()).unwrap();

        assert_eq!(
            scene.remove(split).unwrap_err(),
            SimError::State(StateError::CourseCheckpoint(split))
        );
        assert!(scene.contains(split));
        assert!(scene.remove(finish).is_err());
        assert_eq!(scene.race().checkpoint_count(), 2);
    }

    #[test]
    fn test_type_checked_accessors() {
        let mut scene = empty_scene();
        let id = scene.insert(crate_at(0.0, 0.0));
        assert_eq!(scene.car(id).unwrap_err(), SimError::State(StateError::NotACar(id)));
        assert!(scene.barrier_mut(id).is_err());
        assert_eq!(scene.register_car(id).unwrap_err(), SimError::State(StateError::NotACar(id)));
        assert_eq!(
            scene.progress(id).unwrap_err(),
            SimError::State(StateError::RaceNotStarted)
        );
    }

    #[test]
    fn test_raycast_nearest_and_ai_filter() {
        let mut scene = empty_scene();
        let near = scene.insert(crate_at(10.0, 0.0));
        let far = scene.insert(crate_at(20.0, 0.0));
        let gate = scene.insert(
            PhysicsObject::checkpoint(0, true, Collider::aabb(1.0, 10.0).unwrap(), Vec2::new(5.0, 0.0), 0.0)
                .unwrap(),
        );

        let hit = scene.raycast(&RayQuery::new(Vec2::ZERO, Vec2::X, 100.0)).unwrap();
        assert_eq!(hit.id, gate);
        assert!((hit.distance - 4.5).abs() < 1e-4);

        let probe = RayQuery {
            ai_only: true,
            ..RayQuery::new(Vec2::ZERO, Vec2::X, 100.0)
        };
        let hit = scene.raycast(&probe).unwrap();
        assert_eq!(hit.id, near);
        assert!((hit.point - Vec2::new(9.0, 0.0)).length() < 1e-4);

        let excluded = RayQuery {
            exclude: Some(near),
            ..probe
        };
        assert_eq!(scene.raycast(&excluded).unwrap().id, far);
        assert!(scene.raycast(&RayQuery::new(Vec2::ZERO, Vec2::X, 5.0)).is_some());
        assert!(scene.raycast(&RayQuery { max_distance: 4.0, ..probe }).is_none());
        assert!(scene.raycast(&RayQuery::new(Vec2::ZERO, Vec2::ZERO, 100.0)).is_none());
    }

    #[test]
    fn test_bad_surface_config_rejected() {
        let track = TrackDescriptor {
            surfaces: vec![SurfaceSegmentConfig {
                start: Vec2::ZERO,
                end: Vec2::X,
                width: -1.0,
                surface: crate::sim::surface::SurfaceType::Dirt,
            }],
            ..Default::default()
        };
        let result = Scene::new(BoundingBox::from_corners(Vec2::ZERO, Vec2::ONE), track, SimSettings::default());
        assert!(matches!(result, Err(SimError::Config(_))));

        let track = TrackDescriptor {
            name: "hairpin".into(),
            ..Default::default()
        };
        let scene = Scene::new(BoundingBox::from_corners(Vec2::ZERO, Vec2::ONE), track.clone(), SimSettings::default())
            .unwrap();
        assert_eq!(scene.track(), &track);
    }
}
