//! Fixed timestep simulation tick
//!
//! One tick runs, in order: inputs, integration, collider refresh and
//! broad-phase rebuild, overlap processing and response, race update. All
//! input is validated before anything is mutated, so a rejected tick leaves
//! the scene untouched.

use std::collections::BTreeMap;

use super::car::CarControls;
use super::events::SimEvent;
use super::object::{BonusKind, ObjectId, ObjectKind, PhysicsObject, index_of, pair_mut};
use super::overlap::CollisionRecord;
use super::state::Scene;
use super::surface::WeatherModifier;
use crate::error::{ConfigError, SimResult, StateError};
use crate::normalize_angle;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Driver controls per car; cars without an entry keep their last controls
    pub controls: BTreeMap<ObjectId, CarControls>,
    /// Global weather multipliers from the weather feed
    pub weather: Option<WeatherModifier>,
    /// Barriers to toggle this tick (track switches, scripted events)
    pub toggle_barriers: Vec<ObjectId>,
}

/// Advance the scene by one fixed timestep
pub fn tick(scene: &mut Scene, input: &TickInput, dt: f32) -> SimResult<()> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(ConfigError::InvalidTimestep(dt).into());
    }
    validate_input(scene, input)?;

    // Inputs
    if let Some(weather) = input.weather {
        scene.surfaces.set_weather(weather);
    }
    for (&id, controls) in &input.controls {
        scene.car_mut(id)?.apply_controls(controls);
    }
    for &id in &input.toggle_barriers {
        scene.barrier_mut(id)?.toggle();
    }

    integrate(scene, dt);

    // Colliders must match the new poses before the broad phase sees them
    for obj in scene.objects.iter_mut() {
        obj.update_collider();
    }
    scene.rebuild_quadtree();

    let records = scene
        .overlaps
        .process(&mut scene.objects, &scene.quadtree, &scene.settings);
    for record in records {
        dispatch_contact(scene, record);
    }

    scene.time += f64::from(dt);
    scene.time_ticks += 1;
    scene
        .race
        .update(scene.time, &mut scene.objects, &mut scene.events);

    Ok(())
}

fn validate_input(scene: &Scene, input: &TickInput) -> SimResult<()> {
    for &id in input.controls.keys() {
        if !scene.get(id)?.is_car() {
            return Err(StateError::NotACar(id).into());
        }
    }
    for &id in &input.toggle_barriers {
        if !matches!(scene.get(id)?.kind, ObjectKind::Barrier(_)) {
            return Err(StateError::NotABarrier(id).into());
        }
    }
    if let Some(weather) = input.weather {
        if !(weather.grip >= 0.0 && weather.drag >= 0.0) {
            return Err(ConfigError::NonPositive {
                field: "weather multiplier",
                value: weather.grip.min(weather.drag),
            }
            .into());
        }
    }
    Ok(())
}

/// Move every object by its own rule
fn integrate(scene: &mut Scene, dt: f32) {
    let settings = &scene.settings;
    let surfaces = &scene.surfaces;

    for obj in scene.objects.iter_mut() {
        let PhysicsObject {
            body,
            kind,
            movable,
            ..
        } = obj;
        match kind {
            ObjectKind::Car(car) => {
                let surface = surfaces.properties_at(body.position);
                car.step(body, surface, settings.gravity, settings.stop_speed, dt);
            }
            ObjectKind::Barrier(barrier) => {
                let before = barrier.position();
                barrier.update(dt);
                let after = barrier.position();
                body.position = after;
                // Kinematic: the impulse solver only needs the velocity
                body.velocity = (after - before) / dt;
            }
            ObjectKind::Bonus(bonus) => bonus.update(dt),
            ObjectKind::Checkpoint(_) => {}
            ObjectKind::Generic => {
                if *movable {
                    body.position += body.velocity * dt;
                    body.rotation = normalize_angle(body.rotation + body.angular_velocity * dt);
                }
            }
        }
    }
}

/// Collectible pickups for car/bonus contacts, collision events for the rest
fn dispatch_contact(scene: &mut Scene, record: CollisionRecord) {
    let (Some(i), Some(j)) = (index_of(&scene.objects, record.a), index_of(&scene.objects, record.b)) else {
        return;
    };
    let pickup = match (&scene.objects[i].kind, &scene.objects[j].kind) {
        (ObjectKind::Car(_), ObjectKind::Bonus(_)) => Some((i, j)),
        (ObjectKind::Bonus(_), ObjectKind::Car(_)) => Some((j, i)),
        _ => None,
    };

    match pickup {
        Some((car, bonus)) => collect_bonus(scene, car, bonus),
        None => scene.events.push(SimEvent::Collision {
            a: record.a,
            b: record.b,
            contact: record.contact,
        }),
    }
}

fn collect_bonus(scene: &mut Scene, car_index: usize, bonus_index: usize) {
    let (car_obj, bonus_obj) = pair_mut(&mut scene.objects, car_index, bonus_index);
    let ObjectKind::Bonus(bonus) = &mut bonus_obj.kind else {
        return;
    };
    // Another car may have taken it earlier in this pass
    if !bonus.collect() {
        return;
    }
    let kind = bonus.kind;
    let PhysicsObject {
        id: car_id,
        body,
        kind: ObjectKind::Car(car),
        ..
    } = car_obj
    else {
        return;
    };

    match kind {
        BonusKind::Nitro { amount } => car.add_nitro(amount),
        BonusKind::Banana => car.apply_slip(body, &mut scene.rng),
        BonusKind::Puddle { modifier, duration } => car.apply_surface_effect(modifier, duration),
    }
    log::debug!("car {} collected {:?}", car_id, kind);
    scene.events.push(SimEvent::BonusCollected {
        car: *car_id,
        bonus: bonus_obj.id,
        kind,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::error::SimError;
    use crate::settings::SimSettings;
    use crate::sim::barrier::{BarrierConfig, BarrierState};
    use crate::sim::car::CarSpec;
    use crate::sim::collision::Collider;
    use crate::sim::geom::BoundingBox;
    use crate::sim::race::RaceConfig;
    use crate::sim::state::TrackDescriptor;
    use crate::sim::surface::{SurfaceOverlapPolicy, SurfaceProperties, SurfaceSegmentConfig, SurfaceType};
    use glam::Vec2;

    fn new_scene(seed: u64) -> Scene {
        let track = TrackDescriptor {
            name: "test strip".into(),
            surfaces: vec![SurfaceSegmentConfig {
                start: Vec2::new(-200.0, 0.0),
                end: Vec2::new(200.0, 0.0),
                width: 20.0,
                surface: SurfaceType::Asphalt,
            }],
            surface_policy: SurfaceOverlapPolicy::LastWins,
            weather_zones: Vec::new(),
        };
        let settings = SimSettings {
            seed,
            ..Default::default()
        };
        Scene::new(
            BoundingBox::from_corners(Vec2::new(-256.0, -256.0), Vec2::new(256.0, 256.0)),
            track,
            settings,
        )
        .unwrap()
    }

    fn full_throttle(id: ObjectId) -> TickInput {
        TickInput {
            controls: BTreeMap::from([(
                id,
                CarControls {
                    throttle: 1.0,
                    ..Default::default()
                },
            )]),
            ..Default::default()
        }
    }

    fn run(scene: &mut Scene, input: &TickInput, ticks: u32) {
        for _ in 0..ticks {
            tick(scene, input, SIM_DT).unwrap();
        }
    }

    #[test]
    fn test_rejected_tick_leaves_scene_untouched() {
        let mut scene = new_scene(1);
        let crate_id = scene.insert(
            PhysicsObject::new(Collider::aabb(1.0, 1.0).unwrap(), 10.0)
                .unwrap()
                .with_velocity(Vec2::X),
        );

        let err = tick(&mut scene, &TickInput::default(), 0.0).unwrap_err();
        assert_eq!(err, SimError::Config(ConfigError::InvalidTimestep(0.0)));

        let input = TickInput {
            weather: Some(SurfaceProperties { grip: 0.5, drag: 1.0 }),
            ..full_throttle(crate_id)
        };
        let err = tick(&mut scene, &input, SIM_DT).unwrap_err();
        assert_eq!(err, SimError::State(StateError::NotACar(crate_id)));

        assert_eq!(scene.time_ticks(), 0);
        assert_eq!(scene.get(crate_id).unwrap().body.position, Vec2::ZERO);
        assert_eq!(scene.surfaces().weather(), SurfaceProperties::NEUTRAL);
    }

    #[test]
    fn test_car_accelerates_and_nitro_helps() {
        let mut scene = new_scene(1);
        let plain = scene.insert(PhysicsObject::car(CarSpec::default(), Vec2::new(0.0, -5.0), 0.0).unwrap());
        let boosted = scene.insert(PhysicsObject::car(CarSpec::default(), Vec2::new(0.0, 5.0), 0.0).unwrap());

        let mut input = full_throttle(plain);
        input.controls.insert(
            boosted,
            CarControls {
                throttle: 1.0,
                nitro: true,
                ..Default::default()
            },
        );
        run(&mut scene, &input, 120);

        let plain_body = scene.get(plain).unwrap().body;
        let boosted_body = scene.get(boosted).unwrap().body;
        assert!(plain_body.velocity.x > 1.0);
        assert!(plain_body.velocity.y.abs() < 1e-3);
        assert!(boosted_body.velocity.x > plain_body.velocity.x);
        assert!(scene.car(boosted).unwrap().nitro() < CarSpec::default().nitro_capacity);
    }

    #[test]
    fn test_head_on_boxes_swap_velocities() {
        let mut scene = new_scene(1);
        let boxed = |x: f32, vx: f32| {
            PhysicsObject::new(Collider::aabb(2.0, 2.0).unwrap(), 100.0)
                .unwrap()
                .at(Vec2::new(x, 50.0), 0.0)
                .with_velocity(Vec2::new(vx, 0.0))
                .with_restitution(1.0)
        };
        let a = scene.insert(boxed(-1.05, 10.0));
        let b = scene.insert(boxed(1.05, -10.0));

        run(&mut scene, &TickInput::default(), 3);

        assert!((scene.get(a).unwrap().body.velocity - Vec2::new(-10.0, 0.0)).length() < 1e-3);
        assert!((scene.get(b).unwrap().body.velocity - Vec2::new(10.0, 0.0)).length() < 1e-3);
        let events = scene.drain_events();
        assert!(events.iter().any(|e| matches!(e, SimEvent::Collision { a: ea, b: eb, .. } if *ea == a && *eb == b)));
        assert!(scene.drain_events().is_empty());
    }

    #[test]
    fn test_huge_rotation_wraps_within_one_tick() {
        let mut scene = new_scene(1);
        let spinner = scene.insert(
            PhysicsObject::new(Collider::aabb(2.0, 2.0).unwrap(), 10.0)
                .unwrap()
                .at(Vec2::new(0.0, 100.0), 0.0),
        );
        let car = scene.insert(PhysicsObject::car(CarSpec::default(), Vec2::new(50.0, 0.0), 0.0).unwrap());
        scene.get_mut(spinner).unwrap().body.rotation = 1.0e9;
        scene.get_mut(car).unwrap().body.rotation = -3.0e12;

        tick(&mut scene, &TickInput::default(), SIM_DT).unwrap();

        for id in [spinner, car] {
            let rotation = scene.get(id).unwrap().body.rotation;
            assert!((-std::f32::consts::PI..std::f32::consts::PI).contains(&rotation));
        }
    }

    #[test]
    fn test_banana_pickup_spins_car_once() {
        let mut scene = new_scene(7);
        let car = scene.insert(
            PhysicsObject::car(CarSpec::default(), Vec2::ZERO, 0.0)
                .unwrap()
                .with_velocity(Vec2::new(20.0, 0.0)),
        );
        let peel = scene.insert(
            PhysicsObject::bonus(BonusKind::Banana, Collider::aabb(1.0, 1.0).unwrap(), Vec2::new(3.0, 0.0), Some(5.0))
                .unwrap(),
        );

        run(&mut scene, &TickInput::default(), 30);

        let events = scene.drain_events();
        let pickups: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SimEvent::BonusCollected { .. }))
            .collect();
        assert_eq!(pickups.len(), 1);
        assert_eq!(
            pickups[0],
            &SimEvent::BonusCollected {
                car,
                bonus: peel,
                kind: BonusKind::Banana
            }
        );
        assert!(scene.get(car).unwrap().body.velocity.length() < 12.0);
        assert!(!scene.get(peel).unwrap().is_collidable());
    }

    #[test]
    fn test_barrier_moves_with_time() {
        let mut scene = new_scene(1);
        let gate = scene.insert(
            PhysicsObject::barrier(
                BarrierConfig {
                    movement_time: 1.0,
                    closed_wait_time: 2.0,
                    open_wait_time: 2.0,
                    movement_distance: 8.0,
                    direction: Vec2::Y,
                    auto_cycle: true,
                },
                Collider::aabb(1.0, 8.0).unwrap(),
                Vec2::new(30.0, 0.0),
            )
            .unwrap(),
        );

        run(&mut scene, &TickInput::default(), 300);
        let obj = scene.get(gate).unwrap();
        let ObjectKind::Barrier(barrier) = &obj.kind else {
            panic!("expected barrier");
        };
        assert_eq!(barrier.state(), BarrierState::Opening);
        assert!((obj.body.position.y - 4.0).abs() < 0.1);
        assert!((obj.body.velocity.y - 8.0).abs() < 0.1);
        assert!((obj.bounds().center() - obj.body.position).length() < 1e-4);

        let toggle = TickInput {
            toggle_barriers: vec![gate],
            ..Default::default()
        };
        tick(&mut scene, &toggle, SIM_DT).unwrap();
        let ObjectKind::Barrier(barrier) = &scene.get(gate).unwrap().kind else {
            panic!("expected barrier");
        };
        assert_eq!(barrier.state(), BarrierState::Closing);
    }

    #[test]
    fn test_idle_car_times_out_and_resets() {
        let mut scene = new_scene(1);
        let start = Vec2::new(-20.0, 0.0);
        let car = scene.insert(PhysicsObject::car(CarSpec::default(), start, 0.0).unwrap());
        scene.insert(
            PhysicsObject::checkpoint(0, true, Collider::aabb(1.0, 20.0).unwrap(), Vec2::ZERO, 0.0).unwrap(),
        );
        scene.register_car(car).unwrap();
        scene
            .start_race(RaceConfig {
                total_laps: 1,
                checkpoint_timeout: 5.0,
            })
            .unwrap();

        // Drift away without crossing anything
        scene.get_mut(car).unwrap().body.position = Vec2::new(-60.0, 0.0);
        run(&mut scene, &TickInput::default(), 720);

        let events = scene.drain_events();
        assert!(events.iter().all(|e| e.car() == Some(car)));
        let resets = events.iter().filter(|e| **e == SimEvent::CarReset { car }).count();
        assert_eq!(resets, 1);
        assert_eq!(scene.get(car).unwrap().body.position, start);
    }

    #[test]
    fn test_weather_feed_applies() {
        let mut scene = new_scene(1);
        let rain = SurfaceProperties { grip: 0.7, drag: 1.1 };
        let input = TickInput {
            weather: Some(rain),
            ..Default::default()
        };
        tick(&mut scene, &input, SIM_DT).unwrap();
        assert_eq!(scene.surfaces().weather(), rain);
        assert!((scene.surfaces().properties_at(Vec2::ZERO).grip - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_determinism() {
        // Two scenes with the same seed and inputs stay identical
        let build = || {
            let mut scene = new_scene(99999);
            let car = scene.insert(PhysicsObject::car(CarSpec::default(), Vec2::ZERO, 0.0).unwrap());
            scene.insert(
                PhysicsObject::bonus(BonusKind::Banana, Collider::aabb(1.0, 1.0).unwrap(), Vec2::new(6.0, 0.0), None)
                    .unwrap(),
            );
            scene.insert(PhysicsObject::wall(Vec2::new(25.0, -10.0), Vec2::new(25.0, 10.0)).unwrap());
            (scene, car)
        };
        let (mut scene1, car) = build();
        let (mut scene2, _) = build();

        let inputs = [
            full_throttle(car),
            TickInput {
                controls: BTreeMap::from([(
                    car,
                    CarControls {
                        throttle: 1.0,
                        steer: 0.3,
                        ..Default::default()
                    },
                )]),
                ..Default::default()
            },
        ];
        for input in inputs.iter().cycle().take(400) {
            tick(&mut scene1, input, SIM_DT).unwrap();
            tick(&mut scene2, input, SIM_DT).unwrap();
        }

        assert_eq!(scene1.time_ticks(), scene2.time_ticks());
        assert_eq!(scene1.objects(), scene2.objects());
        assert_eq!(scene1.drain_events(), scene2.drain_events());
    }

    #[test]
    fn test_removed_car_leaves_race_cleanly() {
        let mut scene = new_scene(1);
        let car = scene.insert(PhysicsObject::car(CarSpec::default(), Vec2::new(-10.0, 0.0), 0.0).unwrap());
        let other = scene.insert(PhysicsObject::car(CarSpec::default(), Vec2::new(-10.0, 8.0), 0.0).unwrap());
        scene.insert(
            PhysicsObject::checkpoint(0, true, Collider::aabb(1.0, 20.0).unwrap(), Vec2::ZERO, 0.0).unwrap(),
        );
        for id in [car, other] {
            scene.register_car(id).unwrap();
        }
        scene.start_race(RaceConfig::default()).unwrap();

        scene.remove(car).unwrap();
        run(&mut scene, &TickInput::default(), 10);
        assert_eq!(scene.leaderboard(), vec![other]);
        assert!(tick(&mut scene, &full_throttle(car), SIM_DT).is_err());
    }
}
