//! Apex Rally headless demo
//!
//! Builds a small oval with two AI cars and runs the fixed-step loop until
//! the race is over, then prints the standings. An optional first argument
//! is a JSON settings file.

use std::collections::BTreeMap;
use std::error::Error;
use std::f32::consts::PI;

use glam::Vec2;

use apex_rally::consts::*;
use apex_rally::normalize_angle;
use apex_rally::sim::{
    BarrierConfig, BonusKind, BoundingBox, CarControls, CarSpec, Collider, ObjectId, PhysicsObject,
    RaceConfig, RayQuery, Scene, SimEvent, SurfaceOverlapPolicy, SurfaceProperties,
    SurfaceSegmentConfig, SurfaceType, TickInput, TrackDescriptor, WeatherZone, tick,
};
use apex_rally::SimSettings;

/// Simulated render frame length (60 Hz display)
const FRAME_DT: f32 = 1.0 / 60.0;
/// Give up after this much simulated time
const TIME_LIMIT: f64 = 600.0;
/// Track waypoints, counter-clockwise; the first is the finish line
const WAYPOINTS: [Vec2; 4] = [
    Vec2::new(0.0, -40.0),
    Vec2::new(60.0, 0.0),
    Vec2::new(0.0, 40.0),
    Vec2::new(-60.0, 0.0),
];

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => SimSettings::from_json(&std::fs::read_to_string(path)?)?,
        None => SimSettings::default(),
    };

    let mut scene = build_scene(settings)?;
    let cars: Vec<ObjectId> = scene
        .objects()
        .iter()
        .filter(|o| o.is_car())
        .map(|o| o.id)
        .collect();
    for &car in &cars {
        scene.register_car(car)?;
    }
    scene.start_race(RaceConfig {
        total_laps: 3,
        checkpoint_timeout: 20.0,
    })?;
    log::info!(
        "Apex Rally demo starting on {} with {} cars",
        scene.track().name,
        cars.len()
    );

    // Fixed-step accumulator, as a frame-driven game loop would run it
    let mut accumulator = 0.0_f32;
    while !scene.race_over() && scene.time() < TIME_LIMIT {
        accumulator += FRAME_DT;
        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let input = drive(&scene, &cars);
            tick(&mut scene, &input, SIM_DT)?;
            accumulator -= SIM_DT;
            substeps += 1;
        }
        for event in scene.drain_events() {
            report(&event);
        }
    }

    println!("\nFinal standings after {:.1}s:", scene.time());
    for (place, id) in scene.leaderboard().into_iter().enumerate() {
        let progress = scene.progress(id)?;
        let best = progress
            .best_lap
            .map_or_else(|| "-".to_string(), |t| format!("{t:.2}s"));
        let finish = progress
            .finish_time
            .map_or_else(|| "DNF".to_string(), |t| format!("{t:.2}s"));
        println!(
            "  {}. car {}  laps {}  best {}  total {}",
            place + 1,
            id,
            progress.current_lap,
            best,
            finish
        );
    }
    Ok(())
}

fn build_scene(settings: SimSettings) -> Result<Scene, Box<dyn Error>> {
    let surfaces = (0..WAYPOINTS.len())
        .map(|i| SurfaceSegmentConfig {
            start: WAYPOINTS[i],
            end: WAYPOINTS[(i + 1) % WAYPOINTS.len()],
            width: 18.0,
            surface: if i == 2 {
                SurfaceType::Dirt
            } else {
                SurfaceType::Asphalt
            },
        })
        // Icy patch on the back straight overrides the asphalt under it
        .chain(std::iter::once(SurfaceSegmentConfig {
            start: Vec2::new(-20.0, 30.0),
            end: Vec2::new(-30.0, 25.0),
            width: 10.0,
            surface: SurfaceType::Ice,
        }))
        .collect();

    let track = TrackDescriptor {
        name: "Demo Oval".into(),
        surfaces,
        surface_policy: SurfaceOverlapPolicy::LastWins,
        weather_zones: vec![WeatherZone {
            center: Vec2::new(40.0, -14.0),
            radius: 5.0,
            modifier: SurfaceProperties {
                grip: 0.6,
                drag: 1.3,
            },
        }],
    };
    let bounds = BoundingBox::from_corners(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0));
    let mut scene = Scene::new(bounds, track, settings)?;

    for (order, point) in WAYPOINTS.iter().enumerate() {
        scene.insert(PhysicsObject::checkpoint(
            order as u32,
            order == 0,
            Collider::aabb(8.0, 18.0)?,
            *point,
            0.0,
        )?);
    }

    // Outer boundary
    let corners = [
        Vec2::new(-80.0, -60.0),
        Vec2::new(80.0, -60.0),
        Vec2::new(80.0, 60.0),
        Vec2::new(-80.0, 60.0),
    ];
    for i in 0..corners.len() {
        scene.insert(PhysicsObject::wall(corners[i], corners[(i + 1) % corners.len()])?);
    }

    scene.insert(PhysicsObject::barrier(
        BarrierConfig {
            movement_time: 1.5,
            closed_wait_time: 4.0,
            open_wait_time: 4.0,
            movement_distance: 10.0,
            direction: Vec2::Y,
            auto_cycle: true,
        },
        Collider::aabb(1.0, 6.0)?,
        Vec2::new(0.0, 52.0),
    )?);

    let pickup = Collider::aabb(1.0, 1.0)?;
    scene.insert(PhysicsObject::bonus(
        BonusKind::Nitro { amount: 40.0 },
        pickup.clone(),
        Vec2::new(30.0, -20.0),
        Some(8.0),
    )?);
    scene.insert(PhysicsObject::bonus(
        BonusKind::Banana,
        pickup.clone(),
        Vec2::new(-30.0, -22.0),
        Some(12.0),
    )?);
    scene.insert(PhysicsObject::bonus(
        BonusKind::Puddle {
            modifier: SurfaceProperties {
                grip: 0.5,
                drag: 1.5,
            },
            duration: 2.0,
        },
        pickup,
        Vec2::new(30.0, 20.0),
        Some(6.0),
    )?);

    // Grid behind the line
    let spec = CarSpec::default();
    for offset in [-3.0, 3.0] {
        let heading = (WAYPOINTS[1] - WAYPOINTS[0]).to_angle();
        scene.insert(PhysicsObject::car(
            spec.clone(),
            WAYPOINTS[0] + Vec2::new(-12.0, offset),
            heading,
        )?);
    }
    Ok(scene)
}

/// Chase the next checkpoint, swerving around anything a probe sees
fn drive(scene: &Scene, cars: &[ObjectId]) -> TickInput {
    let mut controls = BTreeMap::new();
    for &id in cars {
        let (Ok(obj), Ok(progress)) = (scene.get(id), scene.progress(id)) else {
            continue;
        };
        if progress.finished {
            controls.insert(id, CarControls { brake: 1.0, ..Default::default() });
            continue;
        }
        let next = (progress.last_checkpoint_order + 1) as usize % WAYPOINTS.len();
        let to_target = WAYPOINTS[next] - obj.body.position;
        let mut error = normalize_angle(to_target.to_angle() - obj.body.rotation);

        let ahead = Vec2::from_angle(obj.body.rotation);
        if let Some(hit) = scene.raycast(&RayQuery::navigation(obj, ahead, 10.0)) {
            // Steer away from whatever is in the way
            let side = (hit.point - obj.body.position).perp_dot(ahead).signum();
            error += side * PI / 8.0;
        }

        let speed = obj.body.velocity.length();
        let sharp = error.abs() > PI / 4.0;
        controls.insert(
            id,
            CarControls {
                throttle: if sharp { 0.4 } else { 1.0 },
                brake: if sharp && speed > 12.0 { 0.5 } else { 0.0 },
                steer: (error * 2.0).clamp(-MAX_STEER, MAX_STEER),
                nitro: !sharp && speed > 15.0,
            },
        );
    }
    TickInput {
        controls,
        ..Default::default()
    }
}

fn report(event: &SimEvent) {
    match event {
        SimEvent::LapCompleted {
            car,
            lap_time,
            best_lap_time,
        } => log::info!("car {car}: lap {lap_time:.2}s (best {best_lap_time:.2}s)"),
        SimEvent::RaceFinished { car, finish_time } => {
            log::info!("car {car} finished in {finish_time:.2}s")
        }
        SimEvent::CarReset { car } => log::warn!("car {car} reset to its last checkpoint"),
        SimEvent::BonusCollected { car, kind, .. } => log::info!("car {car} picked up {kind:?}"),
        SimEvent::Collision { a, b, contact } => {
            log::debug!("collision {a} <-> {b} mtv {:?}", contact.mtv())
        }
        SimEvent::CheckpointActivated { car, order, .. } => {
            log::debug!("car {car} checkpoint {order}")
        }
    }
}
