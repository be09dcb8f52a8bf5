//! Race progression
//!
//! Per-car state lives in `CarProgress` and only changes here. A car advances
//! by entering the checkpoint that follows its last one; any other checkpoint
//! is ignored. The finish line is order 0: entering it after the last
//! checkpoint completes a lap and also counts as order 0 of the next one.
//! Lap 1 is timed from the race start, so a car's finish time is the sum of
//! its lap times.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::events::SimEvent;
use super::object::{Body, Checkpoint, ObjectId, ObjectKind, PhysicsObject, index_of};
use crate::error::ConfigError;

/// Race rules, as read from the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    pub total_laps: u32,
    /// Seconds without a checkpoint before the car is put back
    pub checkpoint_timeout: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            total_laps: 3,
            checkpoint_timeout: 15.0,
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_laps == 0 {
            return Err(ConfigError::NoLaps);
        }
        if !(self.checkpoint_timeout > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "checkpoint_timeout",
                value: self.checkpoint_timeout as f32,
            });
        }
        Ok(())
    }
}

/// Per-car race bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarProgress {
    /// Last checkpoint entered in order; -1 before the first crossing
    pub last_checkpoint_order: i32,
    /// Completed laps
    pub current_lap: u32,
    pub lap_start: f64,
    pub best_lap: Option<f64>,
    pub lap_times: Vec<f64>,
    pub last_checkpoint_time: f64,
    pub finished: bool,
    /// Seconds from race start to the final lap
    pub finish_time: Option<f64>,
    /// Pose restored on checkpoint timeout
    pub reset_pose: Body,
    /// Checkpoints the car overlapped on the previous update
    #[serde(skip)]
    inside: BTreeSet<ObjectId>,
}

impl CarProgress {
    fn new(pose: Body, now: f64) -> Self {
        Self {
            last_checkpoint_order: -1,
            current_lap: 0,
            lap_start: now,
            best_lap: None,
            lap_times: Vec::new(),
            last_checkpoint_time: now,
            finished: false,
            finish_time: None,
            reset_pose: Body {
                angular_velocity: 0.0,
                ..pose
            },
            inside: BTreeSet::new(),
        }
    }

    /// Scalar progress used for ranking (higher is further along)
    pub fn score(&self, checkpoint_count: usize) -> i64 {
        self.current_lap as i64 * checkpoint_count as i64 + self.last_checkpoint_order as i64
    }
}

#[derive(Debug, Clone, Copy)]
struct CheckpointEntry {
    id: ObjectId,
    order: u32,
    is_finish_line: bool,
}

#[derive(Debug, Default)]
pub struct RaceManager {
    config: Option<RaceConfig>,
    checkpoints: Vec<CheckpointEntry>,
    /// Checkpoint ids indexed by order, filled on start
    course: Vec<ObjectId>,
    cars: BTreeMap<ObjectId, CarProgress>,
    start_time: f64,
}

impl RaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_car(&mut self, id: ObjectId, pose: Body, now: f64) {
        self.cars.insert(id, CarProgress::new(pose, now));
    }

    pub fn register_checkpoint(&mut self, id: ObjectId, checkpoint: &Checkpoint) {
        self.checkpoints.push(CheckpointEntry {
            id,
            order: checkpoint.order,
            is_finish_line: checkpoint.is_finish_line,
        });
    }

    /// Forget a car or checkpoint; returns whether anything referenced `id`
    pub fn unregister(&mut self, id: ObjectId) -> bool {
        let car = self.cars.remove(&id).is_some();
        let before = self.checkpoints.len();
        self.checkpoints.retain(|c| c.id != id);
        let checkpoint = self.checkpoints.len() != before;
        car || checkpoint
    }

    /// `id` is part of the course of a running race
    pub fn is_course_checkpoint(&self, id: ObjectId) -> bool {
        self.is_started() && self.course.contains(&id)
    }

    pub fn is_registered(&self, id: ObjectId) -> bool {
        self.cars.contains_key(&id)
    }

    pub fn is_started(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&RaceConfig> {
        self.config.as_ref()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.course.len()
    }

    pub fn progress(&self, id: ObjectId) -> Option<&CarProgress> {
        self.cars.get(&id)
    }

    /// Validate the course and reset every car's progress
    pub fn start(&mut self, config: RaceConfig, now: f64) -> Result<(), ConfigError> {
        config.validate()?;
        self.course = build_course(&self.checkpoints)?;
        for progress in self.cars.values_mut() {
            *progress = CarProgress::new(progress.reset_pose, now);
        }
        self.config = Some(config);
        self.start_time = now;
        log::info!(
            "Race started: {} laps, {} checkpoints, {} cars",
            config.total_laps,
            self.course.len(),
            self.cars.len()
        );
        Ok(())
    }

    /// Every registered car has finished
    pub fn race_over(&self) -> bool {
        self.is_started() && !self.cars.is_empty() && self.cars.values().all(|p| p.finished)
    }

    /// Advance every car against the checkpoint colliders
    pub fn update(&mut self, now: f64, objects: &mut [PhysicsObject], events: &mut Vec<SimEvent>) {
        let Some(config) = self.config else {
            return;
        };
        let count = self.course.len();
        if count == 0 {
            return;
        }

        for (&car_id, progress) in self.cars.iter_mut() {
            if progress.finished {
                continue;
            }
            let Some(ci) = index_of(objects, car_id) else {
                continue;
            };

            let touching: BTreeSet<ObjectId> = self
                .course
                .iter()
                .copied()
                .filter(|&cp| {
                    index_of(objects, cp)
                        .is_some_and(|i| objects[ci].collider.intersect(&objects[i].collider).is_some())
                })
                .collect();

            let expected = next_order(progress.last_checkpoint_order, count);
            let target = self.course[expected as usize];
            let entered = touching.contains(&target) && !progress.inside.contains(&target);
            progress.inside = touching;
            if !entered {
                // Entering the expected checkpoint beats an expiring timeout
                if now - progress.last_checkpoint_time > config.checkpoint_timeout {
                    let car = &mut objects[ci];
                    car.body = progress.reset_pose;
                    car.update_collider();
                    progress.last_checkpoint_time = now;
                    log::info!("car {} timed out, reset to checkpoint {}", car_id, progress.last_checkpoint_order);
                    events.push(SimEvent::CarReset { car: car_id });
                }
                continue;
            }

            if expected == 0 && progress.last_checkpoint_order >= 0 {
                let lap_time = now - progress.lap_start;
                progress.lap_times.push(lap_time);
                let best = progress.best_lap.map_or(lap_time, |b| b.min(lap_time));
                progress.best_lap = Some(best);
                progress.current_lap += 1;
                progress.lap_start = now;
                events.push(SimEvent::LapCompleted {
                    car: car_id,
                    lap_time,
                    best_lap_time: best,
                });
                log::debug!("car {} lap {} in {:.3}s", car_id, progress.current_lap, lap_time);

                if progress.current_lap >= config.total_laps {
                    let finish_time = now - self.start_time;
                    progress.finished = true;
                    progress.finish_time = Some(finish_time);
                    events.push(SimEvent::RaceFinished {
                        car: car_id,
                        finish_time,
                    });
                    log::info!("car {} finished in {:.3}s", car_id, finish_time);
                }
            }

            progress.last_checkpoint_order = expected as i32;
            progress.last_checkpoint_time = now;
            progress.reset_pose = Body {
                angular_velocity: 0.0,
                ..objects[ci].body
            };

            let mut is_finish_line = false;
            if let Some(i) = index_of(objects, target) {
                if let ObjectKind::Checkpoint(cp) = &mut objects[i].kind {
                    cp.activated = true;
                    is_finish_line = cp.is_finish_line;
                }
            }
            events.push(SimEvent::CheckpointActivated {
                car: car_id,
                order: expected,
                is_finish_line,
            });
        }
    }

    /// Cars ordered from leader to last.
    ///
    /// Ties on progress go to the earlier finish, then to the earlier last
    /// checkpoint activation, then to the lower id.
    pub fn leaderboard(&self) -> Vec<ObjectId> {
        let count = self.course.len().max(1);
        let mut ranked: Vec<(&ObjectId, &CarProgress)> = self.cars.iter().collect();
        ranked.sort_by(|(ia, a), (ib, b)| {
            b.score(count)
                .cmp(&a.score(count))
                .then_with(|| {
                    let fa = a.finish_time.unwrap_or(f64::INFINITY);
                    let fb = b.finish_time.unwrap_or(f64::INFINITY);
                    fa.total_cmp(&fb)
                })
                .then_with(|| a.last_checkpoint_time.total_cmp(&b.last_checkpoint_time))
                .then_with(|| ia.cmp(ib))
        });
        ranked.into_iter().map(|(id, _)| *id).collect()
    }
}

/// Order the car must enter next
fn next_order(last: i32, count: usize) -> u32 {
    if last < 0 || last as usize + 1 >= count {
        0
    } else {
        last as u32 + 1
    }
}

/// Checkpoint ids indexed by order; orders must run 0..N-1 with the finish at 0
fn build_course(checkpoints: &[CheckpointEntry]) -> Result<Vec<ObjectId>, ConfigError> {
    let mut by_order: BTreeMap<u32, CheckpointEntry> = BTreeMap::new();
    for entry in checkpoints {
        if entry.is_finish_line && entry.order != 0 {
            return Err(ConfigError::FinishLineOrder(entry.order));
        }
        if by_order.insert(entry.order, *entry).is_some() {
            return Err(ConfigError::DuplicateCheckpoint(entry.order));
        }
    }
    match by_order.get(&0) {
        Some(entry) if entry.is_finish_line => {}
        _ => return Err(ConfigError::NoFinishLine),
    }
    by_order
        .into_iter()
        .enumerate()
        .map(|(expected, (order, entry))| {
            if order as usize != expected {
                Err(ConfigError::MissingCheckpoint(expected as u32))
            } else {
                Ok(entry.id)
            }
        })
        .collect()
}
