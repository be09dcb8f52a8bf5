//! Moving barrier (gate) state machine
//!
//! CLOSED -> OPENING -> OPEN -> CLOSING -> CLOSED, driven by elapsed time.
//! While moving, the barrier slides linearly between its closed position and
//! `closed + direction * movement_distance`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Current phase of a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarrierState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Barrier timing and travel, as read from the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// Seconds spent in OPENING and in CLOSING
    pub movement_time: f32,
    /// Seconds spent CLOSED before opening again
    pub closed_wait_time: f32,
    /// Seconds spent OPEN before closing again
    pub open_wait_time: f32,
    /// Travel from closed to open position
    pub movement_distance: f32,
    /// Direction of travel when opening (normalized on construction)
    pub direction: Vec2,
    /// Cycle automatically; when false the stable states hold until toggled
    #[serde(default = "default_auto_cycle")]
    pub auto_cycle: bool,
}

fn default_auto_cycle() -> bool {
    true
}

/// Barrier state plus its closed-position anchor
#[derive(Debug, Clone, PartialEq)]
pub struct MovingBarrier {
    config: BarrierConfig,
    closed_position: Vec2,
    state: BarrierState,
    /// Seconds spent in the current state
    elapsed: f32,
}

impl MovingBarrier {
    pub fn new(mut config: BarrierConfig, closed_position: Vec2) -> Result<Self, ConfigError> {
        if !(config.movement_time > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "movement_time",
                value: config.movement_time,
            });
        }
        if config.closed_wait_time < 0.0 || config.open_wait_time < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "wait time",
                value: config.closed_wait_time.min(config.open_wait_time),
            });
        }
        config.direction = config.direction.normalize_or_zero();
        if config.direction == Vec2::ZERO {
            return Err(ConfigError::NonPositive {
                field: "direction length",
                value: 0.0,
            });
        }
        Ok(Self {
            config,
            closed_position,
            state: BarrierState::Closed,
            elapsed: 0.0,
        })
    }

    pub fn state(&self) -> BarrierState {
        self.state
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    pub fn closed_position(&self) -> Vec2 {
        self.closed_position
    }

    pub fn open_position(&self) -> Vec2 {
        self.closed_position + self.config.direction * self.config.movement_distance
    }

    /// 0 = fully closed, 1 = fully open
    pub fn openness(&self) -> f32 {
        let t = (self.elapsed / self.config.movement_time).clamp(0.0, 1.0);
        match self.state {
            BarrierState::Closed => 0.0,
            BarrierState::Opening => t,
            BarrierState::Open => 1.0,
            BarrierState::Closing => 1.0 - t,
        }
    }

    /// Interpolated world position for the current state
    pub fn position(&self) -> Vec2 {
        self.closed_position.lerp(self.open_position(), self.openness())
    }

    /// Time limit of the current state, `None` when it holds indefinitely
    fn state_duration(&self) -> Option<f32> {
        match self.state {
            BarrierState::Opening | BarrierState::Closing => Some(self.config.movement_time),
            BarrierState::Closed if self.config.auto_cycle => Some(self.config.closed_wait_time),
            BarrierState::Open if self.config.auto_cycle => Some(self.config.open_wait_time),
            _ => None,
        }
    }

    fn next_state(&self) -> BarrierState {
        match self.state {
            BarrierState::Closed => BarrierState::Opening,
            BarrierState::Opening => BarrierState::Open,
            BarrierState::Open => BarrierState::Closing,
            BarrierState::Closing => BarrierState::Closed,
        }
    }

    /// Advance the timer, carrying leftover time into following states
    pub fn update(&mut self, dt: f32) {
        self.elapsed += dt;
        while let Some(duration) = self.state_duration() {
            if self.elapsed < duration {
                break;
            }
            self.elapsed -= duration;
            self.state = self.next_state();
            log::trace!("barrier -> {:?}", self.state);
        }
    }

    /// Request opening; no-op when already OPEN or OPENING
    pub fn open(&mut self) {
        match self.state {
            BarrierState::Closed => self.enter(BarrierState::Opening, 0.0),
            BarrierState::Closing => self.reverse(BarrierState::Opening),
            BarrierState::Open | BarrierState::Opening => {}
        }
    }

    /// Request closing; no-op when already CLOSED or CLOSING
    pub fn close(&mut self) {
        match self.state {
            BarrierState::Open => self.enter(BarrierState::Closing, 0.0),
            BarrierState::Opening => self.reverse(BarrierState::Closing),
            BarrierState::Closed | BarrierState::Closing => {}
        }
    }

    /// Open if closed-ish, close if open-ish
    pub fn toggle(&mut self) {
        match self.state {
            BarrierState::Closed | BarrierState::Closing => self.open(),
            BarrierState::Open | BarrierState::Opening => self.close(),
        }
    }

    fn enter(&mut self, state: BarrierState, elapsed: f32) {
        self.state = state;
        self.elapsed = elapsed;
    }

    /// Turn around mid-travel without jumping position
    fn reverse(&mut self, state: BarrierState) {
        let remaining = (self.config.movement_time - self.elapsed).max(0.0);
        self.enter(state, remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(auto_cycle: bool) -> MovingBarrier {
        MovingBarrier::new(
            BarrierConfig {
                movement_time: 1.0,
                closed_wait_time: 2.0,
                open_wait_time: 2.0,
                movement_distance: 10.0,
                direction: Vec2::new(0.0, 2.0),
                auto_cycle,
            },
            Vec2::new(5.0, 5.0),
        )
        .unwrap()
    }

    /// Step in 0.25 s increments (exact in binary) up to `t`
    fn advance_to(barrier: &mut MovingBarrier, now: &mut f32, t: f32) {
        while *now < t {
            barrier.update(0.25);
            *now += 0.25;
        }
    }

    #[test]
    fn test_full_cycle_timing() {
        let mut barrier = gate(true);
        let mut now = 0.0;

        advance_to(&mut barrier, &mut now, 1.75);
        assert_eq!(barrier.state(), BarrierState::Closed);
        advance_to(&mut barrier, &mut now, 2.0);
        assert_eq!(barrier.state(), BarrierState::Opening);

        advance_to(&mut barrier, &mut now, 2.5);
        assert!((barrier.position() - Vec2::new(5.0, 10.0)).length() < 1e-5);

        advance_to(&mut barrier, &mut now, 3.0);
        assert_eq!(barrier.state(), BarrierState::Open);
        assert_eq!(barrier.position(), Vec2::new(5.0, 15.0));

        advance_to(&mut barrier, &mut now, 4.75);
        assert_eq!(barrier.state(), BarrierState::Open);
        advance_to(&mut barrier, &mut now, 5.0);
        assert_eq!(barrier.state(), BarrierState::Closing);

        advance_to(&mut barrier, &mut now, 6.0);
        assert_eq!(barrier.state(), BarrierState::Closed);
        assert_eq!(barrier.position(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_large_step_carries_over() {
        let mut barrier = gate(true);
        barrier.update(3.5);
        assert_eq!(barrier.state(), BarrierState::Open);
    }

    #[test]
    fn test_open_is_noop_when_opening_or_open() {
        let mut barrier = gate(false);
        barrier.open();
        assert_eq!(barrier.state(), BarrierState::Opening);
        barrier.update(0.5);
        barrier.open();
        assert_eq!(barrier.state(), BarrierState::Opening);
        assert!((barrier.openness() - 0.5).abs() < 1e-6);

        barrier.update(0.5);
        assert_eq!(barrier.state(), BarrierState::Open);
        barrier.open();
        assert_eq!(barrier.state(), BarrierState::Open);
    }

    #[test]
    fn test_manual_barrier_holds_stable_states() {
        let mut barrier = gate(false);
        barrier.update(100.0);
        assert_eq!(barrier.state(), BarrierState::Closed);

        barrier.toggle();
        barrier.update(1.0);
        assert_eq!(barrier.state(), BarrierState::Open);
        barrier.update(100.0);
        assert_eq!(barrier.state(), BarrierState::Open);

        barrier.close();
        barrier.update(1.0);
        assert_eq!(barrier.state(), BarrierState::Closed);
    }

    #[test]
    fn test_reverse_mid_travel_keeps_position() {
        let mut barrier = gate(false);
        barrier.open();
        barrier.update(0.25);
        let before = barrier.position();
        barrier.close();
        assert_eq!(barrier.state(), BarrierState::Closing);
        assert!((barrier.position() - before).length() < 1e-5);
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = BarrierConfig {
            movement_time: 0.0,
            closed_wait_time: 1.0,
            open_wait_time: 1.0,
            movement_distance: 1.0,
            direction: Vec2::X,
            auto_cycle: true,
        };
        assert!(MovingBarrier::new(config.clone(), Vec2::ZERO).is_err());
        let config = BarrierConfig {
            movement_time: 1.0,
            direction: Vec2::ZERO,
            ..config
        };
        assert!(MovingBarrier::new(config, Vec2::ZERO).is_err());
    }
}
