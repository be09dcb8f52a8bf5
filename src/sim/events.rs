//! Events produced by a tick
//!
//! Accumulated in the scene and drained by rendering/audio/UI collaborators.
//! Nothing in the simulation reads them back.

use serde::{Deserialize, Serialize};

use super::collision::Contact;
use super::object::{BonusKind, ObjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    CheckpointActivated {
        car: ObjectId,
        order: u32,
        is_finish_line: bool,
    },
    LapCompleted {
        car: ObjectId,
        /// Seconds
        lap_time: f64,
        best_lap_time: f64,
    },
    RaceFinished {
        car: ObjectId,
        /// Seconds since the race started
        finish_time: f64,
    },
    Collision {
        a: ObjectId,
        b: ObjectId,
        contact: Contact,
    },
    /// Checkpoint timeout put the car back at its last validated checkpoint
    CarReset { car: ObjectId },
    BonusCollected {
        car: ObjectId,
        bonus: ObjectId,
        kind: BonusKind,
    },
}

impl SimEvent {
    /// Car the event concerns, if any
    pub fn car(&self) -> Option<ObjectId> {
        match self {
            SimEvent::CheckpointActivated { car, .. }
            | SimEvent::LapCompleted { car, .. }
            | SimEvent::RaceFinished { car, .. }
            | SimEvent::CarReset { car }
            | SimEvent::BonusCollected { car, .. } => Some(*car),
            SimEvent::Collision { .. } => None,
        }
    }
}
