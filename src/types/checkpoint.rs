//! Survival checkpoints and the bonus events they produce

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CHECKPOINTS;

/// A survival milestone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub threshold_secs: f64,
    pub bonus_points: u32,
}

impl Checkpoint {
    pub fn new(threshold_secs: f64, bonus_points: u32) -> Self {
        Self {
            threshold_secs,
            bonus_points,
        }
    }

    /// Production schedule, ordered by threshold
    pub fn default_schedule() -> Vec<Checkpoint> {
        DEFAULT_CHECKPOINTS
            .iter()
            .map(|&(threshold_secs, bonus_points)| Checkpoint::new(threshold_secs, bonus_points))
            .collect()
    }
}

/// One-shot notification for a crossed checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointReached {
    pub threshold_secs: f64,
    pub bonus_points: u32,
    /// Bonus accumulated this session, including this checkpoint
    pub cumulative_bonus: u32,
}
