//! Checkpoint Scheduler: one-shot bonuses at survival milestones
//!
//! Watches the elapsed survival time and fires each checkpoint the first time
//! its threshold is crossed. Independent of the frame pipeline.

use tracing::{debug, info};

use crate::types::{Checkpoint, CheckpointReached};

#[derive(Debug, Clone)]
pub struct CheckpointScheduler {
    /// Ordered by threshold
    checkpoints: Vec<Checkpoint>,
    /// Parallel to `checkpoints`
    hit: Vec<bool>,
    accumulated_bonus: u32,
}

impl Default for CheckpointScheduler {
    fn default() -> Self {
        Self::new(Checkpoint::default_schedule())
    }
}

impl CheckpointScheduler {
    pub fn new(mut checkpoints: Vec<Checkpoint>) -> Self {
        checkpoints.retain(|c| c.threshold_secs.is_finite());
        checkpoints.sort_by(|a, b| a.threshold_secs.total_cmp(&b.threshold_secs));
        let hit = vec![false; checkpoints.len()];
        Self {
            checkpoints,
            hit,
            accumulated_bonus: 0,
        }
    }

    /// Fire every not-yet-hit checkpoint at or below `elapsed_secs`
    pub fn update(&mut self, elapsed_secs: f64) -> Vec<CheckpointReached> {
        if !elapsed_secs.is_finite() {
            debug!("non-finite elapsed time ignored");
            return Vec::new();
        }
        let mut reached = Vec::new();
        for (checkpoint, hit) in self.checkpoints.iter().zip(self.hit.iter_mut()) {
            if *hit || checkpoint.threshold_secs > elapsed_secs {
                continue;
            }
            *hit = true;
            self.accumulated_bonus += checkpoint.bonus_points;
            info!(
                threshold_secs = checkpoint.threshold_secs,
                bonus = checkpoint.bonus_points,
                total = self.accumulated_bonus,
                "checkpoint reached"
            );
            reached.push(CheckpointReached {
                threshold_secs: checkpoint.threshold_secs,
                bonus_points: checkpoint.bonus_points,
                cumulative_bonus: self.accumulated_bonus,
            });
        }
        reached
    }

    pub fn accumulated_bonus(&self) -> u32 {
        self.accumulated_bonus
    }

    /// Thresholds that have fired this session
    pub fn hit_thresholds(&self) -> Vec<f64> {
        self.checkpoints
            .iter()
            .zip(&self.hit)
            .filter(|(_, hit)| **hit)
            .map(|(c, _)| c.threshold_secs)
            .collect()
    }

    /// Next checkpoint still to come
    pub fn next_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints
            .iter()
            .zip(&self.hit)
            .find(|(_, hit)| !**hit)
            .map(|(c, _)| c)
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn reset(&mut self) {
        self.hit.iter_mut().for_each(|h| *h = false);
        self.accumulated_bonus = 0;
    }
}

/// Survival time derived from sample timestamps
///
/// Starts when play begins, freezes when stopped (fail), cleared on reset.
#[derive(Debug, Clone, Default)]
pub struct SurvivalClock {
    started_at_ms: Option<f64>,
    latest_ms: f64,
    stopped: bool,
}

impl SurvivalClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, at_ms: f64) {
        self.started_at_ms = Some(at_ms);
        self.latest_ms = at_ms;
        self.stopped = false;
    }

    /// Advance to `now_ms`, return elapsed seconds. No-op once stopped.
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        if self.started_at_ms.is_some() && !self.stopped && now_ms.is_finite() {
            self.latest_ms = self.latest_ms.max(now_ms);
        }
        self.elapsed_secs()
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn elapsed_secs(&self) -> f64 {
        match self.started_at_ms {
            Some(start) => ((self.latest_ms - start) / 1000.0).max(0.0),
            None => 0.0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some() && !self.stopped
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nothing_fires_before_first_threshold() {
        let mut scheduler = CheckpointScheduler::default();
        for s in 0..300 {
            assert!(scheduler.update(s as f64).is_empty());
        }
        assert_eq!(scheduler.accumulated_bonus(), 0);
    }

    #[test]
    fn test_schedule_fires_once_each() {
        let mut scheduler = CheckpointScheduler::default();
        let mut fired = Vec::new();
        for s in 0..=900 {
            fired.extend(scheduler.update(s as f64));
        }
        assert_eq!(
            fired,
            vec![
                CheckpointReached {
                    threshold_secs: 300.0,
                    bonus_points: 1000,
                    cumulative_bonus: 1000
                },
                CheckpointReached {
                    threshold_secs: 900.0,
                    bonus_points: 2000,
                    cumulative_bonus: 3000
                },
            ]
        );
        assert_eq!(scheduler.hit_thresholds(), vec![300.0, 900.0]);
    }

    #[test]
    fn test_repeated_ticks_are_idempotent() {
        let mut scheduler = CheckpointScheduler::default();
        assert_eq!(scheduler.update(300.0).len(), 1);
        for _ in 0..5 {
            assert!(scheduler.update(300.0).is_empty());
            assert!(scheduler.update(299.0).is_empty());
        }
        assert_eq!(scheduler.accumulated_bonus(), 1000);
    }

    #[test]
    fn test_jump_fires_all_crossed_in_order() {
        let mut scheduler = CheckpointScheduler::default();
        let fired = scheduler.update(5000.0);
        let thresholds: Vec<f64> = fired.iter().map(|r| r.threshold_secs).collect();
        assert_eq!(thresholds, vec![300.0, 900.0, 2100.0, 4500.0]);
        assert_eq!(scheduler.accumulated_bonus(), 10_000);
        assert_eq!(scheduler.next_checkpoint().map(|c| c.bonus_points), Some(5000));
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut scheduler = CheckpointScheduler::default();
        scheduler.update(1000.0);
        scheduler.reset();
        assert_eq!(scheduler.accumulated_bonus(), 0);
        assert!(scheduler.hit_thresholds().is_empty());
        assert_eq!(scheduler.update(300.0).len(), 1);
    }

    #[test]
    fn test_unsorted_schedule_is_ordered() {
        let mut scheduler = CheckpointScheduler::new(vec![
            Checkpoint::new(20.0, 2),
            Checkpoint::new(10.0, 1),
            Checkpoint::new(f64::NAN, 99),
        ]);
        assert_eq!(scheduler.checkpoints().len(), 2);
        let fired = scheduler.update(25.0);
        assert_eq!(fired[0].threshold_secs, 10.0);
        assert_eq!(fired[1].cumulative_bonus, 3);
        assert!(scheduler.update(f64::NAN).is_empty());
    }

    #[test]
    fn test_survival_clock_freezes_on_stop() {
        let mut clock = SurvivalClock::new();
        assert_eq!(clock.tick(5000.0), 0.0);
        clock.start(1000.0);
        assert_eq!(clock.tick(4000.0), 3.0);
        clock.stop();
        assert_eq!(clock.tick(9000.0), 3.0);
        assert!(!clock.is_running());
        clock.reset();
        assert_eq!(clock.elapsed_secs(), 0.0);
    }
}
