//! Calibration Sequencer: confirm a neutral baseline before play
//!
//! State transitions:
//! - IDLE → RUNNING: start()
//! - RUNNING → COMPLETE: neutral for > min frames AND >= stability duration
//! - RUNNING → FAILED: cancel()
//!
//! Up to `grace_frames` consecutive bad frames are absorbed without losing
//! progress; one more resets the stable run.

use tracing::{debug, info};

use crate::config::GuardianConfig;
use crate::types::{CalibrationStatus, ConditionedSignal};

/// Result of feeding one frame to a running calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationUpdate {
    Progress(f64),
    Complete,
}

#[derive(Debug, Clone)]
pub struct CalibrationSequencer {
    status: CalibrationStatus,
    /// Timestamp of the first frame after start()
    started_at: Option<f64>,
    /// Timestamp of the first frame of the current stable run
    stable_since: Option<f64>,
    stable_frames: u32,
    grace_counter: u32,
    progress: f64,
    stability_ms: f64,
    min_frames: u32,
    grace_frames: u32,
    neutral_threshold: f64,
}

impl CalibrationSequencer {
    pub fn new(config: &GuardianConfig) -> Self {
        Self {
            status: CalibrationStatus::Idle,
            started_at: None,
            stable_since: None,
            stable_frames: 0,
            grace_counter: 0,
            progress: 0.0,
            stability_ms: config.calibration_stability_ms,
            min_frames: config.calibration_min_frames,
            grace_frames: config.calibration_grace_frames,
            neutral_threshold: config.neutral_threshold,
        }
    }

    /// Begin a fresh run, discarding any previous one
    pub fn start(&mut self) {
        self.clear_run();
        self.status = CalibrationStatus::Running;
        info!("calibration started");
    }

    /// Abort a running calibration. Returns true if a run was cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.status != CalibrationStatus::Running {
            return false;
        }
        self.clear_run();
        self.status = CalibrationStatus::Failed;
        info!("calibration cancelled");
        true
    }

    /// Feed one conditioned frame. `None` unless a run is active.
    pub fn update(&mut self, signal: &ConditionedSignal) -> Option<CalibrationUpdate> {
        if self.status != CalibrationStatus::Running {
            return None;
        }
        let now = signal.timestamp_ms;
        self.started_at.get_or_insert(now);

        let conditions_met = signal.face_detected
            && signal.eyes_open
            && signal.neutral_expression
            && signal.happiness_score < self.neutral_threshold;

        if conditions_met {
            self.grace_counter = 0;
            self.stable_frames += 1;
            let since = *self.stable_since.get_or_insert(now);
            let elapsed = (now - since).max(0.0);
            self.progress = (elapsed / self.stability_ms * 100.0).min(100.0);

            if self.stable_frames > self.min_frames && elapsed >= self.stability_ms {
                self.status = CalibrationStatus::Complete;
                self.progress = 100.0;
                info!(
                    stable_frames = self.stable_frames,
                    elapsed_ms = elapsed,
                    "calibration complete"
                );
                return Some(CalibrationUpdate::Complete);
            }
        } else {
            self.grace_counter += 1;
            if self.grace_counter > self.grace_frames {
                if self.stable_frames > 0 {
                    debug!(
                        stable_frames = self.stable_frames,
                        "calibration stability reset"
                    );
                }
                self.stable_frames = 0;
                self.stable_since = None;
                self.progress = 0.0;
            }
        }

        Some(CalibrationUpdate::Progress(self.progress))
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    pub fn is_ready(&self) -> bool {
        self.status == CalibrationStatus::Complete
    }

    /// Milliseconds since the run saw its first frame
    pub fn elapsed_ms(&self, now: f64) -> f64 {
        self.started_at.map(|s| (now - s).max(0.0)).unwrap_or(0.0)
    }

    /// Back to IDLE
    pub fn reset(&mut self) {
        self.clear_run();
        self.status = CalibrationStatus::Idle;
    }

    fn clear_run(&mut self) {
        self.started_at = None;
        self.stable_since = None;
        self.stable_frames = 0;
        self.grace_counter = 0;
        self.progress = 0.0;
    }
}

// =============================================================================
// TESTS
// =============================================================================
