//! Signal Conditioner: debounce and smoothing for raw detection samples
//!
//! - Face presence: asymmetric debounce (confirm fast, drop slow)
//! - Eyes open: symmetric debounce
//! - Happiness score: single-pole EMA, sanitised before smoothing
//!
//! Knows nothing about game rules.

use tracing::{debug, warn};

use crate::config::GuardianConfig;
use crate::types::{ConditionedSignal, DetectionSample};

/// Run-length state for one debounced boolean
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceState {
    /// Currently confirmed value
    confirmed: bool,
    /// Consecutive raw `true` frames
    true_run: u32,
    /// Consecutive raw `false` frames
    false_run: u32,
    /// Raw `true` frames needed to confirm `true`
    on_frames: u32,
    /// Raw `false` frames needed to confirm `false`
    off_frames: u32,
}

impl DebounceState {
    pub fn new(initial: bool, on_frames: u32, off_frames: u32) -> Self {
        Self {
            confirmed: initial,
            true_run: 0,
            false_run: 0,
            on_frames: on_frames.max(1),
            off_frames: off_frames.max(1),
        }
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn reset(&mut self, initial: bool) {
        self.confirmed = initial;
        self.true_run = 0;
        self.false_run = 0;
    }
}

/// Feed one raw reading, return the confirmed value
pub fn debounce_boolean(raw: bool, state: &mut DebounceState) -> bool {
    if raw {
        state.true_run = state.true_run.saturating_add(1);
        state.false_run = 0;
        if !state.confirmed && state.true_run >= state.on_frames {
            state.confirmed = true;
        }
    } else {
        state.false_run = state.false_run.saturating_add(1);
        state.true_run = 0;
        if state.confirmed && state.false_run >= state.off_frames {
            state.confirmed = false;
        }
    }
    state.confirmed
}

/// Single-pole EMA step
pub fn smooth_score(raw: f64, previous: f64, alpha: f64) -> f64 {
    alpha * raw + (1.0 - alpha) * previous
}

/// Bring a raw score into [0, 1]; `None` for values that must not reach the EMA
pub fn sanitize_score(raw: f64) -> Option<f64> {
    if raw.is_finite() {
        Some(raw.clamp(0.0, 1.0))
    } else {
        None
    }
}

/// Stateful conditioner for one session
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    face: DebounceState,
    eyes: DebounceState,
    smoothed: f64,
    alpha: f64,
    neutral_threshold: f64,
}

impl SignalConditioner {
    pub fn new(config: &GuardianConfig) -> Self {
        Self {
            face: DebounceState::new(false, config.face_on_frames, config.face_off_frames),
            eyes: DebounceState::new(
                false,
                config.eyes_debounce_frames,
                config.eyes_debounce_frames,
            ),
            smoothed: 0.0,
            alpha: config.smoothing_alpha,
            neutral_threshold: config.neutral_threshold,
        }
    }

    /// Condition one raw sample
    ///
    /// `is_smirking` is left false; the hysteresis classifier fills it in.
    pub fn condition(&mut self, sample: &DetectionSample) -> ConditionedSignal {
        let face_detected = debounce_boolean(sample.face_detected, &mut self.face);
        let eyes_open = debounce_boolean(sample.eyes_open.is_open(), &mut self.eyes);

        match sanitize_score(sample.happiness_score) {
            Some(score) => {
                if score != sample.happiness_score {
                    debug!(raw = sample.happiness_score, clamped = score, "happiness score clamped");
                }
                self.smoothed = smooth_score(score, self.smoothed, self.alpha);
            }
            None => {
                warn!(raw = sample.happiness_score, "non-finite happiness score dropped");
            }
        }

        ConditionedSignal {
            face_detected,
            eyes_open,
            happiness_score: self.smoothed,
            is_smirking: false,
            neutral_expression: self.smoothed < self.neutral_threshold,
            face_centered: face_detected && sample.face_centered,
            timestamp_ms: sample.timestamp_ms,
        }
    }

    pub fn smoothed(&self) -> f64 {
        self.smoothed
    }

    /// Back to initial defaults
    pub fn reset(&mut self) {
        self.face.reset(false);
        self.eyes.reset(false);
        self.smoothed = 0.0;
    }
}

// =============================================================================
// TESTS
// =============================================================================
