//! Hysteresis Classifier: smoothed score → is-smirking
//!
//! Not smirking → smirking: score >= enter threshold
//! Smirking → not smirking: score < exit threshold (exit <= enter)

use tracing::debug;

#[derive(Debug, Clone)]
pub struct HysteresisClassifier {
    enter_threshold: f64,
    exit_threshold: f64,
    currently_smirking: bool,
}

impl HysteresisClassifier {
    /// Thresholds are reordered if given inverted, so enter >= exit always holds
    pub fn new(enter_threshold: f64, exit_threshold: f64) -> Self {
        Self {
            enter_threshold: enter_threshold.max(exit_threshold),
            exit_threshold: exit_threshold.min(enter_threshold),
            currently_smirking: false,
        }
    }

    /// Classify one smoothed score
    pub fn classify(&mut self, smoothed_score: f64) -> bool {
        let next = if self.currently_smirking {
            smoothed_score >= self.exit_threshold
        } else {
            smoothed_score >= self.enter_threshold
        };
        if next != self.currently_smirking {
            debug!(score = smoothed_score, smirking = next, "smirk decision flipped");
        }
        self.currently_smirking = next;
        next
    }

    /// Threshold the next sample is compared against
    pub fn effective_threshold(&self) -> f64 {
        if self.currently_smirking {
            self.exit_threshold
        } else {
            self.enter_threshold
        }
    }

    pub fn is_smirking(&self) -> bool {
        self.currently_smirking
    }

    pub fn reset(&mut self) {
        self.currently_smirking = false;
    }
}
