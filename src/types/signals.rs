//! Per-frame detection samples and their conditioned form

use serde::{Deserialize, Serialize};

use crate::error::SampleError;
use crate::EYE_OPENNESS_THRESHOLD;

/// Eye state as reported by the vision collaborator
///
/// Some detectors give a flag, others per-eye openness (eye aspect ratio).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EyesOpen {
    Flag(bool),
    Openness { left: f64, right: f64 },
}

impl EyesOpen {
    /// Collapse to a raw open/closed reading
    ///
    /// Openness counts as open when the mean of both eyes reaches
    /// [`EYE_OPENNESS_THRESHOLD`]. Non-finite values read as closed.
    pub fn is_open(&self) -> bool {
        match *self {
            EyesOpen::Flag(open) => open,
            EyesOpen::Openness { left, right } => {
                if !left.is_finite() || !right.is_finite() {
                    return false;
                }
                (left + right) / 2.0 >= EYE_OPENNESS_THRESHOLD
            }
        }
    }
}

impl Default for EyesOpen {
    fn default() -> Self {
        EyesOpen::Flag(true)
    }
}

impl From<bool> for EyesOpen {
    fn from(open: bool) -> Self {
        EyesOpen::Flag(open)
    }
}

/// Raw sample for one processed video frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSample {
    pub face_detected: bool,
    #[serde(default)]
    pub eyes_open: EyesOpen,
    /// Happiness/smirk probability, expected in [0, 1]
    pub happiness_score: f64,
    #[serde(default)]
    pub face_centered: bool,
    /// Client clock in milliseconds
    #[serde(rename = "timestamp")]
    pub timestamp_ms: f64,
}

impl DetectionSample {
    /// Sample with a visible, centered face and open eyes
    pub fn new(happiness_score: f64, timestamp_ms: f64) -> Self {
        Self {
            face_detected: true,
            eyes_open: EyesOpen::Flag(true),
            happiness_score,
            face_centered: true,
            timestamp_ms,
        }
    }

    /// Sample for a frame with no face in view
    pub fn no_face(timestamp_ms: f64) -> Self {
        Self {
            face_detected: false,
            eyes_open: EyesOpen::Flag(false),
            happiness_score: 0.0,
            face_centered: false,
            timestamp_ms,
        }
    }

    pub fn with_eyes(mut self, eyes_open: impl Into<EyesOpen>) -> Self {
        self.eyes_open = eyes_open.into();
        self
    }

    /// Strict check used at the API boundary.
    ///
    /// The conditioner tolerates all of these (it clamps or drops), so this
    /// is only for surfaces that would rather reject bad input outright.
    pub fn validate(&self) -> Result<(), SampleError> {
        if !self.happiness_score.is_finite() {
            return Err(SampleError::NonFiniteScore);
        }
        if !(0.0..=1.0).contains(&self.happiness_score) {
            return Err(SampleError::ScoreOutOfRange(self.happiness_score));
        }
        if !self.timestamp_ms.is_finite() {
            return Err(SampleError::NonFiniteTimestamp);
        }
        if let EyesOpen::Openness { left, right } = self.eyes_open {
            if !left.is_finite() || !right.is_finite() || left < 0.0 || right < 0.0 {
                return Err(SampleError::InvalidEyeOpenness { left, right });
            }
        }
        Ok(())
    }
}

/// Conditioned pipeline state after one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionedSignal {
    /// Debounced face presence
    pub face_detected: bool,
    /// Debounced eyes open
    pub eyes_open: bool,
    /// EMA-smoothed happiness score
    pub happiness_score: f64,
    /// Hysteresis decision
    pub is_smirking: bool,
    /// Smoothed score below the neutral threshold
    pub neutral_expression: bool,
    /// Debounced face AND raw centered flag
    pub face_centered: bool,
    pub timestamp_ms: f64,
}

impl Default for ConditionedSignal {
    fn default() -> Self {
        Self {
            face_detected: false,
            eyes_open: false,
            happiness_score: 0.0,
            is_smirking: false,
            neutral_expression: true,
            face_centered: false,
            timestamp_ms: 0.0,
        }
    }
}
