//! Events and per-frame output of the guardian

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::types::{ConditionedSignal, GameOverReason, GameState};

/// Metadata attached to every smirk decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmirkMeta {
    pub consecutive_frames: u32,
    pub required_frames: u32,
    pub in_warning_zone: bool,
    /// Threshold the classifier compared against this frame
    pub effective_threshold: f64,
}

/// Everything the guardian tells the surrounding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GuardianEvent {
    CalibrationProgress {
        progress: f64,
    },
    CalibrationComplete,
    CalibrationFailed,
    SmirkDetected {
        is_smirking: bool,
        probability: f64,
        meta: SmirkMeta,
    },
    /// Smirk streak below the game-over count
    WarningZone {
        consecutive_frames: u32,
    },
    FaceNotDetected {
        frames: u32,
    },
    EyesClosed,
    GameOver {
        reason: GameOverReason,
    },
}

/// Output of one processed frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameOutput {
    pub timestamp: DateTime<Utc>,
    pub state: GameState,
    pub signal: ConditionedSignal,
    pub consecutive_smirk_frames: u32,
    /// Streak length that ends the game under the engine's config
    pub required_smirk_frames: u32,
    pub warning_zone_frames: u32,
    pub calibration_progress: f64,
    pub game_over_reason: Option<GameOverReason>,
    pub events: Vec<GuardianEvent>,
}

impl FrameOutput {
    /// Game-over event emitted on this frame, if any
    pub fn game_over(&self) -> Option<GameOverReason> {
        self.events.iter().find_map(|event| match event {
            GuardianEvent::GameOver { reason } => Some(*reason),
            _ => None,
        })
    }

    /// Smirk decision emitted on this frame, if any
    pub fn smirk_report(&self) -> Option<(bool, f64)> {
        self.events.iter().find_map(|event| match event {
            GuardianEvent::SmirkDetected {
                is_smirking,
                probability,
                ..
            } => Some((*is_smirking, *probability)),
            _ => None,
        })
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let line = format!(
            "{} score={:.3} | state={} | smirk={}/{} | calib={:.0}%",
            self.state.emoji(),
            self.signal.happiness_score,
            self.state,
            self.consecutive_smirk_frames,
            self.required_smirk_frames,
            self.calibration_progress,
        );
        line.color(self.state.color()).to_string()
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "score={:.3} | state={} | face={} | eyes={} | smirking={} | streak={} | calib={:.0}",
            self.signal.happiness_score,
            self.state,
            self.signal.face_detected,
            self.signal.eyes_open,
            self.signal.is_smirking,
            self.consecutive_smirk_frames,
            self.calibration_progress,
        )
    }
}
