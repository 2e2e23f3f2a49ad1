//! State definitions for the guardian, calibration and escalation machines

use colored::Color;
use serde::{Deserialize, Serialize};

/// The four states of a guardian session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Pre-game, conditioned values pass through for UI only
    Idle,
    /// Confirming a neutral baseline
    Calibrating,
    /// Rules evaluated every frame
    Playing,
    /// Terminal until restart
    GameOver,
}

impl GameState {
    /// Terminal color for CLI display
    pub fn color(&self) -> Color {
        match self {
            GameState::Idle => Color::BrightBlack,
            GameState::Calibrating => Color::Cyan,
            GameState::Playing => Color::Green,
            GameState::GameOver => Color::Red,
        }
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            GameState::Idle => "⏳",
            GameState::Calibrating => "🎯",
            GameState::Playing => "😐",
            GameState::GameOver => "💀",
        }
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GameState::Idle => "IDLE",
            GameState::Calibrating => "CALIBRATING",
            GameState::Playing => "PLAYING",
            GameState::GameOver => "GAME_OVER",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle of a single calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationStatus {
    Idle,
    Running,
    Complete,
    Failed,
}

/// Session-level escalation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationPhase {
    Normal,
    /// Probability in the soft zone, warning timer running
    Warning,
    /// Irrevocable until the session is resumed
    Fail,
}

impl EscalationPhase {
    pub fn color(&self) -> Color {
        match self {
            EscalationPhase::Normal => Color::Green,
            EscalationPhase::Warning => Color::Yellow,
            EscalationPhase::Fail => Color::Red,
        }
    }
}

impl std::fmt::Display for EscalationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EscalationPhase::Normal => "NORMAL",
            EscalationPhase::Warning => "WARNING",
            EscalationPhase::Fail => "FAIL",
        };
        write!(f, "{}", name)
    }
}
