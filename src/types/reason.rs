//! Reasons a game ends

use serde::{Deserialize, Serialize};

/// Why the guardian entered GAME_OVER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    /// Smirk held for the required number of frames
    SmirkDetected,
    /// Face missing past the timeout (covering the camera)
    FaceNotDetected,
    /// Player or host ended the game explicitly
    UserRequested,
}

impl GameOverReason {
    /// Get the code string (for logging and wire output)
    pub fn code(&self) -> &'static str {
        match self {
            Self::SmirkDetected => "smirk_detected",
            Self::FaceNotDetected => "face_not_detected",
            Self::UserRequested => "user_requested",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::SmirkDetected => "You smirked!",
            Self::FaceNotDetected => "Face left the frame for too long",
            Self::UserRequested => "Game ended",
        }
    }
}

impl std::fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
