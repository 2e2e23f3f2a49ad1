//! Smirkguard: smirk detection pipeline for the Smirkle survival game
//!
//! raw sample → SignalConditioner → HysteresisClassifier → GuardianEngine
//! → (application relays smirk reports) → EscalationController
//!
//! CheckpointScheduler runs independently off the survival clock.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod types;

// =============================================================================
// SIGNAL CONDITIONING
// =============================================================================

/// Consecutive raw `true` frames before a face counts as present
/// Fast: a face that shows up should be picked up almost immediately
pub const FACE_DEBOUNCE_ON_FRAMES: u32 = 3;

/// Consecutive raw `false` frames before a face counts as lost
/// Slow: motion blur and brief occlusion must not read as face loss
pub const FACE_DEBOUNCE_OFF_FRAMES: u32 = 10;

/// Symmetric debounce window for eyes open/closed
pub const EYES_DEBOUNCE_FRAMES: u32 = 5;

/// Per-eye openness at or above which an eye counts as open
pub const EYE_OPENNESS_THRESHOLD: f64 = 0.2;

/// EMA weight of the newest happiness sample (higher = more responsive)
pub const SMOOTHING_ALPHA: f64 = 0.3;

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Smoothed score at which a neutral face starts smirking
pub const SMIRK_ENTER_THRESHOLD: f64 = 0.30;

/// Smoothed score below which a smirking face is cleared
pub const SMIRK_EXIT_THRESHOLD: f64 = 0.24;

/// Smoothed score below which the expression counts as neutral
pub const NEUTRAL_THRESHOLD: f64 = 0.15;

// =============================================================================
// CALIBRATION
// =============================================================================

/// Neutral baseline must hold this long (milliseconds)
pub const CALIBRATION_STABILITY_MS: f64 = 1000.0;

/// Stable frames must exceed this count before calibration completes
pub const CALIBRATION_MIN_FRAMES: u32 = 10;

/// Failed frames tolerated before stability resets
pub const CALIBRATION_GRACE_FRAMES: u32 = 3;

// =============================================================================
// GAME RULES (frame counts at ~30 fps)
// =============================================================================

/// Consecutive smirking frames that end the game
pub const SMIRK_FRAMES_REQUIRED: u32 = 3;

/// Non-smirking frames tolerated inside a smirk streak
pub const SMIRK_RESET_GRACE_FRAMES: u32 = 2;

/// Advisory warning-zone length, UI only (never gates game over)
pub const WARNING_ZONE_FRAMES: u32 = SMIRK_FRAMES_REQUIRED - 1;

/// Face-loss frames before the "face not detected" warning (1 s)
pub const FACE_LOST_WARNING_FRAMES: u32 = 30;

/// Face-loss frames before game over (3 s)
pub const FACE_LOST_TIMEOUT_FRAMES: u32 = 90;

// =============================================================================
// ESCALATION
// =============================================================================

/// Probability at which the warning zone starts
pub const ESCALATION_NEUTRAL_THRESHOLD: f64 = 0.15;

/// Probability at which the session fails immediately
pub const ESCALATION_FAIL_THRESHOLD: f64 = 0.50;

/// Grace window the player gets to recover once warned (milliseconds)
pub const ESCALATION_WARNING_MS: u64 = 3000;

/// Delay between the fail alert and session finalization (milliseconds)
/// Long enough for the alert/haptic to finish
pub const ESCALATION_FINALIZE_DELAY_MS: u64 = 2000;

// =============================================================================
// CHECKPOINTS
// =============================================================================

/// Survival milestones as (threshold seconds, bonus points)
/// Intervals double (5, 15, 35, 75, 155 min), bonuses step by 1000
pub const DEFAULT_CHECKPOINTS: [(f64, u32); 5] = [
    (300.0, 1000),
    (900.0, 2000),
    (2100.0, 3000),
    (4500.0, 4000),
    (9300.0, 5000),
];

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
