//! Core types for Smirkguard

mod checkpoint;
mod output;
mod reason;
mod signals;
mod state;

pub use checkpoint::{Checkpoint, CheckpointReached};
pub use output::{FrameOutput, GuardianEvent, SmirkMeta};
pub use reason::GameOverReason;
pub use signals::{ConditionedSignal, DetectionSample, EyesOpen};
pub use state::{CalibrationStatus, EscalationPhase, GameState};
