//! Core modules for Smirkguard

pub mod conditioner;
pub mod hysteresis;
pub mod calibration;
pub mod guardian;
pub mod escalation;
pub mod checkpoint;
pub mod api;

pub use conditioner::{debounce_boolean, smooth_score, DebounceState, SignalConditioner};
pub use hysteresis::HysteresisClassifier;
pub use calibration::{CalibrationSequencer, CalibrationUpdate};
pub use guardian::GuardianEngine;
pub use escalation::{EscalationController, LogEffects, SessionEffects, SmirkReport};
pub use checkpoint::{CheckpointScheduler, SurvivalClock};
pub use api::{create_router, run_server};
