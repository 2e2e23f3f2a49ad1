//! Guardian Engine: per-frame game state machine
//!
//! State transitions:
//! - IDLE → CALIBRATING: start_calibration()
//! - CALIBRATING → PLAYING: calibration complete
//! - CALIBRATING → IDLE: cancel_calibration()
//! - PLAYING → GAME_OVER: smirk held for required frames, face lost past
//!   timeout, or end_game()
//! - GAME_OVER → (fresh) IDLE/CALIBRATING: reset() / restart() only
//!
//! Rules in PLAYING, evaluated in order, first match ends the frame:
//! 1. face lost (debounced) → warning at 1 s, game over at timeout
//! 2. eyes closed (debounced) → skip smirk evaluation
//! 3. smirk streak with a reset grace for single-frame dips

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::GuardianConfig;
use crate::core::calibration::{CalibrationSequencer, CalibrationUpdate};
use crate::core::conditioner::SignalConditioner;
use crate::core::hysteresis::HysteresisClassifier;
use crate::types::{
    ConditionedSignal, DetectionSample, FrameOutput, GameOverReason, GameState, GuardianEvent,
    SmirkMeta,
};

/// Guardian state machine for one player
#[derive(Debug, Clone)]
pub struct GuardianEngine {
    config: GuardianConfig,
    state: GameState,
    conditioner: SignalConditioner,
    classifier: HysteresisClassifier,
    calibration: CalibrationSequencer,
    /// Latest conditioned values (kept current in every state)
    signal: ConditionedSignal,
    /// Threshold the classifier used on the latest frame
    effective_threshold: f64,
    consecutive_smirk_frames: u32,
    /// Advisory, UI only
    warning_zone_frames: u32,
    /// Non-smirking frames since the last smirking one
    smirk_reset_grace: u32,
    face_lost_frames: u32,
    game_over_reason: Option<GameOverReason>,
    /// Sample timestamp at which PLAYING began
    play_started_at: Option<f64>,
    frame_count: u64,
}

impl Default for GuardianEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardianEngine {
    /// Create engine with default tunables
    pub fn new() -> Self {
        Self::with_config(GuardianConfig::default())
    }

    pub fn with_config(config: GuardianConfig) -> Self {
        Self {
            state: GameState::Idle,
            conditioner: SignalConditioner::new(&config),
            classifier: HysteresisClassifier::new(config.enter_threshold, config.exit_threshold),
            calibration: CalibrationSequencer::new(&config),
            signal: ConditionedSignal::default(),
            effective_threshold: config.enter_threshold,
            consecutive_smirk_frames: 0,
            warning_zone_frames: 0,
            smirk_reset_grace: 0,
            face_lost_frames: 0,
            game_over_reason: None,
            play_started_at: None,
            frame_count: 0,
            config,
        }
    }

    /// Enter CALIBRATING. Allowed from IDLE, or from CALIBRATING to start
    /// the run over. Returns false otherwise.
    pub fn start_calibration(&mut self) -> bool {
        match self.state {
            GameState::Idle | GameState::Calibrating => {
                self.calibration.start();
                self.state = GameState::Calibrating;
                true
            }
            GameState::Playing | GameState::GameOver => {
                debug!(state = %self.state, "start_calibration ignored");
                false
            }
        }
    }

    /// Abort calibration and return to IDLE
    pub fn cancel_calibration(&mut self) -> Option<GuardianEvent> {
        if self.state != GameState::Calibrating {
            return None;
        }
        self.calibration.cancel();
        self.state = GameState::Idle;
        Some(GuardianEvent::CalibrationFailed)
    }

    /// Condition and classify a raw sample, then run the state machine
    pub fn process_detection(&mut self, sample: &DetectionSample) -> FrameOutput {
        let mut signal = self.conditioner.condition(sample);
        self.effective_threshold = self.classifier.effective_threshold();
        signal.is_smirking = self.classifier.classify(signal.happiness_score);
        self.process_conditioned(signal)
    }

    /// Run the state machine on an already conditioned frame
    pub fn process_conditioned(&mut self, signal: ConditionedSignal) -> FrameOutput {
        self.signal = signal;
        self.frame_count += 1;

        let mut events = Vec::new();
        match self.state {
            GameState::Idle | GameState::GameOver => {}
            GameState::Calibrating => self.step_calibration(&mut events),
            GameState::Playing => self.step_playing(&mut events),
        }
        self.output(events)
    }

    /// End a running game on request
    pub fn end_game(&mut self) -> Option<GuardianEvent> {
        match self.state {
            GameState::Calibrating | GameState::Playing => {
                let mut events = Vec::new();
                self.enter_game_over(GameOverReason::UserRequested, &mut events);
                events.pop()
            }
            GameState::Idle | GameState::GameOver => None,
        }
    }

    fn step_calibration(&mut self, events: &mut Vec<GuardianEvent>) {
        match self.calibration.update(&self.signal) {
            Some(CalibrationUpdate::Progress(progress)) => {
                events.push(GuardianEvent::CalibrationProgress { progress });
            }
            Some(CalibrationUpdate::Complete) => {
                events.push(GuardianEvent::CalibrationProgress { progress: 100.0 });
                events.push(GuardianEvent::CalibrationComplete);
                self.state = GameState::Playing;
                self.play_started_at = Some(self.signal.timestamp_ms);
                self.consecutive_smirk_frames = 0;
                self.warning_zone_frames = 0;
                self.smirk_reset_grace = 0;
                self.face_lost_frames = 0;
                info!(at_ms = self.signal.timestamp_ms, "game started");
            }
            None => {}
        }
    }

    fn step_playing(&mut self, events: &mut Vec<GuardianEvent>) {
        // 1. Face lost
        if !self.signal.face_detected {
            self.face_lost_frames += 1;
            if self.face_lost_frames == self.config.face_lost_warning_frames {
                warn!(frames = self.face_lost_frames, "face not detected");
                events.push(GuardianEvent::FaceNotDetected {
                    frames: self.face_lost_frames,
                });
            }
            if self.face_lost_frames >= self.config.face_lost_timeout_frames {
                self.enter_game_over(GameOverReason::FaceNotDetected, events);
            }
            return;
        }
        self.face_lost_frames = 0;

        // 2. Eyes closed
        if !self.signal.eyes_open {
            events.push(GuardianEvent::EyesClosed);
            return;
        }

        // 3. Smirk streak
        let required = self.config.smirk_frames_required;
        let is_smirking = self.signal.is_smirking;
        if is_smirking {
            self.smirk_reset_grace = 0;
            self.consecutive_smirk_frames += 1;
        } else {
            self.smirk_reset_grace = self.smirk_reset_grace.saturating_add(1);
            if self.smirk_reset_grace > self.config.smirk_reset_grace_frames
                && self.consecutive_smirk_frames > 0
            {
                debug!(streak = self.consecutive_smirk_frames, "smirk streak reset");
                self.consecutive_smirk_frames = 0;
            }
        }

        let count = self.consecutive_smirk_frames;
        let in_warning_zone = count >= 1 && count < required;
        self.warning_zone_frames = if in_warning_zone { count } else { 0 };

        events.push(GuardianEvent::SmirkDetected {
            is_smirking,
            probability: self.signal.happiness_score,
            meta: SmirkMeta {
                consecutive_frames: count,
                required_frames: required,
                in_warning_zone,
                effective_threshold: self.effective_threshold,
            },
        });

        if is_smirking && in_warning_zone {
            debug!(streak = count, required, "smirk warning zone");
            events.push(GuardianEvent::WarningZone {
                consecutive_frames: count,
            });
        }

        if count >= required {
            self.enter_game_over(GameOverReason::SmirkDetected, events);
        }
    }

    fn enter_game_over(&mut self, reason: GameOverReason, events: &mut Vec<GuardianEvent>) {
        self.state = GameState::GameOver;
        self.game_over_reason = Some(reason);
        self.warning_zone_frames = 0;
        info!(reason = reason.code(), frames = self.frame_count, "game over");
        events.push(GuardianEvent::GameOver { reason });
    }

    fn output(&self, events: Vec<GuardianEvent>) -> FrameOutput {
        FrameOutput {
            timestamp: Utc::now(),
            state: self.state,
            signal: self.signal,
            consecutive_smirk_frames: self.consecutive_smirk_frames,
            required_smirk_frames: self.config.smirk_frames_required,
            warning_zone_frames: self.warning_zone_frames,
            calibration_progress: self.calibration.progress(),
            game_over_reason: self.game_over_reason,
            events,
        }
    }

    /// Get current output without processing a frame
    pub fn current_output(&self) -> FrameOutput {
        self.output(Vec::new())
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn signal(&self) -> &ConditionedSignal {
        &self.signal
    }

    pub fn consecutive_smirk_frames(&self) -> u32 {
        self.consecutive_smirk_frames
    }

    pub fn warning_zone_frames(&self) -> u32 {
        self.warning_zone_frames
    }

    pub fn face_lost_frames(&self) -> u32 {
        self.face_lost_frames
    }

    pub fn calibration_progress(&self) -> f64 {
        self.calibration.progress()
    }

    pub fn calibration_ready(&self) -> bool {
        self.calibration.is_ready()
    }

    pub fn is_game_over(&self) -> bool {
        self.state == GameState::GameOver
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.game_over_reason
    }

    pub fn play_started_at(&self) -> Option<f64> {
        self.play_started_at
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    /// Reset engine to a fresh IDLE state
    pub fn reset(&mut self) {
        *self = Self::with_config(self.config.clone());
    }

    /// Fresh state, straight into calibration
    pub fn restart(&mut self) {
        self.reset();
        self.start_calibration();
    }
}

// =============================================================================
// TESTS
// =============================================================================
