//! Integration tests for escalation driven by the guardian pipeline
//!
//! The application layer relays each SmirkDetected decision to the
//! escalation controller and forces FAIL on any guardian game over.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use smirkguard::config::EscalationConfig;
use smirkguard::core::{EscalationController, GuardianEngine, SessionEffects, SmirkReport};
use smirkguard::types::{DetectionSample, EscalationPhase, FrameOutput, GameState};

const FRAME_MS: f64 = 40.0;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<&'static str>>,
}

impl Recorder {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == name).count()
    }
}

impl SessionEffects for Recorder {
    fn stop_survival_clock(&self) {
        self.calls.lock().push("stop_clock");
    }
    fn trigger_alert(&self) {
        self.calls.lock().push("alert");
    }
    fn submit_score(&self) {
        self.calls.lock().push("submit_score");
    }
    fn end_session(&self) {
        self.calls.lock().push("end_session");
    }
    fn release_presentation(&self) {
        self.calls.lock().push("release");
    }
}

/// Guardian + escalation wired the way a host application does it
struct Session {
    guardian: GuardianEngine,
    escalation: EscalationController,
    recorder: Arc<Recorder>,
    t: f64,
}

impl Session {
    fn new(config: EscalationConfig) -> Self {
        let recorder = Arc::new(Recorder::default());
        let mut session = Self {
            guardian: GuardianEngine::new(),
            escalation: EscalationController::new(config, recorder.clone()),
            recorder,
            t: 0.0,
        };
        session.guardian.start_calibration();
        while session.guardian.state() == GameState::Calibrating {
            session.frame(0.02);
            assert!(session.t < 10_000.0);
        }
        session
    }

    fn frame(&mut self, score: f64) -> FrameOutput {
        self.frame_sample(DetectionSample::new(score, self.t))
    }

    fn frame_sample(&mut self, sample: DetectionSample) -> FrameOutput {
        let output = self.guardian.process_detection(&sample);
        self.t += FRAME_MS;
        if let Some((is_smirking, probability)) = output.smirk_report() {
            self.escalation
                .report(SmirkReport::new(is_smirking, probability));
        }
        if output.game_over().is_some() {
            self.escalation.commit_failure();
        }
        output
    }
}

const WARNING: Duration = Duration::from_millis(smirkguard::ESCALATION_WARNING_MS);
const FINALIZE: Duration = Duration::from_millis(smirkguard::ESCALATION_FINALIZE_DELAY_MS);

#[tokio::test(start_paused = true)]
async fn test_neutral_play_never_escalates() {
    let mut session = Session::new(EscalationConfig::default());
    for _ in 0..50 {
        session.frame(0.02);
    }
    sleep(WARNING * 2).await;
    assert_eq!(session.escalation.phase(), EscalationPhase::Normal);
    assert!(session.recorder.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_mild_smile_warns_then_recovers() {
    let mut session = Session::new(EscalationConfig::default());

    // Smoothed score climbs into [0.15, 0.50) without crossing 0.30
    for _ in 0..20 {
        session.frame(0.25);
    }
    assert_eq!(session.escalation.phase(), EscalationPhase::Warning);
    assert!(session.escalation.has_pending_warning());

    // Back to neutral before the timer fires
    for _ in 0..20 {
        session.frame(0.0);
    }
    assert_eq!(session.escalation.phase(), EscalationPhase::Normal);
    assert!(!session.escalation.has_pending_warning());

    sleep(WARNING * 2).await;
    assert_eq!(session.escalation.phase(), EscalationPhase::Normal);
    assert!(session.recorder.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_held_smirk_fails_and_finalizes() {
    let mut session = Session::new(EscalationConfig::default());

    let mut over = false;
    for _ in 0..10 {
        if session.frame(0.9).game_over().is_some() {
            over = true;
            break;
        }
    }
    assert!(over);
    assert_eq!(session.escalation.phase(), EscalationPhase::Fail);
    assert_eq!(session.recorder.calls(), vec!["stop_clock", "alert"]);

    sleep(FINALIZE + Duration::from_millis(10)).await;
    assert!(session.escalation.is_finalized());
    assert_eq!(
        session.recorder.calls(),
        vec!["stop_clock", "alert", "submit_score", "end_session", "release"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_guest_session_skips_score_submission() {
    let mut session = Session::new(EscalationConfig::guest());
    for _ in 0..10 {
        if session.frame(0.9).game_over().is_some() {
            break;
        }
    }
    sleep(FINALIZE + Duration::from_millis(10)).await;
    assert!(session.escalation.is_finalized());
    assert_eq!(session.recorder.count("submit_score"), 0);
    assert_eq!(session.recorder.count("end_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_face_loss_game_over_forces_fail() {
    let mut session = Session::new(EscalationConfig::default());
    let mut over = false;
    for _ in 0..200 {
        let t = session.t;
        if session
            .frame_sample(DetectionSample::no_face(t))
            .game_over()
            .is_some()
        {
            over = true;
            break;
        }
    }
    assert!(over);
    assert_eq!(session.escalation.phase(), EscalationPhase::Fail);
    assert_eq!(session.recorder.count("alert"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_effects_fire_once_per_session() {
    let mut session = Session::new(EscalationConfig::default());
    for _ in 0..10 {
        session.frame(0.9);
    }
    // Late reports after FAIL are ignored
    session.escalation.report(SmirkReport::new(true, 0.95));
    assert!(!session.escalation.commit_failure());
    sleep(FINALIZE * 3).await;
    assert_eq!(session.recorder.count("alert"), 1);
    assert_eq!(session.recorder.count("end_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_cancels_pending_finalize() {
    let mut session = Session::new(EscalationConfig::default());
    for _ in 0..10 {
        if session.frame(0.9).game_over().is_some() {
            break;
        }
    }
    session.escalation.resume();
    session.guardian.restart();

    sleep(FINALIZE * 2).await;
    assert!(!session.escalation.is_finalized());
    assert_eq!(session.escalation.phase(), EscalationPhase::Normal);
    assert_eq!(session.recorder.count("end_session"), 0);
    assert_eq!(session.guardian.state(), GameState::Calibrating);
}
