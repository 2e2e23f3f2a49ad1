//! Integration tests for the per-frame pipeline
//!
//! Raw samples through conditioner → classifier → guardian, plus the
//! checkpoint scheduler driven by the survival clock.

use pretty_assertions::assert_eq;
use smirkguard::config::GuardianConfig;
use smirkguard::core::{CheckpointScheduler, GuardianEngine, SurvivalClock};
use smirkguard::types::{
    DetectionSample, EyesOpen, GameOverReason, GameState, GuardianEvent,
};

const FRAME_MS: f64 = 40.0;

/// Feed neutral samples until play starts, return the next timestamp
fn calibrate(engine: &mut GuardianEngine) -> f64 {
    assert!(engine.start_calibration());
    let mut t = 0.0;
    while engine.state() == GameState::Calibrating {
        engine.process_detection(&DetectionSample::new(0.02, t));
        t += FRAME_MS;
        assert!(t < 10_000.0, "calibration never completed");
    }
    assert_eq!(engine.state(), GameState::Playing);
    t
}

#[test]
fn test_calibration_needs_debounced_face_and_a_full_second() {
    let mut engine = GuardianEngine::new();
    let t = calibrate(&mut engine);
    // Face and eyes debounce first, then the stable run needs 1000 ms
    assert!(t >= 1000.0 + 4.0 * FRAME_MS);
    assert_eq!(engine.play_started_at(), Some(t - FRAME_MS));
    assert_eq!(engine.calibration_progress(), 100.0);
}

#[test]
fn test_held_smirk_ends_game() {
    let mut engine = GuardianEngine::new();
    let mut t = calibrate(&mut engine);

    let mut over = None;
    let mut peak_warning = 0;
    for _ in 0..10 {
        let output = engine.process_detection(&DetectionSample::new(0.9, t));
        t += FRAME_MS;
        peak_warning = peak_warning.max(output.warning_zone_frames);
        if let Some(reason) = output.game_over() {
            over = Some(reason);
            break;
        }
    }
    assert_eq!(over, Some(GameOverReason::SmirkDetected));
    assert!(engine.is_game_over());
    assert!(engine.consecutive_smirk_frames() >= 3);
    assert_eq!(peak_warning, smirkguard::WARNING_ZONE_FRAMES);
    assert_eq!(engine.warning_zone_frames(), 0);
}

#[test]
fn test_single_frame_flash_is_absorbed_by_smoothing() {
    let mut engine = GuardianEngine::new();
    let mut t = calibrate(&mut engine);

    engine.process_detection(&DetectionSample::new(0.9, t));
    t += FRAME_MS;
    for _ in 0..100 {
        let output = engine.process_detection(&DetectionSample::new(0.02, t));
        t += FRAME_MS;
        assert!(!output.signal.is_smirking);
    }
    assert_eq!(engine.state(), GameState::Playing);
    assert_eq!(engine.consecutive_smirk_frames(), 0);
}

#[test]
fn test_mild_smile_inside_hysteresis_band_never_fires() {
    let mut engine = GuardianEngine::new();
    let mut t = calibrate(&mut engine);

    // Smoothed score settles around 0.27: above exit, below enter
    for _ in 0..200 {
        engine.process_detection(&DetectionSample::new(0.27, t));
        t += FRAME_MS;
    }
    assert_eq!(engine.state(), GameState::Playing);
    assert_eq!(engine.consecutive_smirk_frames(), 0);
}

#[test]
fn test_face_loss_warns_once_then_times_out() {
    let mut engine = GuardianEngine::new();
    let mut t = calibrate(&mut engine);

    let mut warnings = 0;
    let mut over = None;
    for _ in 0..200 {
        let output = engine.process_detection(&DetectionSample::no_face(t));
        t += FRAME_MS;
        warnings += output
            .events
            .iter()
            .filter(|e| matches!(e, GuardianEvent::FaceNotDetected { .. }))
            .count();
        if let Some(reason) = output.game_over() {
            over = Some(reason);
            break;
        }
    }
    assert_eq!(warnings, 1);
    assert_eq!(over, Some(GameOverReason::FaceNotDetected));
    assert_eq!(engine.face_lost_frames(), 90);
}

#[test]
fn test_brief_face_dropout_is_debounced() {
    let mut engine = GuardianEngine::new();
    let mut t = calibrate(&mut engine);

    for _ in 0..5 {
        let output = engine.process_detection(&DetectionSample::no_face(t));
        t += FRAME_MS;
        assert!(output.signal.face_detected);
    }
    engine.process_detection(&DetectionSample::new(0.02, t));
    assert_eq!(engine.face_lost_frames(), 0);
}

#[test]
fn test_closed_eyes_pause_smirk_evaluation() {
    let mut engine = GuardianEngine::new();
    let mut t = calibrate(&mut engine);

    let closed = EyesOpen::Openness {
        left: 0.05,
        right: 0.1,
    };
    // Let the eyes debounce to closed while still neutral
    for _ in 0..5 {
        engine.process_detection(&DetectionSample::new(0.02, t).with_eyes(closed));
        t += FRAME_MS;
    }
    for _ in 0..20 {
        let output = engine.process_detection(&DetectionSample::new(0.9, t).with_eyes(closed));
        t += FRAME_MS;
        assert!(output.events.contains(&GuardianEvent::EyesClosed));
        assert!(output.smirk_report().is_none());
    }
    assert_eq!(engine.state(), GameState::Playing);
    assert_eq!(engine.consecutive_smirk_frames(), 0);
}

#[test]
fn test_restart_after_game_over() {
    let mut engine = GuardianEngine::new();
    let t = calibrate(&mut engine);
    assert!(engine.end_game().is_some());
    assert_eq!(engine.game_over_reason(), Some(GameOverReason::UserRequested));

    // Game over is sticky until restart
    engine.process_detection(&DetectionSample::new(0.02, t));
    assert_eq!(engine.state(), GameState::GameOver);

    engine.restart();
    assert_eq!(engine.state(), GameState::Calibrating);
    assert_eq!(engine.game_over_reason(), None);
    assert_eq!(engine.frame_count(), 0);
    calibrate_from_running(&mut engine);
}

fn calibrate_from_running(engine: &mut GuardianEngine) {
    let mut t = 0.0;
    while engine.state() == GameState::Calibrating {
        engine.process_detection(&DetectionSample::new(0.02, t));
        t += FRAME_MS;
        assert!(t < 10_000.0, "calibration never completed");
    }
    assert_eq!(engine.state(), GameState::Playing);
}

#[test]
fn test_custom_config_requires_longer_streak() {
    let config = GuardianConfig {
        smirk_frames_required: 6,
        ..GuardianConfig::default()
    };
    let mut engine = GuardianEngine::with_config(config);
    let mut t = calibrate(&mut engine);

    let mut frames = 0;
    while engine.state() == GameState::Playing {
        engine.process_detection(&DetectionSample::new(0.9, t));
        t += FRAME_MS;
        frames += 1;
        assert!(frames < 20);
    }
    assert_eq!(engine.consecutive_smirk_frames(), 6);
}

#[test]
fn test_checkpoints_follow_survival_clock() {
    let mut clock = SurvivalClock::new();
    let mut scheduler = CheckpointScheduler::default();
    clock.start(0.0);

    for s in 0..300 {
        let elapsed = clock.tick(s as f64 * 1000.0);
        assert!(scheduler.update(elapsed).is_empty());
    }

    let reached = scheduler.update(clock.tick(300_000.0));
    assert_eq!(reached.len(), 1);
    assert_eq!(reached[0].bonus_points, 1000);
    assert_eq!(scheduler.accumulated_bonus(), 1000);

    for s in 301..900 {
        assert!(scheduler.update(clock.tick(s as f64 * 1000.0)).is_empty());
    }
    let reached = scheduler.update(clock.tick(900_000.0));
    assert_eq!(reached.len(), 1);
    assert_eq!(reached[0].cumulative_bonus, 3000);

    // Fail freezes the clock, so nothing further fires
    clock.stop();
    assert!(scheduler.update(clock.tick(5_000_000.0)).is_empty());
    assert_eq!(scheduler.accumulated_bonus(), 3000);
}
