//! Smirkguard CLI
//!
//! Usage:
//!   smirkguard --replay samples.jsonl          # Run recorded samples through the pipeline
//!   smirkguard --replay - < samples.jsonl      # Same, from stdin
//!   smirkguard --replay samples.jsonl --json   # JSON output, one frame per line
//!   smirkguard --replay samples.jsonl --realtime  # Pace by sample timestamps
//!   smirkguard --serve                         # HTTP API server

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing::{debug, info, warn};

use smirkguard::config::{EscalationConfig, GuardianConfig, ServerConfig};
use smirkguard::core::{
    run_server, CheckpointScheduler, EscalationController, GuardianEngine, LogEffects,
    SmirkReport, SurvivalClock,
};
use smirkguard::logging::init_tracing;
use smirkguard::types::{DetectionSample, EscalationPhase, FrameOutput, GameState, GuardianEvent};
use smirkguard::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "smirkguard",
    version = VERSION,
    about = "Smirkguard - smirk detection pipeline for the Smirkle survival game",
    long_about = "Smirkguard turns per-frame face detections into game decisions.\n\n\
                  Samples are JSON objects, one per line:\n  \
                  {\"faceDetected\":true,\"eyesOpen\":true,\"happinessScore\":0.12,\"timestamp\":1040}\n\n\
                  Modes:\n  \
                  --replay   Feed recorded samples through the pipeline\n  \
                  --serve    HTTP API server mode\n\n\
                  States:\n  \
                  IDLE        - Nothing running\n  \
                  CALIBRATING - Hold a neutral face to start\n  \
                  PLAYING     - Don't smirk\n  \
                  GAME_OVER   - Smirk held, face lost, or ended"
)]
struct Args {
    /// JSON-lines sample file to replay ("-" for stdin)
    #[arg(short, long)]
    replay: Option<String>,

    /// Pace replay by sample timestamps so escalation timers can fire
    #[arg(long)]
    realtime: bool,

    /// Guest session (no score submission)
    #[arg(long)]
    guest: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: HOST:PORT from the environment, else 127.0.0.1:3000)
    #[arg(long)]
    addr: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Log pipeline decisions (debug level)
    #[arg(long)]
    verbose: bool,

    /// Tracing filter directive (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let server_config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => fail(&format!("Config error: {}", e)),
    };
    let log_level = match (&args.log_level, args.verbose) {
        (Some(level), _) => level.clone(),
        (None, true) => "debug".to_string(),
        (None, false) => server_config.log_level.clone(),
    };
    init_tracing(&log_level);

    if args.no_color {
        colored::control::set_override(false);
    }

    let guardian_config = match GuardianConfig::from_env() {
        Ok(config) => config,
        Err(e) => fail(&format!("Config error: {}", e)),
    };
    let escalation_config = match EscalationConfig::from_env() {
        Ok(config) => EscalationConfig {
            guest: args.guest || config.guest,
            ..config
        },
        Err(e) => fail(&format!("Config error: {}", e)),
    };

    if args.serve {
        let addr = match &args.addr {
            Some(addr) => match addr.parse::<SocketAddr>() {
                Ok(addr) => addr,
                Err(e) => fail(&format!("Invalid address '{}': {}", addr, e)),
            },
            None => server_config.bind_addr(),
        };
        run_serve(addr, guardian_config, escalation_config).await;
    } else {
        let source = args.replay.clone().unwrap_or_else(|| "-".to_string());
        run_replay(&source, &args, guardian_config, escalation_config).await;
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message.red());
    std::process::exit(1);
}

/// Open the replay source
fn open_source(source: &str) -> io::Result<Box<dyn BufRead>> {
    if source == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(File::open(source)?)))
    }
}

/// Run recorded samples through the full pipeline
async fn run_replay(
    source: &str,
    args: &Args,
    guardian_config: GuardianConfig,
    escalation_config: EscalationConfig,
) {
    let reader = match open_source(source) {
        Ok(reader) => reader,
        Err(e) => fail(&format!("Cannot open '{}': {}", source, e)),
    };

    let mut guardian = GuardianEngine::with_config(guardian_config);
    let escalation = EscalationController::new(escalation_config, Arc::new(LogEffects));
    let mut checkpoints = CheckpointScheduler::default();
    let mut clock = SurvivalClock::new();
    let mut last_ts: Option<f64> = None;

    if !args.json {
        print_header(args.guest);
    }
    guardian.start_calibration();

    for (line_no, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "read failed, stopping replay");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let sample: DetectionSample = match serde_json::from_str(line) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "unparseable sample skipped");
                continue;
            }
        };
        if let Err(e) = sample.validate() {
            warn!(line = line_no + 1, error = %e, "invalid sample skipped");
            continue;
        }

        if args.realtime {
            if let Some(prev) = last_ts {
                let gap = (sample.timestamp_ms - prev).max(0.0);
                tokio::time::sleep(Duration::from_secs_f64(gap / 1000.0)).await;
            }
        }
        last_ts = Some(sample.timestamp_ms);

        let output = guardian.process_detection(&sample);

        if output.events.contains(&GuardianEvent::CalibrationComplete) {
            clock.start(sample.timestamp_ms);
        }
        if let Some((is_smirking, probability)) = output.smirk_report() {
            escalation.report(SmirkReport::new(is_smirking, probability));
        }
        if output.game_over().is_some() {
            escalation.commit_failure();
        }
        if escalation.phase() == EscalationPhase::Fail {
            clock.stop();
        }

        let survival_secs = clock.tick(sample.timestamp_ms);
        if output.state == GameState::Playing && clock.is_running() {
            for reached in checkpoints.update(survival_secs) {
                if args.json {
                    println!("{}", serde_json::to_string(&reached).unwrap_or_default());
                } else {
                    println!(
                        "{}",
                        format!(
                            "  ★ CHECKPOINT {:.0}s  +{}  (total {})",
                            reached.threshold_secs, reached.bonus_points, reached.cumulative_bonus
                        )
                        .yellow()
                        .bold()
                    );
                }
            }
        }

        print_frame(&output, escalation.phase(), args);

        if output.state == GameState::GameOver {
            debug!("game over, remaining samples ignored");
            break;
        }
    }

    // Let pending escalation timers play out
    if args.realtime && escalation.phase() != EscalationPhase::Normal {
        let config = escalation.config();
        tokio::time::sleep(config.warning_duration + config.finalize_delay).await;
    }

    print_summary(&guardian, &escalation, &checkpoints, &clock, args);
}

/// Print one frame
fn print_frame(output: &FrameOutput, phase: EscalationPhase, args: &Args) {
    if args.json {
        #[derive(serde::Serialize)]
        struct ReplayFrame<'a> {
            frame: &'a FrameOutput,
            escalation: EscalationPhase,
        }
        let frame = ReplayFrame {
            frame: output,
            escalation: phase,
        };
        println!("{}", serde_json::to_string(&frame).unwrap_or_default());
        return;
    }

    if args.no_color {
        println!("{} | escalation={}", output.to_parseable_string(), phase);
    } else {
        println!(
            "{} {}",
            output.to_terminal_string(),
            format!("[{}]", phase).color(phase.color())
        );
    }
    print_event_messages(output);
}

/// Print human-readable event messages
fn print_event_messages(output: &FrameOutput) {
    for event in &output.events {
        match event {
            GuardianEvent::CalibrationComplete => {
                println!("{}", "  ✓ Calibrated - game on".green());
            }
            GuardianEvent::WarningZone { consecutive_frames } => {
                println!(
                    "{}",
                    format!("  ⚠ Smirk building ({} frames)", consecutive_frames).yellow()
                );
            }
            GuardianEvent::FaceNotDetected { frames } => {
                println!(
                    "{}",
                    format!("  ⚠ Face lost for {} frames - get back in view", frames).yellow()
                );
            }
            GuardianEvent::EyesClosed => {
                println!("{}", "  ⚠ Eyes closed".yellow());
            }
            GuardianEvent::GameOver { reason } => {
                println!("{}", format!("  ✗ GAME OVER - {}", reason.description()).red());
            }
            _ => {}
        }
    }
}

/// Print header
fn print_header(guest: bool) {
    println!("{}", "========================================".bold());
    println!("{}", format!("  Smirkguard v{} - Replay", VERSION).bold());
    if guest {
        println!("  (guest session - score not submitted)");
    }
    println!("{}", "========================================".bold());
    println!();
}

/// Print end-of-replay summary
fn print_summary(
    guardian: &GuardianEngine,
    escalation: &EscalationController,
    checkpoints: &CheckpointScheduler,
    clock: &SurvivalClock,
    args: &Args,
) {
    if args.json {
        let summary = serde_json::json!({
            "summary": {
                "frames": guardian.frame_count(),
                "state": guardian.state(),
                "game_over_reason": guardian.game_over_reason(),
                "escalation": escalation.phase(),
                "finalized": escalation.is_finalized(),
                "survival_secs": clock.elapsed_secs(),
                "bonus": checkpoints.accumulated_bonus(),
            }
        });
        println!("{}", summary);
        return;
    }

    println!();
    println!(
        "Session ended. Frames: {} | State: {} | Survived: {:.1}s | Bonus: {}",
        guardian.frame_count(),
        guardian.state(),
        clock.elapsed_secs(),
        checkpoints.accumulated_bonus()
    );
    if let Some(reason) = guardian.game_over_reason() {
        println!("Reason: {} ({})", reason.description(), reason.code());
    }
    info!(
        frames = guardian.frame_count(),
        escalation = %escalation.phase(),
        "replay finished"
    );
}

/// Run HTTP API server
async fn run_serve(
    addr: SocketAddr,
    guardian_config: GuardianConfig,
    escalation_config: EscalationConfig,
) {
    println!();
    println!("{}", format!("  Smirkguard API Server v{}", VERSION).bold());
    println!("  Listening on http://{}", addr);
    println!();

    if let Err(e) = run_server(addr, guardian_config, escalation_config).await {
        fail(&format!("Server error: {}", e));
    }
}
