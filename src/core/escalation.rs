//! Escalation Controller: session-level warning → fail protocol
//!
//! State transitions:
//! - NORMAL → WARNING: probability in [neutral, fail), warning timer starts
//! - WARNING → NORMAL: probability back below neutral before the timer fires
//! - WARNING → FAIL: timer fires while still smirking or >= fail
//! - NORMAL/WARNING → FAIL: probability >= fail (immediate)
//! - FAIL → NORMAL: resume() only
//!
//! Entering FAIL stops the survival clock and triggers the alert once, then
//! finalizes the session after a fixed delay. Both delays are tokio tasks
//! whose handles live in the session state. A timer only applies its effect
//! if its handle is still the one stored there, so a cancelled or superseded
//! timer is a no-op even if it already woke up.
//!
//! Every resume() starts a new generation. Effects are tagged with the
//! generation that decided them and each one re-checks it under the lock
//! right before running, so nothing decided for a resumed session reaches
//! the new one. Effects run without the lock held and may call back into
//! the controller.
//!
//! `report`, `commit_failure` and `resume` spawn timers and must be called
//! from inside a Tokio runtime.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EscalationConfig;
use crate::types::EscalationPhase;

/// Side effects the surrounding application performs on failure
pub trait SessionEffects: Send + Sync {
    /// Freeze the survival timer at its current value
    fn stop_survival_clock(&self);
    /// Sound/haptic alert
    fn trigger_alert(&self);
    /// Submit the final score (never called for guest sessions)
    fn submit_score(&self);
    /// Mark the session over
    fn end_session(&self);
    /// Leave fullscreen / picture-in-picture
    fn release_presentation(&self);
}

/// Effects that only log, for hosts without a UI
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEffects;

impl SessionEffects for LogEffects {
    fn stop_survival_clock(&self) {
        info!("survival clock stopped");
    }

    fn trigger_alert(&self) {
        info!("fail alert");
    }

    fn submit_score(&self) {
        info!("score submitted");
    }

    fn end_session(&self) {
        info!("session over");
    }

    fn release_presentation(&self) {
        debug!("presentation released");
    }
}

/// Smirk decision relayed from the guardian
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmirkReport {
    pub is_smirking: bool,
    pub probability: f64,
}

impl SmirkReport {
    pub fn new(is_smirking: bool, probability: f64) -> Self {
        Self {
            is_smirking,
            probability,
        }
    }
}

#[derive(Debug)]
struct TimerHandle {
    id: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    fn cancel(self) {
        self.task.abort();
    }
}

#[derive(Debug)]
struct SessionState {
    phase: EscalationPhase,
    warning_timer: Option<TimerHandle>,
    finalize_timer: Option<TimerHandle>,
    failure_committed: bool,
    finalized: bool,
    last_report: Option<SmirkReport>,
    /// Never reset, so ids stay unique across resumes
    next_timer_id: u64,
    /// Bumped by every resume()
    generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: EscalationPhase::Normal,
            warning_timer: None,
            finalize_timer: None,
            failure_committed: false,
            finalized: false,
            last_report: None,
            next_timer_id: 0,
            generation: 0,
        }
    }

    fn timer_id(&mut self) -> u64 {
        self.next_timer_id += 1;
        self.next_timer_id
    }

    fn cancel_warning(&mut self) {
        if let Some(timer) = self.warning_timer.take() {
            debug!(timer = timer.id, "warning timer cancelled");
            timer.cancel();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_warning();
        if let Some(timer) = self.finalize_timer.take() {
            debug!(timer = timer.id, "finalize timer cancelled");
            timer.cancel();
        }
    }
}

struct Shared {
    config: EscalationConfig,
    state: Mutex<SessionState>,
    effects: Arc<dyn SessionEffects>,
}

impl Shared {
    fn start_warning_timer(self: &Arc<Self>, state: &mut SessionState) {
        state.cancel_warning();
        let id = state.timer_id();
        let shared = Arc::clone(self);
        let delay = self.config.warning_duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.on_warning_elapsed(id);
        });
        state.warning_timer = Some(TimerHandle { id, task });
    }

    /// Move to FAIL and schedule finalization. Returns the generation the
    /// failure belongs to, `None` if already failed.
    fn begin_failure(self: &Arc<Self>, state: &mut SessionState) -> Option<u64> {
        if state.phase == EscalationPhase::Fail {
            return None;
        }
        state.cancel_warning();
        state.phase = EscalationPhase::Fail;
        state.failure_committed = true;

        let id = state.timer_id();
        let shared = Arc::clone(self);
        let delay = self.config.finalize_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.on_finalize_elapsed(id);
        });
        state.finalize_timer = Some(TimerHandle { id, task });
        info!(
            last_probability = state.last_report.map(|r| r.probability),
            "escalation failed"
        );
        Some(state.generation)
    }

    /// Run one effect if `generation` is still current. Called without the lock held.
    fn fire_if_current(&self, generation: u64, effect: impl FnOnce(&dyn SessionEffects)) -> bool {
        if self.state.lock().generation != generation {
            debug!(generation, "session resumed, stale effect dropped");
            return false;
        }
        effect(self.effects.as_ref());
        true
    }

    /// Immediate effects of entering FAIL
    fn fire_failure_effects(&self, generation: u64) {
        if self.fire_if_current(generation, |e| e.stop_survival_clock()) {
            self.fire_if_current(generation, |e| e.trigger_alert());
        }
    }

    fn on_warning_elapsed(self: &Arc<Self>, id: u64) {
        let failed = {
            let mut state = self.state.lock();
            match &state.warning_timer {
                Some(timer) if timer.id == id => {}
                _ => {
                    debug!(timer = id, "stale warning timer ignored");
                    return;
                }
            }
            state.warning_timer = None;
            if state.phase != EscalationPhase::Warning {
                return;
            }
            let still_smirking = state.last_report.is_some_and(|r| {
                r.is_smirking || r.probability >= self.config.fail_threshold
            });
            if still_smirking {
                self.begin_failure(&mut state)
            } else {
                info!("warning window passed without smirk");
                state.phase = EscalationPhase::Normal;
                None
            }
        };
        if let Some(generation) = failed {
            self.fire_failure_effects(generation);
        }
    }

    fn on_finalize_elapsed(&self, id: u64) {
        let generation = {
            let mut state = self.state.lock();
            match &state.finalize_timer {
                Some(timer) if timer.id == id => {}
                _ => {
                    debug!(timer = id, "stale finalize timer ignored");
                    return;
                }
            }
            state.finalize_timer = None;
            if state.finalized {
                return;
            }
            state.finalized = true;
            state.generation
        };
        if self.config.guest {
            debug!("guest session, score not submitted");
        } else if !self.fire_if_current(generation, |e| e.submit_score()) {
            return;
        }
        if self.fire_if_current(generation, |e| e.end_session())
            && self.fire_if_current(generation, |e| e.release_presentation())
        {
            info!("session finalized");
        }
    }
}

/// Two-stage escalation for one gameplay session
pub struct EscalationController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EscalationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationController")
            .field("config", &self.shared.config)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

impl EscalationController {
    pub fn new(config: EscalationConfig, effects: Arc<dyn SessionEffects>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(SessionState::new()),
                effects,
            }),
        }
    }

    /// Feed one smirk decision, return the resulting phase
    pub fn report(&self, report: SmirkReport) -> EscalationPhase {
        let config = &self.shared.config;
        let (phase, failed) = {
            let mut state = self.shared.state.lock();
            if state.phase == EscalationPhase::Fail {
                return EscalationPhase::Fail;
            }
            if !report.probability.is_finite() {
                warn!("non-finite smirk probability ignored");
                return state.phase;
            }
            state.last_report = Some(report);

            let p = report.probability;
            let mut failed = None;
            if p >= config.fail_threshold {
                failed = self.shared.begin_failure(&mut state);
            } else if p >= config.neutral_threshold {
                if state.phase == EscalationPhase::Normal {
                    info!(probability = p, "entering warning zone");
                    state.phase = EscalationPhase::Warning;
                    self.shared.start_warning_timer(&mut state);
                }
            } else if state.phase == EscalationPhase::Warning {
                info!(probability = p, "recovered from warning zone");
                state.cancel_warning();
                state.phase = EscalationPhase::Normal;
            }
            (state.phase, failed)
        };
        if let Some(generation) = failed {
            self.shared.fire_failure_effects(generation);
        }
        phase
    }

    /// Force FAIL from outside (e.g. guardian face-loss game over).
    /// Returns false if the session had already failed.
    pub fn commit_failure(&self) -> bool {
        let failed = {
            let mut state = self.shared.state.lock();
            self.shared.begin_failure(&mut state)
        };
        match failed {
            Some(generation) => {
                self.shared.fire_failure_effects(generation);
                true
            }
            None => false,
        }
    }

    /// Fresh session: cancel every pending timer and clear all state
    pub fn resume(&self) {
        let mut state = self.shared.state.lock();
        state.cancel_all();
        let next_timer_id = state.next_timer_id;
        let generation = state.generation + 1;
        *state = SessionState {
            next_timer_id,
            generation,
            ..SessionState::new()
        };
        info!("escalation session resumed");
    }

    pub fn phase(&self) -> EscalationPhase {
        self.shared.state.lock().phase
    }

    pub fn failure_committed(&self) -> bool {
        self.shared.state.lock().failure_committed
    }

    pub fn is_finalized(&self) -> bool {
        self.shared.state.lock().finalized
    }

    pub fn has_pending_warning(&self) -> bool {
        self.shared.state.lock().warning_timer.is_some()
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.shared.config
    }
}

impl Drop for EscalationController {
    fn drop(&mut self) {
        self.shared.state.lock().cancel_all();
    }
}

// =============================================================================
// TESTS
// =============================================================================
