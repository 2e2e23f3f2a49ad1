//! HTTP + WebSocket API for Smirkguard sessions
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /session/new - Create new session
//! - GET /session/{id} - Get session status
//! - POST /session/{id}/calibrate - Start calibration
//! - POST /session/{id}/frame - Process one detection sample
//! - POST /session/{id}/elapsed - Update checkpoints from a host clock
//! - POST /session/{id}/end - End the game on request
//! - POST /session/{id}/restart - Fresh game, straight into calibration
//! - DELETE /session/{id} - Drop session
//! - WS /ws/{id} - Live updates

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::{EscalationConfig, GuardianConfig};
use crate::core::{
    CheckpointScheduler, EscalationController, GuardianEngine, SessionEffects, SmirkReport,
    SurvivalClock,
};
use crate::error::ApiError;
use crate::types::{
    CheckpointReached, ConditionedSignal, DetectionSample, EscalationPhase, GameOverReason,
    GameState, GuardianEvent,
};

/// Which failure side effects have run for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EffectFlags {
    pub clock_stopped: bool,
    pub alert_triggered: bool,
    pub score_submitted: bool,
    pub session_over: bool,
    pub presentation_released: bool,
}

/// Live update message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    Frame {
        state: GameState,
        score: f64,
        is_smirking: bool,
        consecutive_smirk_frames: u32,
        calibration_progress: f64,
        escalation: EscalationPhase,
        events: Vec<GuardianEvent>,
    },
    Checkpoint(CheckpointReached),
    Effect {
        effect: &'static str,
    },
}

/// Escalation effects for a server-side session: record and broadcast
struct ApiEffects {
    flags: Arc<Mutex<EffectFlags>>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl ApiEffects {
    fn record(&self, effect: &'static str, set: impl FnOnce(&mut EffectFlags)) {
        set(&mut self.flags.lock());
        let _ = self.update_tx.send(SessionUpdate::Effect { effect });
    }
}

impl SessionEffects for ApiEffects {
    fn stop_survival_clock(&self) {
        self.record("stop_survival_clock", |f| f.clock_stopped = true);
    }

    fn trigger_alert(&self) {
        self.record("trigger_alert", |f| f.alert_triggered = true);
    }

    fn submit_score(&self) {
        self.record("submit_score", |f| f.score_submitted = true);
    }

    fn end_session(&self) {
        self.record("end_session", |f| f.session_over = true);
    }

    fn release_presentation(&self) {
        self.record("release_presentation", |f| f.presentation_released = true);
    }
}

/// Session state
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub guest: bool,
    pub guardian: GuardianEngine,
    pub escalation: EscalationController,
    pub checkpoints: CheckpointScheduler,
    pub clock: SurvivalClock,
    pub flags: Arc<Mutex<EffectFlags>>,
    pub update_tx: broadcast::Sender<SessionUpdate>,
}

impl Session {
    fn new(
        id: String,
        guest: bool,
        guardian_config: GuardianConfig,
        escalation_config: EscalationConfig,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(100);
        let flags = Arc::new(Mutex::new(EffectFlags::default()));
        let effects = Arc::new(ApiEffects {
            flags: Arc::clone(&flags),
            update_tx: update_tx.clone(),
        });
        let escalation_config = EscalationConfig {
            guest,
            ..escalation_config
        };
        Self {
            id,
            guest,
            guardian: GuardianEngine::with_config(guardian_config),
            escalation: EscalationController::new(escalation_config, effects),
            checkpoints: CheckpointScheduler::default(),
            clock: SurvivalClock::new(),
            flags,
            update_tx,
        }
    }

    /// Checkpoints only count while the game is live
    fn is_live(&self) -> bool {
        self.guardian.state() == GameState::Playing
            && self.escalation.phase() != EscalationPhase::Fail
            && self.clock.is_running()
    }

    fn sync_clock(&mut self) {
        if self.flags.lock().clock_stopped {
            self.clock.stop();
        }
    }

    fn status(&self) -> SessionStatusResponse {
        SessionStatusResponse {
            session_id: self.id.clone(),
            guest: self.guest,
            state: self.guardian.state(),
            signal: *self.guardian.signal(),
            consecutive_smirk_frames: self.guardian.consecutive_smirk_frames(),
            warning_zone_frames: self.guardian.warning_zone_frames(),
            calibration_progress: self.guardian.calibration_progress(),
            game_over: self.guardian.is_game_over(),
            game_over_reason: self.guardian.game_over_reason(),
            escalation: self.escalation.phase(),
            survival_secs: self.clock.elapsed_secs(),
            accumulated_bonus: self.checkpoints.accumulated_bonus(),
            effects: *self.flags.lock(),
        }
    }

    fn restart(&mut self) {
        self.guardian.restart();
        self.escalation.resume();
        self.checkpoints.reset();
        self.clock.reset();
        *self.flags.lock() = EffectFlags::default();
    }
}

/// App state
pub struct AppState {
    pub sessions: RwLock<HashMap<String, Session>>,
    pub guardian_config: GuardianConfig,
    pub escalation_config: EscalationConfig,
}

/// Create new session request
#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    #[serde(default)]
    pub guest: bool,
}

/// Create new session response
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Session status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub guest: bool,
    pub state: GameState,
    pub signal: ConditionedSignal,
    pub consecutive_smirk_frames: u32,
    pub warning_zone_frames: u32,
    pub calibration_progress: f64,
    pub game_over: bool,
    pub game_over_reason: Option<GameOverReason>,
    pub escalation: EscalationPhase,
    pub survival_secs: f64,
    pub accumulated_bonus: u32,
    pub effects: EffectFlags,
}

/// Process frame response
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub state: GameState,
    pub signal: ConditionedSignal,
    pub consecutive_smirk_frames: u32,
    pub calibration_progress: f64,
    pub escalation: EscalationPhase,
    pub events: Vec<GuardianEvent>,
    pub checkpoints: Vec<CheckpointReached>,
    pub survival_secs: f64,
    pub game_over: bool,
}

/// Host clock update
#[derive(Debug, Deserialize)]
pub struct ElapsedRequest {
    pub elapsed_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct CheckpointResponse {
    pub reached: Vec<CheckpointReached>,
    pub accumulated_bonus: u32,
    pub hit_thresholds: Vec<f64>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// Create the API router
pub fn create_router(guardian_config: GuardianConfig, escalation_config: EscalationConfig) -> Router {
    let state = Arc::new(AppState {
        sessions: RwLock::new(HashMap::new()),
        guardian_config,
        escalation_config,
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/calibrate", post(start_calibration))
        .route("/session/:id/frame", post(process_frame))
        .route("/session/:id/elapsed", post(update_elapsed))
        .route("/session/:id/end", post(end_game))
        .route("/session/:id/restart", post(restart_session))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Json<NewSessionResponse> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let session = Session::new(
        session_id.clone(),
        req.guest,
        state.guardian_config.clone(),
        state.escalation_config.clone(),
    );

    let mut sessions = state.sessions.write().await;
    sessions.insert(session_id.clone(), session);
    info!(session = %session_id, guest = req.guest, "session created");

    Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
    })
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(session.status()))
}

/// Drop session (pending escalation timers are cancelled with it)
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut sessions = state.sessions.write().await;
    sessions.remove(&id).ok_or(ApiError::SessionNotFound(id.clone()))?;
    info!(session = %id, "session removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Start calibration
async fn start_calibration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
    if !session.guardian.start_calibration() {
        return Err(ApiError::Conflict(format!(
            "cannot calibrate while {}",
            session.guardian.state()
        )));
    }
    Ok(Json(session.status()))
}

/// Process one detection sample
async fn process_frame(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(sample): Json<DetectionSample>,
) -> Result<Json<FrameResponse>, ApiError> {
    sample.validate()?;

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;

    let output = session.guardian.process_detection(&sample);

    if output.events.contains(&GuardianEvent::CalibrationComplete) {
        session.clock.start(sample.timestamp_ms);
    }

    // Relay to the escalation layer
    if let Some((is_smirking, probability)) = output.smirk_report() {
        session
            .escalation
            .report(SmirkReport::new(is_smirking, probability));
    }
    if let Some(reason) = output.game_over() {
        debug!(reason = reason.code(), "guardian game over, committing failure");
        session.escalation.commit_failure();
    }

    session.sync_clock();
    let survival_secs = session.clock.tick(sample.timestamp_ms);
    let checkpoints = if session.is_live() {
        session.checkpoints.update(survival_secs)
    } else {
        Vec::new()
    };

    let escalation = session.escalation.phase();
    let _ = session.update_tx.send(SessionUpdate::Frame {
        state: output.state,
        score: output.signal.happiness_score,
        is_smirking: output.signal.is_smirking,
        consecutive_smirk_frames: output.consecutive_smirk_frames,
        calibration_progress: output.calibration_progress,
        escalation,
        events: output.events.clone(),
    });
    for reached in &checkpoints {
        let _ = session.update_tx.send(SessionUpdate::Checkpoint(*reached));
    }

    Ok(Json(FrameResponse {
        state: output.state,
        signal: output.signal,
        consecutive_smirk_frames: output.consecutive_smirk_frames,
        calibration_progress: output.calibration_progress,
        escalation,
        game_over: output.state == GameState::GameOver,
        events: output.events,
        checkpoints,
        survival_secs,
    }))
}

/// Update checkpoints from a host-driven clock
async fn update_elapsed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ElapsedRequest>,
) -> Result<Json<CheckpointResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;

    session.sync_clock();
    let over = session.guardian.is_game_over()
        || session.escalation.phase() == EscalationPhase::Fail;
    let reached = if over {
        Vec::new()
    } else {
        session.checkpoints.update(req.elapsed_secs)
    };
    for r in &reached {
        let _ = session.update_tx.send(SessionUpdate::Checkpoint(*r));
    }

    Ok(Json(CheckpointResponse {
        reached,
        accumulated_bonus: session.checkpoints.accumulated_bonus(),
        hit_thresholds: session.checkpoints.hit_thresholds(),
    }))
}

/// End the game on request
async fn end_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
    if session.guardian.end_game().is_none() {
        return Err(ApiError::Conflict(format!(
            "no game running ({})",
            session.guardian.state()
        )));
    }
    session.escalation.commit_failure();
    session.sync_clock();
    Ok(Json(session.status()))
}

/// Fresh game in the same session
async fn restart_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
    session.restart();
    info!(session = %session.id, "session restarted");
    Ok(Json(session.status()))
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(ApiError::SessionNotFound(id))?;
    let rx = session.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    }))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<SessionUpdate>) {
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => {
                    let json = serde_json::to_string(&update).unwrap_or_default();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Run the API server
pub async fn run_server(
    addr: SocketAddr,
    guardian_config: GuardianConfig,
    escalation_config: EscalationConfig,
) -> std::io::Result<()> {
    let router = create_router(guardian_config, escalation_config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "smirkguard API listening");
    axum::serve(listener, router).await
}
