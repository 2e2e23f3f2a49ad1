//! Integration tests for the HTTP API
//!
//! Tests session endpoints end to end against the router

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use smirkguard::config::{EscalationConfig, GuardianConfig};
use smirkguard::core::create_router;

const FRAME_MS: f64 = 40.0;

fn create_test_router() -> Router {
    create_router(GuardianConfig::default(), EscalationConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn sample(score: f64, t: f64) -> Value {
    json!({
        "faceDetected": true,
        "eyesOpen": true,
        "happinessScore": score,
        "faceCentered": true,
        "timestamp": t,
    })
}

async fn new_session(app: &Router, guest: bool) -> String {
    let (status, json) = send(app, "POST", "/session/new", Some(json!({ "guest": guest }))).await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_string()
}

/// Calibrate a fresh session into PLAYING, return the next timestamp
async fn start_playing(app: &Router, id: &str) -> f64 {
    let (status, json) = send(app, "POST", &format!("/session/{}/calibrate", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "CALIBRATING");

    let mut t = 0.0;
    loop {
        let (status, json) = send(
            app,
            "POST",
            &format!("/session/{}/frame", id),
            Some(sample(0.02, t)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        t += FRAME_MS;
        if json["state"] == "PLAYING" {
            return t;
        }
        assert!(t < 10_000.0, "calibration never completed");
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], smirkguard::VERSION);
    assert_eq!(json["sessions_active"], 0);
}

#[tokio::test]
async fn test_create_session() {
    let app = create_test_router();
    let (status, json) = send(&app, "POST", "/session/new", Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    let id = json["session_id"].as_str().unwrap();
    assert_eq!(json["websocket_url"], format!("/ws/{}", id));

    let (status, json) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "IDLE");
    assert_eq!(json["guest"], false);
    assert_eq!(json["escalation"], "NORMAL");
}

#[tokio::test]
async fn test_session_not_found() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/session/nonexistent", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_sample_rejected() {
    let app = create_test_router();
    let id = new_session(&app, false).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/session/{}/frame", id),
        Some(sample(1.5, 0.0)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INVALID_SAMPLE");
}

#[tokio::test]
async fn test_calibrate_while_playing_conflicts() {
    let app = create_test_router();
    let id = new_session(&app, false).await;
    start_playing(&app, &id).await;

    let (status, json) = send(&app, "POST", &format!("/session/{}/calibrate", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn test_full_session_flow() {
    let app = create_test_router();
    let id = new_session(&app, false).await;
    let mut t = start_playing(&app, &id).await;

    // Host clock crosses the first checkpoint
    let (status, json) = send(
        &app,
        "POST",
        &format!("/session/{}/elapsed", id),
        Some(json!({ "elapsed_secs": 300.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reached"][0]["bonus_points"], 1000);
    assert_eq!(json["accumulated_bonus"], 1000);

    // Repeating the same time awards nothing
    let (_, json) = send(
        &app,
        "POST",
        &format!("/session/{}/elapsed", id),
        Some(json!({ "elapsed_secs": 300.0 })),
    )
    .await;
    assert_eq!(json["reached"].as_array().unwrap().len(), 0);

    // Held smirk ends the game
    let mut over = false;
    for _ in 0..10 {
        let (_, json) = send(
            &app,
            "POST",
            &format!("/session/{}/frame", id),
            Some(sample(0.9, t)),
        )
        .await;
        t += FRAME_MS;
        if json["game_over"] == true {
            over = true;
            break;
        }
    }
    assert!(over);

    let (_, json) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(json["state"], "GAME_OVER");
    assert_eq!(json["game_over_reason"], "smirk_detected");
    assert_eq!(json["escalation"], "FAIL");
    assert_eq!(json["effects"]["clock_stopped"], true);
    assert_eq!(json["effects"]["alert_triggered"], true);

    // No more checkpoints once failed
    let (_, json) = send(
        &app,
        "POST",
        &format!("/session/{}/elapsed", id),
        Some(json!({ "elapsed_secs": 900.0 })),
    )
    .await;
    assert_eq!(json["accumulated_bonus"], 1000);

    // Restart goes straight back into calibration with a clean slate
    let (status, json) = send(&app, "POST", &format!("/session/{}/restart", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "CALIBRATING");
    assert_eq!(json["escalation"], "NORMAL");
    assert_eq!(json["accumulated_bonus"], 0);
    assert_eq!(json["effects"]["alert_triggered"], false);
}

#[tokio::test]
async fn test_end_game_on_request() {
    let app = create_test_router();
    let id = new_session(&app, true).await;

    // Nothing running yet
    let (status, _) = send(&app, "POST", &format!("/session/{}/end", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    start_playing(&app, &id).await;
    let (status, json) = send(&app, "POST", &format!("/session/{}/end", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["game_over_reason"], "user_requested");
    assert_eq!(json["guest"], true);
    assert_eq!(json["escalation"], "FAIL");
}

#[tokio::test]
async fn test_delete_session() {
    let app = create_test_router();
    let id = new_session(&app, false).await;

    let (status, _) = send(&app, "DELETE", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(json["sessions_active"], 0);
}
