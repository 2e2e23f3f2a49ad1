//! Error types for the edges of the pipeline
//!
//! The per-frame path never fails; these cover input validation,
//! configuration and the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// A detection sample that does not satisfy the wire contract
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("happiness score is not a finite number")]
    NonFiniteScore,
    #[error("happiness score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),
    #[error("timestamp is not a finite number")]
    NonFiniteTimestamp,
    #[error("eye openness ({left}, {right}) is not a valid measurement")]
    InvalidEyeOpenness { left: f64, right: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("enter threshold {enter} must be >= exit threshold {exit}")]
    InvertedHysteresis { enter: f64, exit: f64 },
    #[error("smoothing alpha {0} must be in (0, 1)")]
    InvalidAlpha(f64),
    #[error("{name} must be greater than zero")]
    ZeroCount { name: &'static str },
    #[error("calibration stability window {0} ms must be positive and finite")]
    InvalidStabilityWindow(f64),
    #[error("face-lost warning at {warning} frames must come before the timeout at {timeout}")]
    WarningAfterTimeout { warning: u32, timeout: u32 },
    #[error("escalation neutral threshold {neutral} must be below fail threshold {fail}")]
    InvertedEscalation { neutral: f64, fail: f64 },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("invalid detection sample: {0}")]
    InvalidSample(#[from] SampleError),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidSample(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidSample(_) => "INVALID_SAMPLE",
            Self::Conflict(_) => "CONFLICT",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
