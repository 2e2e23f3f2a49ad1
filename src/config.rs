//! Runtime configuration
//!
//! Defaults come from the constants in the crate root. The binaries can
//! override the main tunables through the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{
    CALIBRATION_GRACE_FRAMES, CALIBRATION_MIN_FRAMES, CALIBRATION_STABILITY_MS,
    ESCALATION_FAIL_THRESHOLD, ESCALATION_FINALIZE_DELAY_MS, ESCALATION_NEUTRAL_THRESHOLD,
    ESCALATION_WARNING_MS, EYES_DEBOUNCE_FRAMES, FACE_DEBOUNCE_OFF_FRAMES,
    FACE_DEBOUNCE_ON_FRAMES, FACE_LOST_TIMEOUT_FRAMES, FACE_LOST_WARNING_FRAMES,
    NEUTRAL_THRESHOLD, SMIRK_ENTER_THRESHOLD, SMIRK_EXIT_THRESHOLD, SMIRK_FRAMES_REQUIRED,
    SMIRK_RESET_GRACE_FRAMES, SMOOTHING_ALPHA,
};

/// Tunables for the per-frame pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianConfig {
    pub face_on_frames: u32,
    pub face_off_frames: u32,
    pub eyes_debounce_frames: u32,
    pub smoothing_alpha: f64,
    pub enter_threshold: f64,
    pub exit_threshold: f64,
    pub neutral_threshold: f64,
    pub calibration_stability_ms: f64,
    pub calibration_min_frames: u32,
    pub calibration_grace_frames: u32,
    pub smirk_frames_required: u32,
    pub smirk_reset_grace_frames: u32,
    pub face_lost_warning_frames: u32,
    pub face_lost_timeout_frames: u32,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            face_on_frames: FACE_DEBOUNCE_ON_FRAMES,
            face_off_frames: FACE_DEBOUNCE_OFF_FRAMES,
            eyes_debounce_frames: EYES_DEBOUNCE_FRAMES,
            smoothing_alpha: SMOOTHING_ALPHA,
            enter_threshold: SMIRK_ENTER_THRESHOLD,
            exit_threshold: SMIRK_EXIT_THRESHOLD,
            neutral_threshold: NEUTRAL_THRESHOLD,
            calibration_stability_ms: CALIBRATION_STABILITY_MS,
            calibration_min_frames: CALIBRATION_MIN_FRAMES,
            calibration_grace_frames: CALIBRATION_GRACE_FRAMES,
            smirk_frames_required: SMIRK_FRAMES_REQUIRED,
            smirk_reset_grace_frames: SMIRK_RESET_GRACE_FRAMES,
            face_lost_warning_frames: FACE_LOST_WARNING_FRAMES,
            face_lost_timeout_frames: FACE_LOST_TIMEOUT_FRAMES,
        }
    }
}

impl GuardianConfig {
    /// Defaults with `SMIRK_THRESHOLD`, `SMIRK_EXIT_THRESHOLD`,
    /// `NEUTRAL_THRESHOLD`, `SMOOTHING_ALPHA`, `CONSECUTIVE_FRAMES_REQUIRED`
    /// and `FACE_LOST_TIMEOUT_FRAMES` applied from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = env_parse("SMIRK_THRESHOLD")? {
            config.enter_threshold = v;
        }
        if let Some(v) = env_parse("SMIRK_EXIT_THRESHOLD")? {
            config.exit_threshold = v;
        }
        if let Some(v) = env_parse("NEUTRAL_THRESHOLD")? {
            config.neutral_threshold = v;
        }
        if let Some(v) = env_parse("SMOOTHING_ALPHA")? {
            config.smoothing_alpha = v;
        }
        if let Some(v) = env_parse("CONSECUTIVE_FRAMES_REQUIRED")? {
            config.smirk_frames_required = v;
        }
        if let Some(v) = env_parse("FACE_LOST_TIMEOUT_FRAMES")? {
            config.face_lost_timeout_frames = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enter_threshold < self.exit_threshold {
            return Err(ConfigError::InvertedHysteresis {
                enter: self.enter_threshold,
                exit: self.exit_threshold,
            });
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(self.smoothing_alpha));
        }
        let counts = [
            ("face_on_frames", self.face_on_frames),
            ("face_off_frames", self.face_off_frames),
            ("eyes_debounce_frames", self.eyes_debounce_frames),
            ("smirk_frames_required", self.smirk_frames_required),
            ("face_lost_timeout_frames", self.face_lost_timeout_frames),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::ZeroCount { name });
            }
        }
        if !(self.calibration_stability_ms.is_finite() && self.calibration_stability_ms > 0.0) {
            return Err(ConfigError::InvalidStabilityWindow(
                self.calibration_stability_ms,
            ));
        }
        if self.face_lost_warning_frames >= self.face_lost_timeout_frames {
            return Err(ConfigError::WarningAfterTimeout {
                warning: self.face_lost_warning_frames,
                timeout: self.face_lost_timeout_frames,
            });
        }
        Ok(())
    }
}

/// Tunables for the session-level escalation controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Lower bound of the warning zone
    pub neutral_threshold: f64,
    /// Immediate fail at or above this probability
    pub fail_threshold: f64,
    pub warning_duration: Duration,
    pub finalize_delay: Duration,
    /// Guest sessions never submit a score
    pub guest: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            neutral_threshold: ESCALATION_NEUTRAL_THRESHOLD,
            fail_threshold: ESCALATION_FAIL_THRESHOLD,
            warning_duration: Duration::from_millis(ESCALATION_WARNING_MS),
            finalize_delay: Duration::from_millis(ESCALATION_FINALIZE_DELAY_MS),
            guest: false,
        }
    }
}

impl EscalationConfig {
    pub fn guest() -> Self {
        Self {
            guest: true,
            ..Self::default()
        }
    }

    /// Defaults with `SMILE_THRESHOLD` (fail) and `ESCALATION_WARNING_MS`
    /// applied from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = env_parse("SMILE_THRESHOLD")? {
            config.fail_threshold = v;
        }
        if let Some(ms) = env_parse::<u64>("ESCALATION_WARNING_MS")? {
            config.warning_duration = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.neutral_threshold >= self.fail_threshold {
            return Err(ConfigError::InvertedEscalation {
                neutral: self.neutral_threshold,
                fail: self.fail_threshold,
            });
        }
        Ok(())
    }
}

/// Where the API server listens and how loudly it logs
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: env_parse("HOST")?.unwrap_or(defaults.host),
            port: env_parse("PORT")?.unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
