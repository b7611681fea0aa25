//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Session state-machine thresholds
    #[serde(default)]
    pub session: SessionConfig,

    /// Audio buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Wake-word arbiter configuration
    #[serde(default)]
    pub wakeword: WakewordConfig,

    /// Session registry limits
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Debounce and timeout thresholds for the session state machine.
///
/// All values are milliseconds of session-local audio time. The continuation
/// window and the start debounce overlap in effect (both suppress spurious
/// restarts) but are deliberately independent knobs with no derived
/// relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long an observed start must persist before `voice_start` fires
    #[serde(default = "default_start_debounce_ms")]
    pub start_debounce_ms: u64,

    /// How long after an observed close before `voice_end` is confirmed
    #[serde(default = "default_end_debounce_ms")]
    pub end_debounce_ms: u64,

    /// Candidates shorter than this never produce a segment
    #[serde(default = "default_min_speech_duration_ms")]
    pub min_speech_duration_ms: u64,

    /// A new start this soon after a close continues the same utterance
    #[serde(default = "default_continuation_window_ms")]
    pub continuation_window_ms: u64,

    /// Forced end when speech stays open with no activity this long
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,

    /// Adjacent segments closer than this are merged
    #[serde(default = "default_merge_gap_ms")]
    pub merge_gap_ms: u64,

    /// Starts earlier than this are onset artifacts
    #[serde(default = "default_onset_guard_ms")]
    pub onset_guard_ms: u64,

    /// Discard onset artifacts (fixed policy; disable only for diagnostics)
    #[serde(default = "default_true")]
    pub discard_onset_artifacts: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_debounce_ms: default_start_debounce_ms(),
            end_debounce_ms: default_end_debounce_ms(),
            min_speech_duration_ms: default_min_speech_duration_ms(),
            continuation_window_ms: default_continuation_window_ms(),
            silence_timeout_ms: default_silence_timeout_ms(),
            merge_gap_ms: default_merge_gap_ms(),
            onset_guard_ms: default_onset_guard_ms(),
            discard_onset_artifacts: true,
        }
    }
}

/// Audio accumulation buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Sample rate in Hz (the VAD contract rate)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Optional lookback cap in milliseconds. `None` means unbounded
    /// accumulation for the lifetime of the segment (the core contract);
    /// set for lookback-only use cases.
    #[serde(default)]
    pub max_duration_ms: Option<u64>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            max_duration_ms: None,
        }
    }
}

/// Wake-word arbiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakewordConfig {
    /// Minimum keyword score to trigger a barge-in
    #[serde(default = "default_wakeword_threshold")]
    pub threshold: f32,
}

impl Default for WakewordConfig {
    fn default() -> Self {
        Self {
            threshold: default_wakeword_threshold(),
        }
    }
}

/// Session registry limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum concurrent sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle session expiry in seconds
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Background cleanup interval in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            session_timeout_secs: default_session_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_start_debounce_ms() -> u64 {
    200
}

fn default_end_debounce_ms() -> u64 {
    600
}

fn default_min_speech_duration_ms() -> u64 {
    200
}

fn default_continuation_window_ms() -> u64 {
    800
}

fn default_silence_timeout_ms() -> u64 {
    1000
}

fn default_merge_gap_ms() -> u64 {
    50
}

fn default_onset_guard_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_wakeword_threshold() -> f32 {
    0.5
}

fn default_max_sessions() -> usize {
    256
}

fn default_session_timeout_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

/// Load settings from an optional TOML file plus `VOICEGATE_` environment
/// overrides (e.g. `VOICEGATE_SESSION__END_DEBOUNCE_MS=400`).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(Environment::with_prefix("VOICEGATE").separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Reject configurations the state machine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "buffer.sample_rate".into(),
                message: "must be non-zero".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.wakeword.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "wakeword.threshold".into(),
                message: "must be within [0, 1]".into(),
            });
        }
        if self.session.silence_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.silence_timeout_ms".into(),
                message: "must be non-zero".into(),
            });
        }
        Ok(())
    }
}
