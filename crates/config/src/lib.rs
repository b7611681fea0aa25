//! Configuration management for the voicegate session controller
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (VOICEGATE_ prefix)
//!
//! Every threshold the session state machine consumes is named here with a
//! serde default, so a bare deployment runs with the documented behavior.

pub mod settings;

pub use settings::{
    load_settings, BufferConfig, RegistryConfig, SessionConfig, Settings, WakewordConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
