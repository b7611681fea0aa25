//! Error types shared across the workspace
//!
//! Recoverable input errors (`InvalidSampleFormat`, `MalformedBoundary`) are
//! skipped and logged by the caller; `InvalidStateTransition` marks a logic
//! fault that requires a session `reset()`, never silent recovery.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Inbound audio was neither normalized f32 nor 16-bit signed PCM.
    #[error("invalid sample format: {0}")]
    InvalidSampleFormat(String),

    /// A raw VAD boundary had the wrong arity or an inverted interval.
    /// Dropped by the caller, not propagated through the batch.
    #[error("malformed boundary: {0}")]
    MalformedBoundary(String),

    /// The transition table was violated. Should be unreachable; when hit
    /// the session must be reset.
    #[error("invalid state transition: {state} on {input}")]
    InvalidStateTransition { state: String, input: String },
}

pub type Result<T> = std::result::Result<T, Error>;
