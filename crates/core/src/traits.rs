//! Capability and collaborator traits
//!
//! The session state machine is synchronous and never blocks; anything that
//! does real work (transport framing, model inference) lives behind one of
//! these traits and is constructed explicitly at startup, so sessions can be
//! tested with fakes.

use crate::audio::AudioChunk;
use crate::boundary::{KeywordScore, RawBoundary};
use crate::error::Result;

/// Observer interface for session-level events.
///
/// Implemented once by the transport layer (or a test harness) and passed by
/// reference into each session. Implementations must not block: the state
/// machine calls these inline from its synchronous operations. They observe
/// only; they never mutate session state.
pub trait EventSink: Send + Sync {
    /// A debounced voice segment has started.
    fn on_voice_start(&self);

    /// An audio chunk arrived while speech is active. Fired per inbound
    /// chunk so downstream KWS/ASR streaming never waits for finalization.
    fn on_voice_active(&self, chunk: &AudioChunk, elapsed_ms: u64);

    /// A voice segment was confirmed over: drained audio plus the segment's
    /// `[start_ms, end_ms]` interval in session-local audio time.
    fn on_voice_end(&self, audio: Vec<f32>, start_ms: u64, end_ms: u64);

    /// The session was interrupted (wake-word barge-in); buffered audio was
    /// discarded and no `on_voice_end` will fire for the aborted segment.
    fn on_interrupt(&self);
}

/// Boundary interface to the external VAD engine.
///
/// The engine consumes fixed-format audio and reports raw boundary batches;
/// inference itself happens outside the session controller and the results
/// come back in as plain data.
pub trait VadEngine: Send {
    /// Feed one audio chunk; returns the raw boundaries produced for it
    /// (often empty for streaming engines).
    fn process(&mut self, chunk: &AudioChunk) -> Result<Vec<RawBoundary>>;

    /// Flush the engine at end of stream, returning any final boundaries.
    fn finish(&mut self) -> Result<Vec<RawBoundary>>;

    /// Reset engine state for a fresh stream.
    fn reset(&mut self);
}

/// Boundary interface to the external keyword-spotting engine.
pub trait KeywordSpotter: Send {
    /// Feed one audio chunk; returns a score when the engine has one.
    fn process(&mut self, chunk: &AudioChunk) -> Result<Option<KeywordScore>>;

    /// Reset spotter state for a fresh stream.
    fn reset(&mut self);
}
