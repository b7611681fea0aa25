//! Streaming voice session controller
//!
//! The per-session machinery that turns raw VAD boundaries into a clean,
//! ordered event stream:
//! - [`segment::SegmentNormalizer`] repairs open-ended boundary pairs
//! - [`buffer::AudioRingBuffer`] accumulates session audio
//! - [`debounce::DebounceTimer`] guards state transitions
//! - [`state_machine::SessionStateMachine`] decides when speech really
//!   starts and stops
//! - [`wakeword::WakewordArbiter`] handles barge-in
//! - [`registry::SessionRegistry`] tracks live sessions
//! - [`driver::SessionDriver`] wires one connection's collaborators together

pub mod buffer;
pub mod debounce;
pub mod driver;
pub mod registry;
pub mod segment;
pub mod sink;
pub mod state_machine;
pub mod wakeword;

pub use buffer::AudioRingBuffer;
pub use debounce::DebounceTimer;
pub use driver::SessionDriver;
pub use registry::{SessionHandle, SessionRegistry};
pub use segment::{merge_segments, SegmentNormalizer};
pub use sink::{ChannelSink, CollectingSink, SessionEvent};
pub use state_machine::{SessionState, SessionStateMachine};
pub use wakeword::WakewordArbiter;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] voicegate_core::Error),

    #[error("session registry: {0}")]
    Registry(String),
}
