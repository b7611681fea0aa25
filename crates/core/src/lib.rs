//! Core types and traits for the voicegate session controller
//!
//! This crate provides the foundational types used across the workspace:
//! - Audio chunk types with single-point sample-format validation
//! - Typed VAD boundaries and closed segments
//! - The `EventSink` capability interface and collaborator traits
//! - Error types

pub mod audio;
pub mod boundary;
pub mod error;
pub mod traits;

pub use audio::{AudioChunk, SampleRate};
pub use boundary::{ClosedSegment, KeywordScore, RawBoundary, UNKNOWN_ENDPOINT};
pub use error::{Error, Result};
pub use traits::{EventSink, KeywordSpotter, VadEngine};
