//! Session-scoped audio accumulation buffer
//!
//! Appends canonical f32 samples and keeps a monotonic total-sample counter
//! that acts as the session clock: draining or clearing discards samples but
//! never rewinds the counter, so boundary timestamps remain comparable
//! across utterances within one session.

use voicegate_config::BufferConfig;
use voicegate_core::{AudioChunk, Error, Result};

/// Append-only accumulator of decoded audio samples, owned exclusively by
/// one `SessionStateMachine`.
#[derive(Debug)]
pub struct AudioRingBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Lifetime sample count; the session clock.
    total_pushed: u64,
    /// Optional lookback cap; `None` means unbounded accumulation.
    max_samples: Option<usize>,
}

impl AudioRingBuffer {
    /// Unbounded buffer (the core contract).
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            total_pushed: 0,
            max_samples: None,
        }
    }

    /// Bounded variant for lookback-only use cases: keeps at most
    /// `max_duration_ms` of trailing audio, trimming from the front.
    pub fn with_lookback(sample_rate: u32, max_duration_ms: u64) -> Self {
        let max_samples = (sample_rate as u64 * max_duration_ms / 1000) as usize;
        Self {
            samples: Vec::with_capacity(max_samples),
            sample_rate,
            total_pushed: 0,
            max_samples: Some(max_samples),
        }
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        match config.max_duration_ms {
            Some(ms) => Self::with_lookback(config.sample_rate, ms),
            None => Self::new(config.sample_rate),
        }
    }

    /// Append a chunk's samples and advance the session clock.
    ///
    /// The chunk is already canonical f32 (validated at ingestion); the only
    /// remaining format error is a sample-rate mismatch.
    pub fn push(&mut self, chunk: &AudioChunk) -> Result<()> {
        if chunk.sample_rate.as_u32() != self.sample_rate {
            return Err(Error::InvalidSampleFormat(format!(
                "chunk rate {} does not match buffer rate {}",
                chunk.sample_rate.as_u32(),
                self.sample_rate
            )));
        }

        self.samples.extend(chunk.samples.iter());
        self.total_pushed += chunk.samples.len() as u64;

        if let Some(max) = self.max_samples {
            if self.samples.len() > max {
                let excess = self.samples.len() - max;
                self.samples.drain(0..excess);
            }
        }
        Ok(())
    }

    /// Elapsed session time in milliseconds, derived from every sample ever
    /// pushed. Monotonic: unaffected by `drain_all`/`clear`.
    pub fn total_duration_ms(&self) -> u64 {
        self.total_pushed * 1000 / self.sample_rate as u64
    }

    /// Duration of the samples currently held.
    pub fn buffered_duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Return and clear the accumulated samples.
    pub fn drain_all(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    /// Discard accumulated samples without returning them.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
