//! Per-connection session driver
//!
//! Owns one state machine plus the external collaborators for its
//! connection: a VAD engine, an optional keyword spotter, and the wake-word
//! arbiter. The transport's receive loop feeds decoded chunks and control
//! calls in; all inference results come back as plain data and are applied
//! synchronously, in arrival order.

use voicegate_core::{AudioChunk, ClosedSegment, KeywordScore, KeywordSpotter, VadEngine};

use crate::segment::SegmentNormalizer;
use crate::state_machine::SessionStateMachine;
use crate::wakeword::WakewordArbiter;
use crate::SessionError;

pub struct SessionDriver<V: VadEngine, K: KeywordSpotter> {
    machine: SessionStateMachine,
    vad: V,
    kws: Option<K>,
    arbiter: WakewordArbiter,
    /// Batch-mode view of the session's segments, reported at `finish`.
    segments: SegmentNormalizer,
    collected: Vec<ClosedSegment>,
}

impl<V: VadEngine, K: KeywordSpotter> SessionDriver<V, K> {
    pub fn new(
        machine: SessionStateMachine,
        vad: V,
        kws: Option<K>,
        arbiter: WakewordArbiter,
        segments: SegmentNormalizer,
    ) -> Self {
        Self {
            machine,
            vad,
            kws,
            arbiter,
            segments,
            collected: Vec::new(),
        }
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SessionStateMachine {
        &mut self.machine
    }

    /// Feed one decoded audio chunk through the whole per-session path:
    /// buffer it, run the VAD, apply any boundaries, run the keyword spotter
    /// while speech is active, then resolve timers on the audio clock.
    pub fn process_chunk(&mut self, chunk: &AudioChunk) -> Result<(), SessionError> {
        self.machine.add_audio_chunk(chunk)?;

        let boundaries = self.vad.process(chunk)?;
        if !boundaries.is_empty() {
            self.collected.extend(self.segments.repair_batch(&boundaries));
            self.machine.update_boundaries(&boundaries)?;
        }

        if self.machine.is_speech_active() {
            if let Some(kws) = self.kws.as_mut() {
                if let Some(score) = kws.process(chunk)? {
                    self.on_keyword_score(&score);
                }
            }
        }

        let now = self.machine.elapsed_ms();
        self.machine.tick(now)?;
        Ok(())
    }

    /// Apply a keyword score from an out-of-band KWS path.
    pub fn on_keyword_score(&mut self, score: &KeywordScore) -> bool {
        self.arbiter.on_keyword_score(&mut self.machine, score)
    }

    /// Resolve pending debounce states against the caller's clock.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), SessionError> {
        self.machine.tick(now_ms)?;
        Ok(())
    }

    /// End of stream ("stop" command): flush the VAD engine, apply its final
    /// boundaries, finalize any segment in progress, and report the
    /// session's merged segment list.
    pub fn finish(&mut self) -> Result<Vec<ClosedSegment>, SessionError> {
        let final_boundaries = self.vad.finish()?;
        if !final_boundaries.is_empty() {
            self.collected
                .extend(self.segments.repair_batch(&final_boundaries));
            self.machine.update_boundaries(&final_boundaries)?;
        }
        self.machine.flush()?;

        let total = self.machine.elapsed_ms();
        let mut all = std::mem::take(&mut self.collected);
        all.extend(self.segments.finalize(total));
        Ok(self.segments.merge(all))
    }

    /// Reset everything for a fresh stream on the same connection.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.vad.reset();
        if let Some(kws) = self.kws.as_mut() {
            kws.reset();
        }
        self.arbiter.reset();
        self.segments.clear();
        self.collected.clear();
    }
}
