//! Per-session voice event state machine
//!
//! Turns noisy raw VAD boundaries into a clean, ordered event sequence:
//! `voice_start`, `voice_active`, `voice_end`, `interrupt`. Two debounce
//! timers guard the transitions (a start must persist before it counts, an
//! end must stay quiet before it is confirmed), a continuation window stitches
//! short gaps back into one utterance, and a silence timeout force-closes a
//! segment the VAD never reported an end for.
//!
//! One instance per client connection, mutated only by that connection's
//! receive loop. Every operation is synchronous and non-blocking; time is
//! session-local audio time derived from the owned buffer's sample counter,
//! except `tick`, which takes the caller's clock explicitly.

use std::sync::Arc;

use voicegate_config::{BufferConfig, SessionConfig};
use voicegate_core::{AudioChunk, ClosedSegment, Error, EventSink, RawBoundary, Result};

use crate::buffer::AudioRingBuffer;
use crate::debounce::DebounceTimer;
use crate::segment::SegmentNormalizer;

/// Externally, only `Idle` and `Speaking` are observable; the pending states
/// are debounce sub-states that never reach the `EventSink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Start observed, not yet confirmed by the start debounce.
    PendingStart,
    Speaking,
    /// Close observed, not yet confirmed by the end debounce.
    PendingEnd,
}

/// The per-session controller: owns the audio buffer, the normalizer's
/// pending-open stack, and both debounce timers; emits through a shared
/// [`EventSink`].
pub struct SessionStateMachine {
    state: SessionState,
    config: SessionConfig,
    buffer: AudioRingBuffer,
    normalizer: SegmentNormalizer,
    start_debounce: DebounceTimer,
    end_debounce: DebounceTimer,
    /// Boundary timestamp of the unconfirmed start candidate.
    candidate_start_ms: Option<u64>,
    /// Boundary timestamp of the confirmed speech start.
    speech_start_ms: Option<u64>,
    /// Latest close boundary timestamp; the segment's end once confirmed.
    pending_close_ms: Option<u64>,
    /// Session time of the last speech activity, for the silence timeout.
    last_active_ms: Option<u64>,
    /// Session time at which the last close was observed (continuation window).
    last_close_observed_ms: Option<u64>,
    sink: Arc<dyn EventSink>,
}

impl SessionStateMachine {
    pub fn new(
        session_config: SessionConfig,
        buffer_config: &BufferConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let normalizer = SegmentNormalizer::new(
            session_config.merge_gap_ms,
            session_config.onset_guard_ms,
            session_config.discard_onset_artifacts,
        );
        let start_debounce = DebounceTimer::new(session_config.start_debounce_ms);
        let end_debounce = DebounceTimer::new(session_config.end_debounce_ms);
        Self {
            state: SessionState::Idle,
            config: session_config,
            buffer: AudioRingBuffer::from_config(buffer_config),
            normalizer,
            start_debounce,
            end_debounce,
            candidate_start_ms: None,
            speech_start_ms: None,
            pending_close_ms: None,
            last_active_ms: None,
            last_close_observed_ms: None,
            sink,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Elapsed session time in milliseconds (audio clock).
    pub fn elapsed_ms(&self) -> u64 {
        self.buffer.total_duration_ms()
    }

    /// External view: a segment is in progress (confirmed start, end not yet
    /// confirmed).
    pub fn is_speech_active(&self) -> bool {
        matches!(self.state, SessionState::Speaking | SessionState::PendingEnd)
    }

    /// A wake-word barge-in makes sense only while a segment is in progress.
    pub fn is_interrupt_eligible(&self) -> bool {
        self.is_speech_active()
    }

    /// Buffer an inbound audio chunk and advance the session clock.
    ///
    /// While a segment is in progress the chunk is forwarded immediately via
    /// `on_voice_active`, so downstream KWS/ASR streaming never waits for
    /// finalization.
    pub fn add_audio_chunk(&mut self, chunk: &AudioChunk) -> Result<()> {
        self.buffer.push(chunk)?;
        let now = self.buffer.total_duration_ms();

        if self.is_speech_active() {
            if self.state == SessionState::Speaking {
                self.last_active_ms = Some(now);
            }
            self.sink.on_voice_active(chunk, now);
        }
        Ok(())
    }

    /// Consume a raw boundary batch in arrival order.
    pub fn update_boundaries(&mut self, batch: &[RawBoundary]) -> Result<()> {
        let now = self.buffer.total_duration_ms();

        for boundary in batch {
            match *boundary {
                RawBoundary::Open { start_ms } => {
                    if self.normalizer.push_open(start_ms) {
                        self.handle_open(start_ms, now)?;
                    }
                }
                RawBoundary::Close { end_ms } => {
                    if let Some(seg) = self.normalizer.close(end_ms) {
                        self.handle_close(seg, now)?;
                    }
                }
                RawBoundary::Closed { start_ms, end_ms } => {
                    let opened = self.normalizer.push_open(start_ms);
                    if opened {
                        self.handle_open(start_ms, now)?;
                    }
                    if let Some(seg) = self.normalizer.close(end_ms) {
                        self.handle_close(seg, now)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve pending debounce states and the silence timeout. Called
    /// periodically by the transport's receive loop; never reorders pending
    /// evidence, only evaluates timer expiry against `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Result<()> {
        if self.state == SessionState::PendingEnd && self.end_debounce.is_confirmed(now_ms) {
            self.finalize_segment(now_ms)?;
        }

        if self.state == SessionState::PendingStart && self.start_debounce.is_confirmed(now_ms) {
            self.confirm_start(now_ms)?;
        }

        if self.state == SessionState::Speaking {
            if let Some(last_active) = self.last_active_ms {
                if now_ms.saturating_sub(last_active) > self.config.silence_timeout_ms {
                    tracing::debug!(now_ms, last_active, "silence timeout, forcing voice end");
                    self.pending_close_ms = Some(now_ms);
                    self.finalize_segment(now_ms)?;
                }
            }
        }
        Ok(())
    }

    /// Unconditional barge-in: back to `Idle`, buffered audio discarded, an
    /// `interrupt` event instead of a `voice_end`.
    pub fn interrupt(&mut self) {
        self.clear_transient();
        self.buffer.clear();
        self.state = SessionState::Idle;
        self.sink.on_interrupt();
    }

    /// Unconditionally return to `Idle` with no event. The only sanctioned
    /// recovery from a stuck session.
    pub fn reset(&mut self) {
        self.clear_transient();
        self.buffer.clear();
        self.state = SessionState::Idle;
    }

    /// End-of-stream: resolve whatever is pending right now. A segment in
    /// progress is finalized at the current session time; an unconfirmed
    /// start candidate is discarded.
    pub fn flush(&mut self) -> Result<()> {
        let now = self.buffer.total_duration_ms();
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::PendingStart => {
                self.clear_transient();
                self.buffer.clear();
                self.state = SessionState::Idle;
                Ok(())
            }
            SessionState::Speaking | SessionState::PendingEnd => {
                if self.pending_close_ms.is_none() {
                    self.pending_close_ms = Some(now);
                }
                self.finalize_segment(now)
            }
        }
    }

    fn handle_open(&mut self, start_ms: u64, now: u64) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                self.candidate_start_ms = Some(start_ms);
                self.start_debounce.arm(now);
                self.state = SessionState::PendingStart;
                tracing::debug!(start_ms, now, "start candidate armed");
            }
            SessionState::PendingStart => {
                // first observation wins; keep the original candidate
            }
            SessionState::Speaking => {
                self.last_active_ms = Some(now);
            }
            SessionState::PendingEnd => {
                let within_window = self
                    .last_close_observed_ms
                    .map(|t| now.saturating_sub(t) < self.config.continuation_window_ms)
                    .unwrap_or(false);

                if within_window {
                    // same utterance continuing: no second voice_start
                    self.end_debounce.cancel();
                    self.pending_close_ms = None;
                    self.state = SessionState::Speaking;
                    self.last_active_ms = Some(now);
                    tracing::debug!(start_ms, now, "speech continuation, end debounce cancelled");
                } else {
                    // the gap is real: close out the previous segment, then
                    // treat this open as a fresh candidate
                    self.finalize_segment(now)?;
                    // finalize cleared the pending-open stack; this open
                    // belongs to the new utterance
                    self.normalizer.push_open(start_ms);
                    self.candidate_start_ms = Some(start_ms);
                    self.start_debounce.arm(now);
                    self.state = SessionState::PendingStart;
                }
            }
        }
        Ok(())
    }

    fn handle_close(&mut self, seg: ClosedSegment, now: u64) -> Result<()> {
        self.last_close_observed_ms = Some(now);

        match self.state {
            SessionState::Idle => {
                // close with no tracked start: stale evidence, nothing to end
                tracing::debug!(end_ms = seg.end_ms, "ignoring close while idle");
            }
            SessionState::PendingStart => {
                let candidate = self.candidate_start_ms.ok_or_else(|| {
                    Error::InvalidStateTransition {
                        state: "PendingStart".into(),
                        input: "close without candidate".into(),
                    }
                })?;
                self.start_debounce.cancel();
                self.candidate_start_ms = None;

                let duration = seg.end_ms.saturating_sub(candidate);
                if duration < self.config.min_speech_duration_ms {
                    tracing::debug!(duration, "candidate too short, discarded as noise");
                    self.buffer.clear();
                    self.state = SessionState::Idle;
                } else {
                    // confirm retroactively, then proceed to end handling
                    self.speech_start_ms = Some(candidate);
                    self.state = SessionState::Speaking;
                    self.last_active_ms = Some(now);
                    self.sink.on_voice_start();

                    self.pending_close_ms = Some(seg.end_ms);
                    self.end_debounce.arm(now);
                    self.state = SessionState::PendingEnd;
                }
            }
            SessionState::Speaking => {
                self.pending_close_ms = Some(seg.end_ms);
                self.end_debounce.arm(now);
                self.state = SessionState::PendingEnd;
                tracing::debug!(end_ms = seg.end_ms, now, "end candidate armed");
            }
            SessionState::PendingEnd => {
                // later close evidence extends the segment; the debounce
                // countdown keeps its first observation
                self.pending_close_ms = Some(seg.end_ms);
            }
        }
        Ok(())
    }

    fn confirm_start(&mut self, now: u64) -> Result<()> {
        let candidate =
            self.candidate_start_ms
                .take()
                .ok_or_else(|| Error::InvalidStateTransition {
                    state: "PendingStart".into(),
                    input: "confirm without candidate".into(),
                })?;
        self.start_debounce.cancel();
        self.speech_start_ms = Some(candidate);
        self.last_active_ms = Some(now);
        self.state = SessionState::Speaking;
        tracing::debug!(start_ms = candidate, now, "voice start confirmed");
        self.sink.on_voice_start();
        Ok(())
    }

    fn finalize_segment(&mut self, now: u64) -> Result<()> {
        let start_ms = self
            .speech_start_ms
            .ok_or_else(|| Error::InvalidStateTransition {
                state: format!("{:?}", self.state),
                input: "finalize without speech start".into(),
            })?;
        let end_ms = self.pending_close_ms.unwrap_or(now);

        let duration = end_ms.saturating_sub(start_ms);
        if duration >= self.config.min_speech_duration_ms {
            let audio = self.buffer.drain_all();
            tracing::debug!(start_ms, end_ms, samples = audio.len(), "voice end confirmed");
            self.sink.on_voice_end(audio, start_ms, end_ms);
        } else {
            tracing::debug!(duration, "segment too short at finalize, discarded");
            self.buffer.clear();
        }

        self.clear_transient();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Clear all per-utterance state: timers, candidates, continuation
    /// tracking, and the normalizer's pending opens.
    fn clear_transient(&mut self) {
        self.start_debounce.cancel();
        self.end_debounce.cancel();
        self.candidate_start_ms = None;
        self.speech_start_ms = None;
        self.pending_close_ms = None;
        self.last_active_ms = None;
        self.last_close_observed_ms = None;
        self.normalizer.clear();
    }

    #[cfg(test)]
    pub(crate) fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    #[cfg(test)]
    pub(crate) fn has_armed_timers(&self) -> bool {
        self.start_debounce.is_armed() || self.end_debounce.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{CollectingSink, SessionEvent};
    use voicegate_core::SampleRate;

    fn machine(sink: Arc<CollectingSink>) -> SessionStateMachine {
        SessionStateMachine::new(SessionConfig::default(), &BufferConfig::default(), sink)
    }

    /// Push `ms` milliseconds of audio at 16kHz.
    fn push_audio(m: &mut SessionStateMachine, ms: u64, seq: u64) {
        let chunk =
            AudioChunk::from_f32(vec![0.1; (ms * 16) as usize], SampleRate::Hz16000, seq).unwrap();
        m.add_audio_chunk(&chunk).unwrap();
    }

    fn open(start_ms: u64) -> RawBoundary {
        RawBoundary::Open { start_ms }
    }

    fn close(end_ms: u64) -> RawBoundary {
        RawBoundary::Close { end_ms }
    }

    #[test]
    fn debounced_full_utterance_fires_start_then_end() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        // 600ms of audio precede the first boundary batch
        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        assert_eq!(m.state(), SessionState::PendingStart);
        assert!(sink.events().is_empty());

        // 250ms pass with no further input; start debounce is 200ms
        m.tick(850).unwrap();
        assert_eq!(m.state(), SessionState::Speaking);
        assert_eq!(sink.events(), vec![SessionEvent::VoiceStart]);

        push_audio(&mut m, 2400, 1); // elapsed now 3000ms
        m.update_boundaries(&[close(3000)]).unwrap();
        assert_eq!(m.state(), SessionState::PendingEnd);

        // 700ms pass; end debounce is 600ms
        m.tick(3700).unwrap();
        assert_eq!(m.state(), SessionState::Idle);

        let events = sink.events();
        match events.last().unwrap() {
            SessionEvent::VoiceEnd {
                start_ms,
                end_ms,
                samples,
            } => {
                assert_eq!(*start_ms, 500);
                assert_eq!(*end_ms, 3000);
                assert!(!samples.is_empty());
            }
            other => panic!("expected voice_end, got {other:?}"),
        }
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::VoiceEnd { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn short_candidate_never_produces_voice_end() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 400, 0);
        m.update_boundaries(&[open(300)]).unwrap();
        // close arrives before the start debounce confirms, 100ms of speech
        m.update_boundaries(&[close(400)]).unwrap();

        assert_eq!(m.state(), SessionState::Idle);
        m.tick(2000).unwrap();
        assert!(sink.events().is_empty());
        assert_eq!(m.buffered_samples(), 0);
    }

    #[test]
    fn close_before_confirmation_with_enough_speech_confirms_retroactively() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 900, 0);
        m.update_boundaries(&[open(300), close(800)]).unwrap();

        // retroactive confirm, then straight into end handling
        assert_eq!(m.state(), SessionState::PendingEnd);
        assert_eq!(sink.events(), vec![SessionEvent::VoiceStart]);

        m.tick(1600).unwrap();
        let events = sink.events();
        assert!(matches!(
            events.last().unwrap(),
            SessionEvent::VoiceEnd {
                start_ms: 300,
                end_ms: 800,
                ..
            }
        ));
    }

    #[test]
    fn continuation_does_not_refire_voice_start() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap(); // confirmed

        push_audio(&mut m, 1000, 1); // elapsed 1600
        m.update_boundaries(&[close(1500)]).unwrap();
        assert_eq!(m.state(), SessionState::PendingEnd);

        // new open 200ms later, well inside the 800ms continuation window
        push_audio(&mut m, 200, 2); // elapsed 1800
        m.update_boundaries(&[open(1750)]).unwrap();
        assert_eq!(m.state(), SessionState::Speaking);

        let starts = sink
            .events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::VoiceStart))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn open_outside_continuation_window_finalizes_then_restarts() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap();

        push_audio(&mut m, 1000, 1); // elapsed 1600
        m.update_boundaries(&[close(1500)]).unwrap();

        // 900ms of silence, beyond the 800ms window but before the end
        // debounce tick ran
        push_audio(&mut m, 900, 2); // elapsed 2500
        m.update_boundaries(&[open(2450)]).unwrap();

        let events = sink.events();
        assert!(matches!(
            events.last().unwrap(),
            SessionEvent::VoiceEnd {
                start_ms: 500,
                end_ms: 1500,
                ..
            }
        ));
        assert_eq!(m.state(), SessionState::PendingStart);
    }

    #[test]
    fn silence_timeout_forces_exactly_one_voice_end() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap();
        push_audio(&mut m, 400, 1); // elapsed 1000, last activity

        // no close boundary ever arrives; 1000ms silence timeout elapses
        m.tick(2100).unwrap();
        assert_eq!(m.state(), SessionState::Idle);

        let ends: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::VoiceEnd { .. }))
            .collect();
        assert_eq!(ends.len(), 1);
        match &ends[0] {
            SessionEvent::VoiceEnd { start_ms, end_ms, .. } => {
                assert_eq!(*start_ms, 500);
                assert_eq!(*end_ms, 2100);
            }
            _ => unreachable!(),
        }

        // a later tick must not produce a second end
        m.tick(5000).unwrap();
        let ends = sink
            .events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::VoiceEnd { .. }))
            .count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn voice_active_fires_per_chunk_while_speaking() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap();

        push_audio(&mut m, 10, 1);
        push_audio(&mut m, 10, 2);

        let actives = sink
            .events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::VoiceActive { .. }))
            .count();
        assert_eq!(actives, 2);
    }

    #[test]
    fn no_voice_active_while_idle_or_pending_start() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        push_audio(&mut m, 100, 1); // still PendingStart

        assert!(sink
            .events()
            .iter()
            .all(|e| !matches!(e, SessionEvent::VoiceActive { .. })));
    }

    #[test]
    fn interrupt_discards_buffer_without_voice_end() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap();
        push_audio(&mut m, 500, 1);

        m.interrupt();
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(m.buffered_samples(), 0);

        let events = sink.events();
        assert!(matches!(events.last().unwrap(), SessionEvent::Interrupt));
        assert!(events
            .iter()
            .all(|e| !matches!(e, SessionEvent::VoiceEnd { .. })));

        // no stray end after the interrupt
        m.tick(9000).unwrap();
        assert!(sink
            .events()
            .iter()
            .all(|e| !matches!(e, SessionEvent::VoiceEnd { .. })));
    }

    #[test]
    fn reset_restores_idle_with_nothing_pending() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap();
        push_audio(&mut m, 400, 1);
        m.update_boundaries(&[close(1000)]).unwrap();

        m.reset();
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(m.buffered_samples(), 0);
        assert!(!m.has_armed_timers());

        // and no events result from the discarded evidence
        let before = sink.events().len();
        m.tick(9000).unwrap();
        assert_eq!(sink.events().len(), before);
    }

    #[test]
    fn onset_artifact_open_is_ignored() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 300, 0);
        m.update_boundaries(&[open(40)]).unwrap();
        assert_eq!(m.state(), SessionState::Idle);
    }

    #[test]
    fn flush_finalizes_in_progress_segment() {
        let sink = Arc::new(CollectingSink::default());
        let mut m = machine(sink.clone());

        push_audio(&mut m, 600, 0);
        m.update_boundaries(&[open(500)]).unwrap();
        m.tick(850).unwrap();
        push_audio(&mut m, 1000, 1); // elapsed 1600

        m.flush().unwrap();
        assert_eq!(m.state(), SessionState::Idle);
        assert!(matches!(
            sink.events().last().unwrap(),
            SessionEvent::VoiceEnd {
                start_ms: 500,
                end_ms: 1600,
                ..
            }
        ));
    }
}
