//! Raw boundary repair and segment merging
//!
//! Streaming VAD engines report open-ended pairs: `[s, -1]` when speech
//! begins, `[-1, e]` when it ends, `[s, e]` only when a segment closed
//! within one batch. The normalizer repairs those into closed intervals by
//! pairing each close with the most recent pending open, retaining unpaired
//! opens across batches until a close arrives or the session finalizes.

use voicegate_core::{ClosedSegment, RawBoundary};

/// Merge closed segments whose gap is at most `merge_gap_ms`, taking the
/// union interval. Sorts by start first; the result is non-overlapping and
/// idempotent under re-merging with the same gap.
pub fn merge_segments(mut segments: Vec<ClosedSegment>, merge_gap_ms: u64) -> Vec<ClosedSegment> {
    if segments.is_empty() {
        return segments;
    }
    segments.sort_by_key(|s| s.start_ms);

    let mut merged: Vec<ClosedSegment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match merged.last_mut() {
            Some(last) if last.gap_to(&seg) <= merge_gap_ms => {
                *last = last.merge_with(&seg);
            }
            _ => merged.push(seg),
        }
    }
    merged
}

/// Repairs possibly-open boundary pairs into closed `[start, end]` intervals.
///
/// Holds the pending-open stack between batches. Stateless apart from that
/// stack: the repair and merge steps themselves are pure functions.
#[derive(Debug)]
pub struct SegmentNormalizer {
    /// Opens observed but not yet closed, in arrival order.
    pending_opens: Vec<u64>,
    merge_gap_ms: u64,
    onset_guard_ms: u64,
    discard_onset_artifacts: bool,
}

impl SegmentNormalizer {
    pub fn new(merge_gap_ms: u64, onset_guard_ms: u64, discard_onset_artifacts: bool) -> Self {
        Self {
            pending_opens: Vec::new(),
            merge_gap_ms,
            onset_guard_ms,
            discard_onset_artifacts,
        }
    }

    /// Record an open boundary. Opens inside the onset guard are spurious
    /// startup artifacts and are dropped here when the discard policy is on.
    pub fn push_open(&mut self, start_ms: u64) -> bool {
        if self.is_onset_artifact(start_ms) {
            tracing::debug!(start_ms, "discarding onset artifact open");
            return false;
        }
        self.pending_opens.push(start_ms);
        true
    }

    /// Pair a close boundary with the most recent pending open.
    ///
    /// With no pending open the speech was already in progress when the
    /// session began observing, so the segment starts at 0 (which the onset
    /// guard then discards under the default policy). Inverted intervals
    /// yield `None`.
    pub fn close(&mut self, end_ms: u64) -> Option<ClosedSegment> {
        let start_ms = self.pending_opens.pop().unwrap_or(0);
        self.accept(start_ms, end_ms)
    }

    /// Repair a whole batch in arrival order, returning the closed segments
    /// it produced (unmerged). Pending opens carry over to the next call.
    pub fn repair_batch(&mut self, batch: &[RawBoundary]) -> Vec<ClosedSegment> {
        let mut out = Vec::new();
        for boundary in batch {
            match *boundary {
                RawBoundary::Open { start_ms } => {
                    self.push_open(start_ms);
                }
                RawBoundary::Close { end_ms } => {
                    out.extend(self.close(end_ms));
                }
                RawBoundary::Closed { start_ms, end_ms } => {
                    out.extend(self.accept(start_ms, end_ms));
                }
            }
        }
        out
    }

    /// Close every leftover pending open against the session's total elapsed
    /// duration and return the merged result. Clears the pending stack.
    pub fn finalize(&mut self, total_elapsed_ms: u64) -> Vec<ClosedSegment> {
        let leftovers: Vec<u64> = std::mem::take(&mut self.pending_opens);
        let closed: Vec<ClosedSegment> = leftovers
            .into_iter()
            .filter_map(|start_ms| self.accept(start_ms, total_elapsed_ms))
            .collect();
        merge_segments(closed, self.merge_gap_ms)
    }

    /// Merge repaired segments with this normalizer's gap threshold.
    pub fn merge(&self, segments: Vec<ClosedSegment>) -> Vec<ClosedSegment> {
        merge_segments(segments, self.merge_gap_ms)
    }

    /// Number of opens still awaiting a close
    pub fn pending_open_count(&self) -> usize {
        self.pending_opens.len()
    }

    /// Drop all pending opens (session reset/interrupt)
    pub fn clear(&mut self) {
        self.pending_opens.clear();
    }

    fn is_onset_artifact(&self, start_ms: u64) -> bool {
        self.discard_onset_artifacts && start_ms < self.onset_guard_ms
    }

    fn accept(&self, start_ms: u64, end_ms: u64) -> Option<ClosedSegment> {
        if self.is_onset_artifact(start_ms) {
            tracing::debug!(start_ms, end_ms, "discarding onset artifact segment");
            return None;
        }
        match ClosedSegment::new(start_ms, end_ms) {
            Ok(seg) => Some(seg),
            Err(e) => {
                tracing::warn!(error = %e, "skipping repaired segment");
                None
            }
        }
    }
}
