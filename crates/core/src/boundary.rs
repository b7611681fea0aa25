//! Raw VAD boundaries and closed speech segments
//!
//! The external VAD engine reports segments as `[start_ms, end_ms]` pairs
//! where `-1` marks an unknown endpoint. Those pairs are parsed into a typed
//! [`RawBoundary`] exactly once, at ingestion; the state machine and the
//! normalizer only ever see the typed value.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sentinel marking an unknown endpoint in a raw VAD pair.
pub const UNKNOWN_ENDPOINT: i64 = -1;

/// A single boundary signal from the VAD engine, already validated.
///
/// Timestamps are milliseconds of session-local audio time (relative to the
/// session's first sample), non-decreasing across batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawBoundary {
    /// `[s, -1]`: speech began at `start_ms`, not yet ended.
    Open { start_ms: u64 },
    /// `[-1, e]`: speech ended at `end_ms`, start reported earlier.
    Close { end_ms: u64 },
    /// `[s, e]`: a fully closed segment.
    Closed { start_ms: u64, end_ms: u64 },
}

impl RawBoundary {
    /// Parse one raw pair.
    ///
    /// Returns `Ok(None)` for the no-information `[-1, -1]` shape (discarded
    /// silently per contract) and `Err(MalformedBoundary)` for wrong arity,
    /// negative non-sentinel values, or an inverted closed interval.
    pub fn parse(pair: &[i64]) -> Result<Option<Self>, Error> {
        let [start, end] = match pair {
            [s, e] => [*s, *e],
            other => {
                return Err(Error::MalformedBoundary(format!(
                    "expected 2 elements, got {}",
                    other.len()
                )))
            }
        };

        let start = Self::endpoint(start)?;
        let end = Self::endpoint(end)?;

        match (start, end) {
            (None, None) => Ok(None),
            (Some(start_ms), None) => Ok(Some(RawBoundary::Open { start_ms })),
            (None, Some(end_ms)) => Ok(Some(RawBoundary::Close { end_ms })),
            (Some(start_ms), Some(end_ms)) => {
                if start_ms >= end_ms {
                    return Err(Error::MalformedBoundary(format!(
                        "inverted interval [{start_ms}, {end_ms}]"
                    )));
                }
                Ok(Some(RawBoundary::Closed { start_ms, end_ms }))
            }
        }
    }

    /// Parse a whole batch, dropping (and logging) malformed entries.
    ///
    /// Per the error contract, a bad pair never poisons the rest of the
    /// batch.
    pub fn parse_batch(pairs: &[Vec<i64>]) -> Vec<RawBoundary> {
        pairs
            .iter()
            .filter_map(|pair| match Self::parse(pair) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(error = %e, ?pair, "dropping malformed boundary");
                    None
                }
            })
            .collect()
    }

    fn endpoint(value: i64) -> Result<Option<u64>, Error> {
        if value == UNKNOWN_ENDPOINT {
            Ok(None)
        } else if value < 0 {
            Err(Error::MalformedBoundary(format!(
                "negative timestamp {value}"
            )))
        } else {
            Ok(Some(value as u64))
        }
    }
}

/// A fully closed speech segment with `start_ms < end_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedSegment {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ClosedSegment {
    /// Construct a segment; the `start < end` invariant is enforced here.
    pub fn new(start_ms: u64, end_ms: u64) -> Result<Self, Error> {
        if start_ms >= end_ms {
            return Err(Error::MalformedBoundary(format!(
                "inverted interval [{start_ms}, {end_ms}]"
            )));
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Segment duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Gap between the end of `self` and the start of `next`, zero when they
    /// overlap.
    pub fn gap_to(&self, next: &ClosedSegment) -> u64 {
        next.start_ms.saturating_sub(self.end_ms)
    }

    /// Union interval of two segments
    pub fn merge_with(&self, other: &ClosedSegment) -> ClosedSegment {
        ClosedSegment {
            start_ms: self.start_ms.min(other.start_ms),
            end_ms: self.end_ms.max(other.end_ms),
        }
    }
}

/// A keyword-spotting result, score validated into [0, 1] at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    pub keyword: String,
    pub score: f32,
}

impl KeywordScore {
    pub fn new(keyword: impl Into<String>, score: f32) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&score) || !score.is_finite() {
            return Err(Error::MalformedBoundary(format!(
                "keyword score {score} outside [0, 1]"
            )));
        }
        Ok(Self {
            keyword: keyword.into(),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_open_close_closed() {
        assert_eq!(
            RawBoundary::parse(&[500, -1]).unwrap(),
            Some(RawBoundary::Open { start_ms: 500 })
        );
        assert_eq!(
            RawBoundary::parse(&[-1, 3000]).unwrap(),
            Some(RawBoundary::Close { end_ms: 3000 })
        );
        assert_eq!(
            RawBoundary::parse(&[500, 3000]).unwrap(),
            Some(RawBoundary::Closed {
                start_ms: 500,
                end_ms: 3000
            })
        );
    }

    #[test]
    fn parse_empty_sentinel_pair_discarded() {
        assert_eq!(RawBoundary::parse(&[-1, -1]).unwrap(), None);
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(RawBoundary::parse(&[1, 2, 3]).is_err());
        assert!(RawBoundary::parse(&[]).is_err());
        assert!(RawBoundary::parse(&[-5, 100]).is_err());
        assert!(RawBoundary::parse(&[300, 200]).is_err());
        assert!(RawBoundary::parse(&[300, 300]).is_err());
    }

    #[test]
    fn parse_batch_skips_malformed() {
        let batch = vec![vec![500, -1], vec![1, 2, 3], vec![-1, -1], vec![-1, 900]];
        let parsed = RawBoundary::parse_batch(&batch);
        assert_eq!(
            parsed,
            vec![
                RawBoundary::Open { start_ms: 500 },
                RawBoundary::Close { end_ms: 900 }
            ]
        );
    }

    #[test]
    fn closed_segment_invariant() {
        assert!(ClosedSegment::new(100, 100).is_err());
        let seg = ClosedSegment::new(100, 400).unwrap();
        assert_eq!(seg.duration_ms(), 300);
    }

    #[test]
    fn segment_gap_and_merge() {
        let a = ClosedSegment::new(100, 400).unwrap();
        let b = ClosedSegment::new(430, 600).unwrap();
        assert_eq!(a.gap_to(&b), 30);
        assert_eq!(a.merge_with(&b), ClosedSegment::new(100, 600).unwrap());

        let overlapping = ClosedSegment::new(300, 500).unwrap();
        assert_eq!(a.gap_to(&overlapping), 0);
    }

    #[test]
    fn keyword_score_range() {
        assert!(KeywordScore::new("xiao yun", 0.8).is_ok());
        assert!(KeywordScore::new("xiao yun", 1.2).is_err());
        assert!(KeywordScore::new("xiao yun", -0.1).is_err());
    }
}
