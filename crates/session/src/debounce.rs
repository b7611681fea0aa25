//! Debounce timer for pending state transitions
//!
//! One instance per direction: a start debounce and an end debounce. The
//! timer records the first observation and ignores re-arming, so jittery
//! boundary streams cannot restart the countdown.

/// Tracks a pending transition timestamp against a confirm threshold.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    threshold_ms: u64,
    armed_at_ms: Option<u64>,
}

impl DebounceTimer {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            armed_at_ms: None,
        }
    }

    /// Record a pending timestamp. No-op while already armed: the first
    /// observation wins.
    pub fn arm(&mut self, now_ms: u64) {
        if self.armed_at_ms.is_none() {
            self.armed_at_ms = Some(now_ms);
        }
    }

    /// True once the armed timestamp has aged past the threshold.
    pub fn is_confirmed(&self, now_ms: u64) -> bool {
        match self.armed_at_ms {
            Some(armed_at) => now_ms.saturating_sub(armed_at) >= self.threshold_ms,
            None => false,
        }
    }

    /// Clear the pending timestamp without firing.
    pub fn cancel(&mut self) {
        self.armed_at_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at_ms.is_some()
    }

    pub fn armed_at(&self) -> Option<u64> {
        self.armed_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_after_threshold() {
        let mut t = DebounceTimer::new(200);
        assert!(!t.is_confirmed(1000));

        t.arm(1000);
        assert!(!t.is_confirmed(1100));
        assert!(t.is_confirmed(1200));
        assert!(t.is_confirmed(5000));
    }

    #[test]
    fn rearm_is_a_no_op() {
        let mut t = DebounceTimer::new(200);
        t.arm(1000);
        t.arm(1150); // ignored; countdown not restarted
        assert_eq!(t.armed_at(), Some(1000));
        assert!(t.is_confirmed(1200));
    }

    #[test]
    fn cancel_clears_without_firing() {
        let mut t = DebounceTimer::new(200);
        t.arm(1000);
        t.cancel();
        assert!(!t.is_armed());
        assert!(!t.is_confirmed(2000));

        // can be armed fresh afterwards
        t.arm(3000);
        assert_eq!(t.armed_at(), Some(3000));
    }
}
