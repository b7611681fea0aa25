//! Wake-word barge-in policy
//!
//! Thin gate between raw keyword scores and the session state machine: a
//! score at or above the threshold interrupts an in-progress segment, and at
//! most one interrupt is in flight per session until the machine has been
//! observed back in `Idle`.

use voicegate_config::WakewordConfig;
use voicegate_core::KeywordScore;

use crate::state_machine::{SessionState, SessionStateMachine};

/// Decides whether a keyword score triggers a barge-in on the bound session.
#[derive(Debug)]
pub struct WakewordArbiter {
    threshold: f32,
    /// An interrupt fired and the machine has not been seen idle since.
    in_flight: bool,
}

impl WakewordArbiter {
    pub fn new(config: &WakewordConfig) -> Self {
        Self {
            threshold: config.threshold,
            in_flight: false,
        }
    }

    /// Feed one keyword score. Returns true when an interrupt was triggered.
    ///
    /// The cooldown is tied to the machine returning to `Idle`: after an
    /// interrupt, further scores are ignored until a callback observes the
    /// idle state, after which a new segment is interrupt-eligible again.
    pub fn on_keyword_score(
        &mut self,
        machine: &mut SessionStateMachine,
        score: &KeywordScore,
    ) -> bool {
        if self.in_flight {
            if machine.state() == SessionState::Idle {
                self.in_flight = false;
            } else {
                return false;
            }
        }

        if score.score < self.threshold {
            return false;
        }
        if !machine.is_interrupt_eligible() {
            tracing::debug!(keyword = %score.keyword, "keyword ignored, no segment in progress");
            return false;
        }

        tracing::info!(keyword = %score.keyword, score = score.score, "wake word barge-in");
        machine.interrupt();
        self.in_flight = true;
        true
    }

    /// Forget any in-flight interrupt (session reset).
    pub fn reset(&mut self) {
        self.in_flight = false;
    }
}
