//! Event sinks and the wire-ready event value
//!
//! [`SessionEvent`] is the typed form of what a transport layer frames onto
//! the wire (JSON over WebSocket in a typical deployment); serialization is
//! defined here, framing is not. [`ChannelSink`] bridges the synchronous
//! state machine to an async consumer task without blocking.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use voicegate_core::{AudioChunk, EventSink};

/// A session-level event, ready for wire framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    VoiceStart,
    VoiceActive {
        elapsed_ms: u64,
        samples: Vec<f32>,
    },
    VoiceEnd {
        start_ms: u64,
        end_ms: u64,
        samples: Vec<f32>,
    },
    Interrupt,
}

/// Forwards events into a tokio unbounded channel.
///
/// `send` on an unbounded channel never blocks, which keeps the state
/// machine's no-suspension-point contract intact; a dropped receiver is
/// logged and otherwise ignored (the session is being torn down).
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped, discarding session event");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_voice_start(&self) {
        self.send(SessionEvent::VoiceStart);
    }

    fn on_voice_active(&self, chunk: &AudioChunk, elapsed_ms: u64) {
        self.send(SessionEvent::VoiceActive {
            elapsed_ms,
            samples: chunk.samples.to_vec(),
        });
    }

    fn on_voice_end(&self, audio: Vec<f32>, start_ms: u64, end_ms: u64) {
        self.send(SessionEvent::VoiceEnd {
            start_ms,
            end_ms,
            samples: audio,
        });
    }

    fn on_interrupt(&self) {
        self.send(SessionEvent::Interrupt);
    }
}

/// Test harness sink: records every event in order.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectingSink {
    fn on_voice_start(&self) {
        self.events.lock().push(SessionEvent::VoiceStart);
    }

    fn on_voice_active(&self, chunk: &AudioChunk, elapsed_ms: u64) {
        self.events.lock().push(SessionEvent::VoiceActive {
            elapsed_ms,
            samples: chunk.samples.to_vec(),
        });
    }

    fn on_voice_end(&self, audio: Vec<f32>, start_ms: u64, end_ms: u64) {
        self.events.lock().push(SessionEvent::VoiceEnd {
            start_ms,
            end_ms,
            samples: audio,
        });
    }

    fn on_interrupt(&self) {
        self.events.lock().push(SessionEvent::Interrupt);
    }
}
