//! Streaming session walkthrough
//! Run: cargo run --example streaming_session
//!
//! Drives one session through a synthetic utterance using a threshold-based
//! stand-in for a real VAD engine, printing each emitted event.

use std::sync::Arc;

use voicegate_config::{BufferConfig, SessionConfig};
use voicegate_core::{AudioChunk, RawBoundary, SampleRate};
use voicegate_session::{ChannelSink, SessionStateMachine};

/// Crude energy-gate VAD: reports an open when energy first crosses the
/// gate, a close when it first drops back below.
struct EnergyGate {
    gate_db: f32,
    in_speech: bool,
}

impl EnergyGate {
    fn observe(&mut self, chunk: &AudioChunk, elapsed_ms: u64) -> Option<RawBoundary> {
        let loud = chunk.energy_db >= self.gate_db;
        match (self.in_speech, loud) {
            (false, true) => {
                self.in_speech = true;
                Some(RawBoundary::Open {
                    start_ms: elapsed_ms.saturating_sub(chunk.duration_ms()),
                })
            }
            (true, false) => {
                self.in_speech = false;
                Some(RawBoundary::Close { end_ms: elapsed_ms })
            }
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (sink, mut events) = ChannelSink::new();
    let mut machine = SessionStateMachine::new(
        SessionConfig::default(),
        &BufferConfig::default(),
        Arc::new(sink),
    );
    let mut gate = EnergyGate {
        gate_db: -30.0,
        in_speech: false,
    };

    let consumer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                voicegate_session::SessionEvent::VoiceActive { elapsed_ms, samples } => {
                    println!("  voice_active at {elapsed_ms}ms ({} samples)", samples.len());
                }
                voicegate_session::SessionEvent::VoiceEnd {
                    start_ms,
                    end_ms,
                    samples,
                } => {
                    println!("  voice_end [{start_ms}, {end_ms}]ms ({} samples)", samples.len());
                }
                other => println!("  {}", serde_json::to_string(&other).unwrap()),
            }
        }
    });

    // 3 seconds of 100ms chunks: silence, 1.5s of "speech", silence
    for seq in 0..30u64 {
        let amplitude = if (5..20).contains(&seq) { 0.3 } else { 0.001 };
        let chunk = AudioChunk::from_f32(vec![amplitude; 1600], SampleRate::Hz16000, seq)?;

        machine.add_audio_chunk(&chunk)?;
        let now = machine.elapsed_ms();
        if let Some(boundary) = gate.observe(&chunk, now) {
            println!("boundary: {boundary:?}");
            machine.update_boundaries(&[boundary])?;
        }
        machine.tick(now)?;
    }
    machine.flush()?;

    drop(machine); // closes the sink channel
    consumer.await?;
    Ok(())
}
