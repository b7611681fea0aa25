//! Audio chunk types and sample-format validation
//!
//! All audio entering the session controller is normalized here, once, into
//! a canonical representation: mono f32 samples in [-1.0, 1.0]. Downstream
//! code never sees raw bytes or mixed sample types.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// PCM16 normalization constant (i16 -> f32)
const PCM16_NORMALIZE: f32 = 32768.0;
/// PCM16 scaling constant (f32 -> i16)
const PCM16_SCALE: f32 = 32767.0;

/// Supported audio sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleRate {
    /// 8kHz - Telephony
    Hz8000,
    /// 16kHz - Standard speech recognition (the VAD/KWS/ASR contract rate)
    #[default]
    Hz16000,
    /// 48kHz - Professional audio
    Hz48000,
}

impl SampleRate {
    /// Get sample rate as u32
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz48000 => 48000,
        }
    }

    /// Get frame size for a 10ms chunk (160 samples at 16kHz)
    pub fn frame_size_10ms(&self) -> usize {
        (self.as_u32() as usize * 10) / 1000
    }

    /// Get samples per millisecond
    pub fn samples_per_ms(&self) -> usize {
        self.as_u32() as usize / 1000
    }
}

/// A chunk of decoded audio, canonically stored as f32 in [-1.0, 1.0].
///
/// Construction is the single validation point for inbound audio: anything
/// that is neither normalized float nor 16-bit signed PCM is rejected with
/// [`Error::InvalidSampleFormat`] before it can reach a session buffer.
#[derive(Clone)]
pub struct AudioChunk {
    /// Raw audio samples (mono f32, normalized to [-1.0, 1.0])
    pub samples: Arc<[f32]>,
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Chunk sequence number for ordering
    pub sequence: u64,
    /// Duration of this chunk
    pub duration: Duration,
    /// Energy level in dB
    pub energy_db: f32,
}

impl std::fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChunk")
            .field("samples_len", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("sequence", &self.sequence)
            .field("duration", &self.duration)
            .field("energy_db", &self.energy_db)
            .finish()
    }
}

impl AudioChunk {
    /// Create a chunk from already-normalized f32 samples.
    ///
    /// Rejects non-finite samples and samples outside [-1.0, 1.0].
    pub fn from_f32(
        samples: Vec<f32>,
        sample_rate: SampleRate,
        sequence: u64,
    ) -> Result<Self, Error> {
        if let Some(bad) = samples.iter().find(|s| !s.is_finite() || s.abs() > 1.0) {
            return Err(Error::InvalidSampleFormat(format!(
                "f32 sample {bad} outside [-1.0, 1.0]"
            )));
        }
        Ok(Self::new_unchecked(samples, sample_rate, sequence))
    }

    /// Create a chunk from raw f32 little-endian bytes.
    pub fn from_f32_bytes(
        bytes: &[u8],
        sample_rate: SampleRate,
        sequence: u64,
    ) -> Result<Self, Error> {
        if bytes.len() % 4 != 0 {
            return Err(Error::InvalidSampleFormat(format!(
                "f32 payload length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_f32(samples, sample_rate, sequence)
    }

    /// Create a chunk from PCM16 little-endian bytes, normalizing to f32.
    pub fn from_pcm16(
        bytes: &[u8],
        sample_rate: SampleRate,
        sequence: u64,
    ) -> Result<Self, Error> {
        if bytes.len() % 2 != 0 {
            return Err(Error::InvalidSampleFormat(format!(
                "PCM16 payload length {} is not a multiple of 2",
                bytes.len()
            )));
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / PCM16_NORMALIZE)
            .collect();
        Ok(Self::new_unchecked(samples, sample_rate, sequence))
    }

    /// Create a chunk from i16 samples, normalizing to f32.
    pub fn from_i16(samples: &[i16], sample_rate: SampleRate, sequence: u64) -> Self {
        let samples: Vec<f32> = samples
            .iter()
            .map(|&s| s as f32 / PCM16_NORMALIZE)
            .collect();
        Self::new_unchecked(samples, sample_rate, sequence)
    }

    fn new_unchecked(samples: Vec<f32>, sample_rate: SampleRate, sequence: u64) -> Self {
        let duration =
            Duration::from_secs_f64(samples.len() as f64 / sample_rate.as_u32() as f64);
        let energy_db = Self::calculate_energy_db(&samples);
        Self {
            samples: samples.into(),
            sample_rate,
            sequence,
            duration,
            energy_db,
        }
    }

    /// Convert to PCM16 bytes (little-endian)
    pub fn to_pcm16(&self) -> Vec<u8> {
        self.samples
            .iter()
            .flat_map(|&s| {
                let pcm16 = (s.clamp(-1.0, 1.0) * PCM16_SCALE) as i16;
                pcm16.to_le_bytes()
            })
            .collect()
    }

    /// Calculate RMS energy in decibels
    fn calculate_energy_db(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return -96.0;
        }
        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();
        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            -96.0
        }
    }

    /// Get duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Number of samples in this chunk
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the chunk carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Check if chunk is likely silence based on energy
    pub fn is_likely_silence(&self, threshold_db: f32) -> bool {
        self.energy_db < threshold_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_conversions() {
        assert_eq!(SampleRate::Hz16000.as_u32(), 16000);
        assert_eq!(SampleRate::Hz16000.frame_size_10ms(), 160);
        assert_eq!(SampleRate::Hz16000.samples_per_ms(), 16);
    }

    #[test]
    fn chunk_from_pcm16() {
        let pcm16: Vec<u8> = vec![0x00, 0x40, 0x00, 0xC0]; // one positive, one negative
        let chunk = AudioChunk::from_pcm16(&pcm16, SampleRate::Hz16000, 0).unwrap();

        assert_eq!(chunk.len(), 2);
        assert!(chunk.samples[0] > 0.0);
        assert!(chunk.samples[1] < 0.0);
    }

    #[test]
    fn pcm16_odd_length_rejected() {
        let err = AudioChunk::from_pcm16(&[0x00, 0x40, 0x00], SampleRate::Hz16000, 0);
        assert!(matches!(err, Err(Error::InvalidSampleFormat(_))));
    }

    #[test]
    fn f32_out_of_range_rejected() {
        let err = AudioChunk::from_f32(vec![0.0, 1.5], SampleRate::Hz16000, 0);
        assert!(matches!(err, Err(Error::InvalidSampleFormat(_))));
    }

    #[test]
    fn energy_calculation() {
        let silent = AudioChunk::from_f32(vec![0.0; 160], SampleRate::Hz16000, 0).unwrap();
        assert!(silent.energy_db < -90.0);

        let loud = AudioChunk::from_f32(vec![0.5; 160], SampleRate::Hz16000, 0).unwrap();
        assert!(loud.energy_db > -10.0);
    }

    #[test]
    fn duration_from_samples() {
        let chunk = AudioChunk::from_f32(vec![0.0; 160], SampleRate::Hz16000, 0).unwrap();
        assert_eq!(chunk.duration_ms(), 10);
    }

    #[test]
    fn pcm16_round_trip() {
        let chunk = AudioChunk::from_i16(&[0, 16384, -16384], SampleRate::Hz16000, 0);
        let bytes = chunk.to_pcm16();
        let back = AudioChunk::from_pcm16(&bytes, SampleRate::Hz16000, 1).unwrap();
        assert_eq!(back.len(), 3);
    }
}
