//! Accumulates linear PCM until a time boundary for batch transcription.
//!
//! This is the fallback path when no streaming recognizer connection is
//! available: audio is buffered and shipped to a batch interface roughly
//! once per `threshold`. The chunker never emits while a reply is in
//! flight, which is the bridge's natural backpressure against transcribing
//! caller speech that overlaps active playback.

use std::time::Duration;

use bytes::Bytes;

/// Bounded byte accumulator with a single owner (the session).
#[derive(Debug)]
pub struct FrameChunker {
    buffer: Vec<u8>,
    /// Sample rate of the buffered PCM (after any upsampling).
    sample_rate: u32,
    /// Emit boundary; buffered duration must reach this before a drain.
    threshold: Duration,
}

impl FrameChunker {
    pub fn new(sample_rate: u32, threshold: Duration) -> Self {
        Self {
            buffer: Vec::new(),
            sample_rate,
            threshold,
        }
    }

    /// Append raw 16-bit mono PCM bytes.
    pub fn push(&mut self, pcm: &[u8]) {
        self.buffer.extend_from_slice(pcm);
    }

    /// Duration of the audio currently buffered.
    pub fn buffered(&self) -> Duration {
        let samples = self.buffer.len() as u64 / 2;
        Duration::from_micros(samples.saturating_mul(1_000_000) / u64::from(self.sample_rate))
    }

    /// Whether a chunk boundary has been reached. Always false while a
    /// reply is in flight.
    pub fn ready(&self, reply_in_flight: bool) -> bool {
        !reply_in_flight && self.buffered() >= self.threshold
    }

    /// Drain the accumulated audio atomically, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.buffer))
    }

    /// Drop buffered audio without emitting (session teardown).
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.buffer.shrink_to_fit();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
