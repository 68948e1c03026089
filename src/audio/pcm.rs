//! PCM accumulation chunker.
//!
//! Buffers raw capture samples and cuts a mono 16-bit WAV chunk on a fixed
//! wall-clock cadence. Each chunk carries its source PCM as a sidecar so the
//! STT clients can re-encode without decoding the container.

use crate::audio::vad::{Clock, SystemClock};
use crate::audio::wav::encode_wav_mono;
use crate::chunk::{PcmAudio, RawChunk};
use crate::error::Result;
use std::time::Instant;

/// Accumulates PCM and flushes WAV chunks every `chunk_ms`.
pub struct PcmChunker<C: Clock = SystemClock> {
    sample_rate: u32,
    chunk_ms: u64,
    buffer: Vec<f32>,
    last_flush: Instant,
    clock: C,
}

impl PcmChunker<SystemClock> {
    pub fn new(sample_rate: u32, chunk_ms: u64) -> Self {
        Self::with_clock(sample_rate, chunk_ms, SystemClock)
    }
}

impl<C: Clock> PcmChunker<C> {
    pub fn with_clock(sample_rate: u32, chunk_ms: u64, clock: C) -> Self {
        let now = clock.now();
        Self {
            sample_rate,
            chunk_ms,
            buffer: Vec::new(),
            last_flush: now,
            clock,
        }
    }

    /// Appends samples; returns a chunk when the cadence interval has elapsed.
    pub fn push(&mut self, samples: &[f32]) -> Result<Option<RawChunk>> {
        self.buffer.extend_from_slice(samples);

        let now = self.clock.now();
        if now.duration_since(self.last_flush).as_millis() as u64 >= self.chunk_ms {
            self.last_flush = now;
            return self.flush();
        }
        Ok(None)
    }

    /// Cuts a chunk from whatever is buffered, or `None` when empty.
    pub fn flush(&mut self) -> Result<Option<RawChunk>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let samples = std::mem::take(&mut self.buffer);
        let bytes = encode_wav_mono(&samples, self.sample_rate)?;
        Ok(Some(RawChunk::new(bytes, "audio/wav").with_pcm(PcmAudio {
            samples,
            sample_rate: self.sample_rate,
        })))
    }

    /// Samples currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
