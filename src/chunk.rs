//! Encoded-audio chunk types and the coalescing aggregator.
//!
//! Capture produces small encoded pieces at a fixed cadence. Pieces below a
//! minimum size are buffered and merged so the upload path is not flooded
//! with tiny blobs; merged chunks land in a bounded ready queue that drops
//! its oldest entry under overload (live captioning tolerates gaps better
//! than unbounded latency growth).

use crate::audio::vad::{Clock, SystemClock};
use crate::defaults;
use std::collections::VecDeque;
use std::time::Instant;

/// Raw PCM carried alongside an encoded chunk.
///
/// Present when the chunk was cut by the PCM path; enables the mono-WAV
/// re-encode fallback without decoding the container.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// An encoded-audio piece produced by the capture layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub bytes: Vec<u8>,
    /// MIME type hint, e.g. `audio/wav` or `audio/webm;codecs=opus`.
    pub mime: String,
    pub pcm: Option<PcmAudio>,
}

impl RawChunk {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            pcm: None,
        }
    }

    pub fn with_pcm(mut self, pcm: PcmAudio) -> Self {
        self.pcm = Some(pcm);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A chunk that crossed the size or wait threshold and is ready for upload.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedChunk {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub pcm: Option<PcmAudio>,
}

impl AggregatedChunk {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Configuration for the chunk aggregator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Pieces below this size are buffered instead of dispatched.
    pub min_bytes: usize,
    /// Maximum time a buffered piece may wait before a forced flush.
    pub max_wait_ms: u64,
    /// Ready-queue depth; the oldest chunk is dropped beyond this.
    pub max_backlog: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_bytes: defaults::AGGREGATOR_MIN_BYTES,
            max_wait_ms: defaults::AGGREGATOR_MAX_WAIT_MS,
            max_backlog: defaults::AGGREGATOR_MAX_BACKLOG,
        }
    }
}

/// Coalesces small encoded pieces into upload-ready chunks.
pub struct ChunkAggregator<C: Clock = SystemClock> {
    config: AggregatorConfig,
    parts: Vec<RawChunk>,
    buffered_bytes: usize,
    first_buffered_at: Option<Instant>,
    ready: VecDeque<AggregatedChunk>,
    dropped: u64,
    clock: C,
}

impl ChunkAggregator<SystemClock> {
    pub fn new(config: AggregatorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ChunkAggregator<C> {
    pub fn with_clock(config: AggregatorConfig, clock: C) -> Self {
        Self {
            config,
            parts: Vec::new(),
            buffered_bytes: 0,
            first_buffered_at: None,
            ready: VecDeque::new(),
            dropped: 0,
            clock,
        }
    }

    /// Accepts a raw piece.
    ///
    /// Pieces at or above `min_bytes` bypass buffering (after flushing any
    /// smaller pieces ahead of them, preserving byte order). Smaller pieces
    /// accumulate until the size threshold is reached; the time-based flush
    /// is driven separately by [`flush_if_due`](Self::flush_if_due).
    pub fn push(&mut self, chunk: RawChunk) {
        if chunk.is_empty() {
            return;
        }

        if chunk.len() >= self.config.min_bytes {
            self.flush_buffered();
            let mime = chunk.mime.clone();
            self.enqueue(AggregatedChunk {
                bytes: chunk.bytes,
                mime,
                pcm: chunk.pcm,
            });
            return;
        }

        if self.parts.is_empty() {
            self.first_buffered_at = Some(self.clock.now());
        }
        self.buffered_bytes += chunk.len();
        self.parts.push(chunk);

        if self.buffered_bytes >= self.config.min_bytes {
            self.flush_buffered();
        }
    }

    /// Flushes the buffer if the oldest buffered piece has waited longer
    /// than `max_wait_ms`. Call periodically; pushes alone do not fire it.
    pub fn flush_if_due(&mut self) {
        if let Some(first) = self.first_buffered_at {
            let waited = self.clock.now().duration_since(first).as_millis() as u64;
            if waited >= self.config.max_wait_ms {
                self.flush_buffered();
            }
        }
    }

    /// Forces out whatever is buffered, regardless of thresholds.
    pub fn flush(&mut self) {
        self.flush_buffered();
    }

    fn flush_buffered(&mut self) {
        if self.parts.is_empty() {
            return;
        }

        let parts = std::mem::take(&mut self.parts);
        self.buffered_bytes = 0;
        self.first_buffered_at = None;

        let mut bytes = Vec::new();
        for p in &parts {
            bytes.extend_from_slice(&p.bytes);
        }
        // MIME of the most recent contributing piece
        let mime = parts
            .last()
            .map(|p| p.mime.clone())
            .unwrap_or_else(|| "audio/webm".to_string());
        let pcm = merge_pcm(&parts);

        self.enqueue(AggregatedChunk { bytes, mime, pcm });
    }

    fn enqueue(&mut self, chunk: AggregatedChunk) {
        self.ready.push_back(chunk);
        while self.ready.len() > self.config.max_backlog {
            self.ready.pop_front();
            self.dropped += 1;
            tracing::debug!(dropped = self.dropped, "chunk backlog full, dropping oldest");
        }
    }

    /// Takes the oldest ready chunk, if any.
    pub fn pop(&mut self) -> Option<AggregatedChunk> {
        self.ready.pop_front()
    }

    /// Number of chunks waiting for dispatch.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Bytes currently sitting in the coalescing buffer.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Total chunks dropped to the backlog cap.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Clears the buffer and the ready queue.
    pub fn clear(&mut self) {
        self.parts.clear();
        self.buffered_bytes = 0;
        self.first_buffered_at = None;
        self.ready.clear();
    }
}

/// PCM sidecars merge only when every part carries one at the same rate.
fn merge_pcm(parts: &[RawChunk]) -> Option<PcmAudio> {
    let first_rate = parts.first()?.pcm.as_ref()?.sample_rate;
    let mut samples = Vec::new();
    for p in parts {
        let pcm = p.pcm.as_ref()?;
        if pcm.sample_rate != first_rate {
            return None;
        }
        samples.extend_from_slice(&pcm.samples);
    }
    Some(PcmAudio {
        samples,
        sample_rate: first_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::vad::test_clock::MockClock;
    use std::time::Duration;

    fn config() -> AggregatorConfig {
        AggregatorConfig {
            min_bytes: 4096,
            max_wait_ms: 300,
            max_backlog: 6,
        }
    }

    fn small(n: usize) -> RawChunk {
        RawChunk::new(vec![0xAB; n], "audio/webm")
    }

    #[test]
    fn test_large_chunk_bypasses_buffering() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(small(5000));
        assert_eq!(agg.ready_len(), 1);
        assert_eq!(agg.buffered_bytes(), 0);
    }

    #[test]
    fn test_small_chunks_buffer_until_size_threshold() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(small(1000));
        agg.push(small(1000));
        agg.push(small(1000));
        assert_eq!(agg.ready_len(), 0);
        assert_eq!(agg.buffered_bytes(), 3000);

        agg.push(small(1100));
        assert_eq!(agg.ready_len(), 1);
        assert_eq!(agg.buffered_bytes(), 0);
        assert_eq!(agg.pop().unwrap().len(), 4100);
    }

    #[test]
    fn test_max_wait_triggers_exactly_one_flush() {
        let clock = MockClock::new();
        let mut agg = ChunkAggregator::with_clock(config(), clock.clone());

        // Cumulative size never reaches min_bytes across a span beyond max_wait
        agg.push(small(500));
        clock.advance(Duration::from_millis(150));
        agg.push(small(500));
        agg.flush_if_due();
        assert_eq!(agg.ready_len(), 0, "flushed before max_wait elapsed");

        clock.advance(Duration::from_millis(150));
        agg.flush_if_due();
        assert_eq!(agg.ready_len(), 1);

        // Nothing left to flush
        agg.flush_if_due();
        assert_eq!(agg.ready_len(), 1);
        assert_eq!(agg.pop().unwrap().len(), 1000);
    }

    #[test]
    fn test_backlog_keeps_most_recent_cap() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        for i in 0..10u8 {
            agg.push(RawChunk::new(vec![i; 5000], "audio/webm"));
        }
        assert_eq!(agg.ready_len(), 6);
        assert_eq!(agg.dropped(), 4);
        // Oldest dropped: first remaining chunk is the fifth pushed
        assert_eq!(agg.pop().unwrap().bytes[0], 4);
    }

    #[test]
    fn test_flush_preserves_byte_order() {
        let clock = MockClock::new();
        let mut agg = ChunkAggregator::with_clock(config(), clock.clone());
        agg.push(RawChunk::new(vec![1, 1], "audio/webm"));
        agg.push(RawChunk::new(vec![2, 2], "audio/webm"));
        agg.flush();

        let merged = agg.pop().unwrap();
        assert_eq!(merged.bytes, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_merged_mime_is_most_recent() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(RawChunk::new(vec![0; 100], "audio/webm"));
        agg.push(RawChunk::new(vec![0; 100], "audio/ogg"));
        agg.flush();
        assert_eq!(agg.pop().unwrap().mime, "audio/ogg");
    }

    #[test]
    fn test_large_chunk_flushes_smaller_pieces_first() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(RawChunk::new(vec![1; 100], "audio/webm"));
        agg.push(RawChunk::new(vec![2; 5000], "audio/webm"));

        assert_eq!(agg.ready_len(), 2);
        assert_eq!(agg.pop().unwrap().bytes[0], 1);
        assert_eq!(agg.pop().unwrap().bytes[0], 2);
    }

    #[test]
    fn test_empty_chunks_ignored() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(RawChunk::new(Vec::new(), "audio/webm"));
        agg.flush();
        assert_eq!(agg.ready_len(), 0);
    }

    #[test]
    fn test_pcm_sidecars_merge_when_rates_match() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(
            RawChunk::new(vec![0; 100], "audio/wav").with_pcm(PcmAudio {
                samples: vec![0.1; 10],
                sample_rate: 16000,
            }),
        );
        agg.push(
            RawChunk::new(vec![0; 100], "audio/wav").with_pcm(PcmAudio {
                samples: vec![0.2; 10],
                sample_rate: 16000,
            }),
        );
        agg.flush();

        let pcm = agg.pop().unwrap().pcm.unwrap();
        assert_eq!(pcm.samples.len(), 20);
        assert_eq!(pcm.sample_rate, 16000);
    }

    #[test]
    fn test_pcm_sidecar_dropped_on_rate_mismatch() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(
            RawChunk::new(vec![0; 100], "audio/wav").with_pcm(PcmAudio {
                samples: vec![0.1; 10],
                sample_rate: 16000,
            }),
        );
        agg.push(
            RawChunk::new(vec![0; 100], "audio/wav").with_pcm(PcmAudio {
                samples: vec![0.2; 10],
                sample_rate: 48000,
            }),
        );
        agg.flush();
        assert!(agg.pop().unwrap().pcm.is_none());
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut agg = ChunkAggregator::with_clock(config(), MockClock::new());
        agg.push(small(100));
        agg.push(small(5000));
        agg.clear();
        assert_eq!(agg.ready_len(), 0);
        assert_eq!(agg.buffered_bytes(), 0);
    }
}
