//! Default configuration constants for kaigi.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 48kHz matches what browser capture stacks and most consumer microphones
/// deliver; STT providers resample on their side.
pub const SAMPLE_RATE: u32 = 48_000;

/// Default VAD analysis frame size in samples.
///
/// Rounded up to a power of two at construction. 2048 samples at 48kHz is
/// roughly 43ms per frame, short enough for responsive speech-start events.
pub const FRAME_SIZE: usize = 2048;

/// Default speech threshold above the adaptive noise floor, in dB.
pub const VAD_THRESHOLD_DB: f32 = 12.0;

/// Default hangover duration in milliseconds.
///
/// Silence must persist this long before a speech-end event fires, which
/// keeps short intra-sentence pauses from chattering the detector.
pub const VAD_HANGOVER_MS: u64 = 200;

/// Initial adaptive noise floor estimate in dB.
///
/// Deliberately far below any real signal so the floor converges upward
/// from silence rather than downward through speech.
pub const NOISE_FLOOR_DB: f32 = -100.0;

/// Silence gap after which a new speech start is attributed to the other speaker.
pub const TURN_SILENCE_MS: u64 = 600;

/// Default PCM accumulation window before a chunk is cut, in milliseconds.
pub const CHUNK_MS: u64 = 1500;

/// Level meter RMS window in milliseconds.
pub const LEVEL_WINDOW_MS: u64 = 200;

/// Capture thread polling interval when the source has no samples ready.
pub const POLL_INTERVAL_MS: u64 = 10;

/// Minimum encoded-chunk size before upload, in bytes.
///
/// Pieces below this are coalesced to protect the upload path from
/// per-request overhead on tiny blobs.
pub const AGGREGATOR_MIN_BYTES: usize = 4096;

/// Maximum time a small piece may sit in the coalescing buffer.
pub const AGGREGATOR_MAX_WAIT_MS: u64 = 300;

/// Maximum aggregated chunks queued for dispatch; oldest are dropped beyond this.
pub const AGGREGATOR_MAX_BACKLOG: usize = 6;

/// Concurrent in-flight transcription requests.
pub const TRANSCRIPTION_CONCURRENCY: usize = 2;

/// Transcription backlog depth; oldest chunks are dropped beyond this.
pub const TRANSCRIPTION_BACKLOG: usize = 6;

/// Concurrent in-flight translation requests.
pub const TRANSLATION_CONCURRENCY: usize = 2;

/// Translation backlog depth; oldest texts are dropped beyond this.
pub const TRANSLATION_BACKLOG: usize = 50;

/// Minimum spacing between successive translation dispatch starts.
pub const TRANSLATION_SPACING_MS: u64 = 250;

/// Default source language hint for transcription.
pub const DEFAULT_LANGUAGE: &str = "ja";

/// Default translation target language.
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// Default proxy base URL for the STT/LLM endpoints.
pub const DEFAULT_PROXY_URL: &str = "http://localhost:3000";
