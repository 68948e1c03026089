//! kaigi - real-time meeting transcription and translation pipeline core.
//!
//! Captures live audio, detects voice activity, aggregates encoded chunks,
//! dispatches them to remote speech-to-text providers with bounded
//! concurrency and coalescing backpressure, assigns alternating speaker
//! labels from silence gaps, and forwards recognized text through a paced
//! translation queue. UI, persistence, and the HTTP proxy endpoints are
//! external collaborators.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod chunk;
pub mod config;
pub mod defaults;
pub mod dictionary;
pub mod error;
pub mod llm;
pub mod queue;
pub mod session;
pub mod stt;
pub mod text;
pub mod transcript;

// Audio capture and analysis
pub use audio::detector::{CallbackVad, VadEngine, VadHandlers, WorkerVad, build_detector};
pub use audio::level::LevelMeter;
pub use audio::source::{AudioSource, ScriptedAudioSource};
pub use audio::vad::{Clock, SystemClock, Vad, VadParams, VadTransition};

// Chunking
pub use chunk::{AggregatedChunk, AggregatorConfig, ChunkAggregator, PcmAudio, RawChunk};

// Speech-to-text
pub use stt::{
    Provider, ProxySttClient, SttClient, SttOrchestrator, SttOrchestratorConfig, SttResponse,
    SttSegment, TranscriptionOptions,
};

// Translation
pub use llm::{LlmClient, LlmOptions, LlmRequest, LlmTask, ProxyLlmClient};

// Dispatch queues
pub use queue::dispatch::{DispatchConfig, DispatchQueue, JobHandler, QueueEvent};
pub use queue::report::{ErrorReporter, TracingReporter};
pub use queue::transcription::{TranscriptEvent, TranscriptionQueue, TranscriptionQueueConfig};
pub use queue::translation::{TranslationQueue, TranslationQueueConfig};

// Transcript
pub use transcript::turn::{TurnTracker, auto_cluster_ab, estimated_duration_ms};
pub use transcript::{Speaker, TranscriptSegment};

// Session
pub use session::{RecordingSession, SessionEvent};

// Error handling
pub use error::{KaigiError, Result};

// Config
pub use config::Config;
