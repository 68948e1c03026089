//! Speech-to-text client types.

use crate::chunk::AggregatedChunk;
use crate::error::{KaigiError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Remote API provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Openai,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::Openai => "openai",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request transcription options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionOptions {
    /// Source language hint, e.g. `ja`.
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub temperature: Option<f32>,
}

/// A time-stamped piece of a provider response. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SttSegment {
    #[serde(default)]
    pub text: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl SttSegment {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            end: None,
        }
    }
}

/// Normalized transcription result.
///
/// `segments` is never empty: providers that return no breakdown collapse to
/// a single implicit segment carrying the full text.
#[derive(Debug, Clone, PartialEq)]
pub struct SttResponse {
    pub text: String,
    pub segments: Vec<SttSegment>,
}

impl SttResponse {
    /// Builds a response with one implicit segment.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = vec![SttSegment::from_text(text.clone())];
        Self { text, segments }
    }

    /// Normalizes a raw `(text, segments)` pair from a provider.
    pub fn normalized(text: String, segments: Option<Vec<SttSegment>>) -> Self {
        match segments {
            Some(segs) if !segs.is_empty() => Self {
                text,
                segments: segs,
            },
            _ => Self::from_text(text),
        }
    }
}

/// Trait for speech-to-text clients.
///
/// Implementations normalize their vendor response into [`SttResponse`] and
/// apply their own container-compatibility fallback before surfacing errors.
#[async_trait]
pub trait SttClient: Send + Sync {
    /// The provider this client talks to.
    fn provider(&self) -> Provider;

    /// Transcribes one aggregated chunk.
    async fn transcribe(
        &self,
        chunk: &AggregatedChunk,
        opts: &TranscriptionOptions,
    ) -> Result<SttResponse>;
}

/// Scriptable client for tests.
///
/// Pops scripted outcomes per call, falling back to a default response once
/// the script runs dry.
pub struct MockSttClient {
    provider: Provider,
    script: Mutex<VecDeque<std::result::Result<SttResponse, String>>>,
    default: std::result::Result<SttResponse, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSttClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            script: Mutex::new(VecDeque::new()),
            default: Ok(SttResponse::from_text("mock transcription")),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the default response text.
    pub fn with_response(mut self, text: &str) -> Self {
        self.default = Ok(SttResponse::from_text(text));
        self
    }

    /// Sets a raw default result, bypassing normalization.
    pub fn with_result(mut self, response: SttResponse) -> Self {
        self.default = Ok(response);
        self
    }

    /// Makes every unscripted call fail.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.default = Err(message.to_string());
        self
    }

    /// Queues a scripted outcome consumed before the default applies.
    pub fn then(self, outcome: std::result::Result<SttResponse, String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Adds artificial latency to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of transcribe calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SttClient for MockSttClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn transcribe(
        &self,
        _chunk: &AggregatedChunk,
        _opts: &TranscriptionOptions,
    ) -> Result<SttResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.default.clone());
        outcome.map_err(|message| KaigiError::Transcription { message })
    }
}
