//! Proxy-backed STT client.
//!
//! Submits aggregated chunks as multipart form data to the application's
//! transcription proxy, which forwards them to the configured vendor. The
//! proxy contract: fields `file`, `provider`, `apiKey`, optional `model` /
//! `language` / `prompt` / `temperature`; response `{text, segments}` or
//! `{error, detail?}` with a non-2xx status.

use crate::audio::wav::{decode_wav, encode_wav_mono};
use crate::chunk::AggregatedChunk;
use crate::error::{KaigiError, Result};
use crate::stt::types::{Provider, SttClient, SttResponse, SttSegment, TranscriptionOptions};
use async_trait::async_trait;
use serde::Deserialize;

/// STT client that talks to the HTTP proxy collaborator.
pub struct ProxySttClient {
    provider: Provider,
    api_key: String,
    model: Option<String>,
    endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    text: String,
    segments: Option<Vec<SttSegment>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    detail: Option<String>,
}

impl ProxySttClient {
    pub fn new(base_url: &str, provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            endpoint: format!("{}/api/stt/transcribe", base_url.trim_end_matches('/')),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    async fn post_blob(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        opts: &TranscriptionOptions,
    ) -> Result<SttResponse> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename_for_mime(mime))
            .mime_str(mime)
            .map_err(|e| KaigiError::Other(format!("invalid MIME type {}: {}", mime, e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("provider", self.provider.as_str())
            .text("apiKey", self.api_key.clone());
        if let Some(model) = &self.model {
            form = form.text("model", model.clone());
        }
        if let Some(language) = &opts.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &opts.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(temperature) = opts.temperature {
            form = form.text("temperature", temperature.to_string());
        }

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.detail.unwrap_or(e.error))
                .unwrap_or(body);
            return Err(KaigiError::SttProxy {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        let raw: RawResponse = response.json().await?;
        Ok(SttResponse::normalized(raw.text, raw.segments))
    }
}

#[async_trait]
impl SttClient for ProxySttClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn transcribe(
        &self,
        chunk: &AggregatedChunk,
        opts: &TranscriptionOptions,
    ) -> Result<SttResponse> {
        match self.post_blob(chunk.bytes.clone(), &chunk.mime, opts).await {
            Ok(response) => Ok(response),
            Err(err) if looks_like_format_rejection(&err) => {
                let Some((samples, sample_rate)) = recover_pcm(chunk) else {
                    return Err(err);
                };
                tracing::debug!(provider = %self.provider, "container rejected, retrying as mono WAV");
                let wav = encode_wav_mono(&samples, sample_rate)?;
                self.post_blob(wav, "audio/wav", opts).await
            }
            Err(err) => Err(err),
        }
    }
}

/// Maps a MIME type hint to the filename extension the vendors expect.
pub(crate) fn filename_for_mime(mime: &str) -> String {
    let ext = if mime.contains("webm") {
        "webm"
    } else if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("mp4") {
        "m4a"
    } else if mime.contains("mpeg") {
        "mp3"
    } else if mime.contains("wav") {
        "wav"
    } else {
        "webm"
    };
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("chunk-{}.{}", ts, ext)
}

/// Classifies a proxy error as a container-format rejection worth one
/// re-encode-and-retry.
pub(crate) fn looks_like_format_rejection(err: &KaigiError) -> bool {
    let KaigiError::SttProxy { status, detail, .. } = err else {
        return false;
    };
    if !matches!(status, 400 | 415 | 422 | 502) {
        return false;
    }
    let detail = detail.to_lowercase();
    ["format", "decode", "could not process", "unsupported", "invalid file"]
        .iter()
        .any(|needle| detail.contains(needle))
}

/// Recovers PCM for the WAV retry: prefer the sidecar, else decode a WAV
/// container. Opaque compressed containers cannot be recovered.
fn recover_pcm(chunk: &AggregatedChunk) -> Option<(Vec<f32>, u32)> {
    if let Some(pcm) = &chunk.pcm {
        return Some((pcm.samples.clone(), pcm.sample_rate));
    }
    if chunk.mime.contains("wav") {
        return decode_wav(&chunk.bytes).ok();
    }
    None
}
