//! STT orchestration with provider fallback.
//!
//! Builds an ordered client list from the available credentials — preferred
//! provider first — and tries them strictly in order for each request. One
//! client's failure moves on to the next; only the last error surfaces.

use crate::chunk::AggregatedChunk;
use crate::error::{KaigiError, Result};
use crate::stt::proxy::ProxySttClient;
use crate::stt::types::{Provider, SttClient, SttResponse, TranscriptionOptions};
use std::sync::Arc;

/// Credentials and preference for building the client list.
#[derive(Debug, Clone)]
pub struct SttOrchestratorConfig {
    pub prefer: Provider,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Model override passed through to the proxy.
    pub model: Option<String>,
    /// Base URL of the proxy collaborator.
    pub proxy_url: String,
}

/// Tries a prioritized list of STT clients for each transcription request.
pub struct SttOrchestrator {
    clients: Vec<Arc<dyn SttClient>>,
}

impl SttOrchestrator {
    /// Builds proxy clients for every provider with a credential, preferred
    /// provider first.
    pub fn new(cfg: &SttOrchestratorConfig) -> Self {
        let mut clients: Vec<Arc<dyn SttClient>> = Vec::new();
        let order = match cfg.prefer {
            Provider::Groq => [Provider::Groq, Provider::Openai],
            Provider::Openai => [Provider::Openai, Provider::Groq],
        };
        for provider in order {
            let key = match provider {
                Provider::Groq => cfg.groq_api_key.as_deref(),
                Provider::Openai => cfg.openai_api_key.as_deref(),
            };
            let Some(key) = key.filter(|k| !k.is_empty()) else {
                continue;
            };
            let mut client = ProxySttClient::new(&cfg.proxy_url, provider, key);
            if let Some(model) = &cfg.model {
                client = client.with_model(model.clone());
            }
            clients.push(Arc::new(client));
        }
        Self { clients }
    }

    /// Builds an orchestrator over pre-constructed clients, in order.
    pub fn from_clients(clients: Vec<Arc<dyn SttClient>>) -> Self {
        Self { clients }
    }

    /// True when at least one client is available.
    pub fn is_configured(&self) -> bool {
        !self.clients.is_empty()
    }

    /// Providers in fallback order.
    pub fn providers(&self) -> Vec<Provider> {
        self.clients.iter().map(|c| c.provider()).collect()
    }

    /// Transcribes one chunk, falling through the client list on failure.
    pub async fn transcribe(
        &self,
        chunk: &AggregatedChunk,
        opts: &TranscriptionOptions,
    ) -> Result<SttResponse> {
        let mut last_err: Option<KaigiError> = None;
        for client in &self.clients {
            match client.transcribe(chunk, opts).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::debug!(provider = %client.provider(), error = %e, "STT client failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(KaigiError::NoSttClientConfigured))
    }
}
