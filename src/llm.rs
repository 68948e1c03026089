//! Translation/summarization client.
//!
//! Thin client for the application's LLM proxy endpoint. The core only ever
//! submits text and receives text back; prompt construction and vendor
//! routing happen server-side.

use crate::error::{KaigiError, Result};
use crate::stt::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Task selector for the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmTask {
    Translate,
    Summary,
}

/// Pass-through options interpreted server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_formality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_detail: Option<String>,
    #[serde(rename = "includeTLDR", skip_serializing_if = "Option::is_none")]
    pub include_tldr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_decisions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_discussion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_risks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_issues: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_next_actions: Option<bool>,
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub task: LlmTask,
    pub text: String,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub options: Option<LlmOptions>,
}

impl LlmRequest {
    pub fn translate(
        text: impl Into<String>,
        source_lang: Option<String>,
        target_lang: Option<String>,
    ) -> Self {
        Self {
            task: LlmTask::Translate,
            text: text.into(),
            source_lang,
            target_lang,
            options: None,
        }
    }

    pub fn with_options(mut self, options: LlmOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Trait for completion clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs one request and returns the output text.
    async fn complete(&self, request: &LlmRequest) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LlmPayload<'a> {
    task: LlmTask,
    provider: Provider,
    api_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_lang: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a LlmOptions>,
}

#[derive(Deserialize)]
struct LlmResponseBody {
    #[serde(default)]
    output: String,
}

#[derive(Deserialize)]
struct LlmErrorBody {
    #[serde(default)]
    error: String,
    detail: Option<String>,
}

/// LLM client that talks to the HTTP proxy collaborator.
pub struct ProxyLlmClient {
    provider: Provider,
    api_key: String,
    model: Option<String>,
    endpoint: String,
    http: reqwest::Client,
}

impl ProxyLlmClient {
    pub fn new(base_url: &str, provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            endpoint: format!("{}/api/llm/complete", base_url.trim_end_matches('/')),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl LlmClient for ProxyLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        let payload = LlmPayload {
            task: request.task,
            provider: self.provider,
            api_key: &self.api_key,
            model: self.model.as_deref(),
            text: &request.text,
            source_lang: request.source_lang.as_deref(),
            target_lang: request.target_lang.as_deref(),
            options: request.options.as_ref(),
        };

        let response = self.http.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<LlmErrorBody>(&body)
                .map(|e| e.detail.unwrap_or(e.error))
                .unwrap_or(body);
            return Err(KaigiError::LlmProxy {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        let body: LlmResponseBody = response.json().await?;
        if body.output.is_empty() {
            return Err(KaigiError::Translation {
                message: "empty output from provider".to_string(),
            });
        }
        Ok(body.output)
    }
}

/// Scriptable completion client for tests.
pub struct MockLlmClient {
    prefix: String,
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// Responds with `{prefix}{input text}`.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            script: Mutex::new(VecDeque::new()),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a scripted outcome consumed before the default applies.
    pub fn then(self, outcome: std::result::Result<String, String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(outcome) = self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            return outcome.map_err(|message| KaigiError::Translation { message });
        }
        if self.fail {
            return Err(KaigiError::Translation {
                message: "mock failure".to_string(),
            });
        }
        Ok(format!("{}{}", self.prefix, request.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_names_match_proxy_contract() {
        let options = LlmOptions {
            translation_formality: Some("formal".to_string()),
            include_tldr: Some(true),
            ..Default::default()
        };
        let payload = LlmPayload {
            task: LlmTask::Translate,
            provider: Provider::Groq,
            api_key: "key",
            model: None,
            text: "こんにちは",
            source_lang: Some("ja"),
            target_lang: Some("en"),
            options: Some(&options),
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["task"], "translate");
        assert_eq!(json["provider"], "groq");
        assert_eq!(json["apiKey"], "key");
        assert_eq!(json["sourceLang"], "ja");
        assert_eq!(json["targetLang"], "en");
        assert_eq!(json["options"]["translationFormality"], "formal");
        assert_eq!(json["options"]["includeTLDR"], true);
        assert!(json.get("model").is_none());
        assert!(json["options"].get("summaryDetail").is_none());
    }

    #[tokio::test]
    async fn test_mock_client_prefixes_text() {
        let client = MockLlmClient::new("EN: ");
        let out = client
            .complete(&LlmRequest::translate(
                "こんにちは",
                Some("ja".to_string()),
                Some("en".to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(out, "EN: こんにちは");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_scripted_failure() {
        let client = MockLlmClient::new("").then(Err("rate limited".to_string()));
        let err = client
            .complete(&LlmRequest::translate("x", None, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
