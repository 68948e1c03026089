//! Translation dispatch queue.
//!
//! Paces translation requests against upstream rate limits: bounded
//! concurrency plus a minimum spacing between dispatch starts, with
//! drop-oldest backlog coalescing. Texts pass through the terminology
//! dictionary at enqueue time. Outputs are emitted in arrival order —
//! in-order delivery is guaranteed for transcripts, not translations.

use crate::defaults;
use crate::dictionary::{Mapping, apply_mappings};
use crate::error::Result;
use crate::llm::{LlmClient, LlmRequest};
use crate::queue::dispatch::{DispatchConfig, DispatchQueue, JobHandler, QueueEvent};
use crate::queue::report::ErrorReporter;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Configuration for the translation queue.
#[derive(Debug, Clone)]
pub struct TranslationQueueConfig {
    pub dispatch: DispatchConfig,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    /// Formality hint passed through to the provider.
    pub formality: Option<String>,
    pub use_dictionary: bool,
    pub mappings: Vec<Mapping>,
}

impl Default for TranslationQueueConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig {
                concurrency: defaults::TRANSLATION_CONCURRENCY,
                backlog_cap: defaults::TRANSLATION_BACKLOG,
                min_spacing_ms: defaults::TRANSLATION_SPACING_MS,
            },
            source_lang: None,
            target_lang: None,
            formality: None,
            use_dictionary: false,
            mappings: Vec::new(),
        }
    }
}

struct TranslateHandler {
    client: Arc<dyn LlmClient>,
    source_lang: Option<String>,
    target_lang: Option<String>,
    formality: Option<String>,
}

#[async_trait]
impl JobHandler<String, String> for TranslateHandler {
    async fn run(&self, text: String) -> Result<String> {
        let mut request =
            LlmRequest::translate(text, self.source_lang.clone(), self.target_lang.clone());
        if let Some(formality) = &self.formality {
            request = request.with_options(crate::llm::LlmOptions {
                translation_formality: Some(formality.clone()),
                ..Default::default()
            });
        }
        self.client.complete(&request).await
    }
}

/// Handle to the running translation queue.
pub struct TranslationQueue {
    queue: DispatchQueue<String>,
    use_dictionary: bool,
    mappings: Vec<Mapping>,
    pump: Option<JoinHandle<()>>,
}

impl TranslationQueue {
    /// Spawns the queue; translated texts arrive on `outputs` in completion
    /// order.
    pub fn spawn(
        config: TranslationQueueConfig,
        client: Arc<dyn LlmClient>,
        outputs: mpsc::Sender<String>,
        reporter: Arc<dyn ErrorReporter>,
        active: Arc<AtomicBool>,
    ) -> Self {
        let handler = Arc::new(TranslateHandler {
            client,
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            formality: config.formality.clone(),
        });
        let (qe_tx, qe_rx) = mpsc::channel::<QueueEvent<String>>(64);
        let queue = DispatchQueue::spawn_with_flag(config.dispatch, handler, qe_tx, active);

        let pump = tokio::spawn(pump(qe_rx, outputs, reporter));

        Self {
            queue,
            use_dictionary: config.use_dictionary,
            mappings: config.mappings,
            pump: Some(pump),
        }
    }

    /// Enqueues one text, rewriting it through the dictionary first.
    pub fn submit(&self, text: &str) -> bool {
        let text = if self.use_dictionary && !self.mappings.is_empty() {
            apply_mappings(text, &self.mappings)
        } else {
            text.to_string()
        };
        self.queue.submit(text)
    }

    /// Stops the queue; pending texts are cleared and in-flight results
    /// are discarded.
    pub fn stop(&self) {
        self.queue.stop();
    }

    /// Waits for the queue and pump to wind down. Call after `stop()`.
    pub async fn join(mut self) {
        self.queue.join().await;
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
    }
}

async fn pump(
    mut qe_rx: mpsc::Receiver<QueueEvent<String>>,
    outputs: mpsc::Sender<String>,
    reporter: Arc<dyn ErrorReporter>,
) {
    while let Some(event) = qe_rx.recv().await {
        match event {
            QueueEvent::Completed { result, .. } => {
                let _ = outputs.send(result).await;
            }
            QueueEvent::Failed { error, .. } => {
                reporter.report("translation", &error);
            }
            QueueEvent::Drained => {}
        }
    }
}
