//! Transcription dispatch queue.
//!
//! Feeds aggregated chunks through the STT orchestrator with bounded
//! concurrency, then turns responses into cleaned transcript lines and
//! speaker-tagged segments. Segments are released in dispatch order even
//! when network completions interleave, so live captions never reorder.

use crate::chunk::AggregatedChunk;
use crate::defaults;
use crate::error::Result;
use crate::queue::dispatch::{DispatchConfig, DispatchQueue, JobHandler, QueueEvent};
use crate::queue::report::ErrorReporter;
use crate::stt::{SttOrchestrator, SttResponse, TranscriptionOptions};
use crate::text::{basic_punctuate, remove_fillers};
use crate::transcript::TranscriptSegment;
use crate::transcript::assembler::SegmentAssembler;
use crate::transcript::turn::TurnTracker;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events emitted toward the live transcript.
#[derive(Debug, PartialEq)]
pub enum TranscriptEvent {
    /// A cleaned transcript line, ready for display.
    Line(String),
    /// A finalized, speaker-tagged segment.
    Segment(TranscriptSegment),
    /// Cleaned text of a whole chunk, for the translation path.
    SourceText(String),
    /// Advisory per-job failure; the queue continues.
    Error(String),
    /// No backlog and no in-flight work remain.
    Drained,
}

/// Configuration for the transcription queue.
#[derive(Debug, Clone)]
pub struct TranscriptionQueueConfig {
    pub dispatch: DispatchConfig,
    pub options: TranscriptionOptions,
}

impl Default for TranscriptionQueueConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig {
                concurrency: defaults::TRANSCRIPTION_CONCURRENCY,
                backlog_cap: defaults::TRANSCRIPTION_BACKLOG,
                min_spacing_ms: 0,
            },
            options: TranscriptionOptions::default(),
        }
    }
}

struct TranscribeHandler {
    orchestrator: Arc<SttOrchestrator>,
    options: TranscriptionOptions,
}

#[async_trait]
impl JobHandler<AggregatedChunk, SttResponse> for TranscribeHandler {
    async fn run(&self, chunk: AggregatedChunk) -> Result<SttResponse> {
        self.orchestrator.transcribe(&chunk, &self.options).await
    }
}

/// Handle to the running transcription queue.
pub struct TranscriptionQueue {
    queue: DispatchQueue<AggregatedChunk>,
    pump: Option<JoinHandle<()>>,
}

impl TranscriptionQueue {
    /// Spawns the queue and its result pump.
    ///
    /// `epoch` anchors the fallback timestamps of segments whose provider
    /// reported no timing; pass the session start instant.
    pub fn spawn(
        config: TranscriptionQueueConfig,
        orchestrator: Arc<SttOrchestrator>,
        turns: Arc<TurnTracker>,
        events: mpsc::Sender<TranscriptEvent>,
        reporter: Arc<dyn ErrorReporter>,
        active: Arc<AtomicBool>,
        epoch: Instant,
    ) -> Self {
        let handler = Arc::new(TranscribeHandler {
            orchestrator,
            options: config.options.clone(),
        });
        let (qe_tx, qe_rx) = mpsc::channel::<QueueEvent<SttResponse>>(32);
        let queue = DispatchQueue::spawn_with_flag(config.dispatch, handler, qe_tx, active.clone());

        let pump = tokio::spawn(pump(qe_rx, turns, events, reporter, active, epoch));

        Self {
            queue,
            pump: Some(pump),
        }
    }

    /// Submits one aggregated chunk.
    pub fn submit(&self, chunk: AggregatedChunk) -> bool {
        self.queue.submit(chunk)
    }

    /// Stops the queue; pending backlog is cleared and in-flight results
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
    mut qe_rx: mpsc::Receiver<QueueEvent<SttResponse>>,
    turns: Arc<TurnTracker>,
    events: mpsc::Sender<TranscriptEvent>,
    reporter: Arc<dyn ErrorReporter>,
    active: Arc<AtomicBool>,
    epoch: Instant,
) {
    let mut assembler: SegmentAssembler<SttResponse> = SegmentAssembler::new();
    let mut next_id: u64 = 0;

    while let Some(event) = qe_rx.recv().await {
        match event {
            QueueEvent::Completed { seq, result } => {
                for response in assembler.insert(seq, Some(result)) {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    emit(&response, &turns, &events, &mut next_id, epoch).await;
                }
            }
            QueueEvent::Failed { seq, error } => {
                reporter.report("transcription", &error);
                let _ = events.send(TranscriptEvent::Error(error.to_string())).await;
                for response in assembler.insert(seq, None) {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    emit(&response, &turns, &events, &mut next_id, epoch).await;
                }
            }
            QueueEvent::Drained => {
                let _ = events.send(TranscriptEvent::Drained).await;
            }
        }
    }
}

async fn emit(
    response: &SttResponse,
    turns: &TurnTracker,
    events: &mpsc::Sender<TranscriptEvent>,
    next_id: &mut u64,
    epoch: Instant,
) {
    let elapsed_ms = epoch.elapsed().as_millis() as u64;
    let speaker = turns.current();

    let mut pieces: Vec<&str> = Vec::new();
    for segment in &response.segments {
        let piece = basic_punctuate(&remove_fillers(&segment.text));
        if piece.is_empty() {
            continue;
        }
        pieces.push(&segment.text);

        let start_ms = segment
            .start
            .map(|s| (s.max(0.0) * 1000.0) as u64)
            .unwrap_or(elapsed_ms);
        let end_ms = segment.end.map(|s| (s.max(0.0) * 1000.0) as u64);

        let id = format!("seg-{}", *next_id);
        *next_id += 1;

        let _ = events.send(TranscriptEvent::Line(piece.clone())).await;
        let _ = events
            .send(TranscriptEvent::Segment(TranscriptSegment {
                id,
                text: piece,
                speaker,
                start_ms,
                end_ms,
            }))
            .await;
    }

    // Cleaned chunk text for the translation path.
    let joined = pieces.join(" ");
    let base = basic_punctuate(&remove_fillers(&joined));
    if !base.is_empty() {
        let _ = events.send(TranscriptEvent::SourceText(base)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::{MockSttClient, Provider};
    use crate::queue::report::CollectingReporter;
    use crate::chunk::AggregatedChunk;
    use std::time::Duration;

    fn chunk() -> AggregatedChunk {
        AggregatedChunk {
            bytes: vec![0; 8192],
            mime: "audio/wav".to_string(),
            pcm: None,
        }
    }

    fn spawn_queue(
        client: MockSttClient,
    ) -> (
        TranscriptionQueue,
        mpsc::Receiver<TranscriptEvent>,
        Arc<CollectingReporter>,
        Arc<AtomicBool>,
    ) {
        let orchestrator = Arc::new(SttOrchestrator::from_clients(vec![Arc::new(client)]));
        let turns = Arc::new(TurnTracker::default());
        let reporter = Arc::new(CollectingReporter::new());
        let active = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(64);
        let queue = TranscriptionQueue::spawn(
            TranscriptionQueueConfig::default(),
            orchestrator,
            turns,
            tx,
            reporter.clone(),
            active.clone(),
            Instant::now(),
        );
        (queue, rx, reporter, active)
    }

    async fn collect_until_drained(rx: &mut mpsc::Receiver<TranscriptEvent>) -> Vec<TranscriptEvent> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            if event == TranscriptEvent::Drained {
                break;
            }
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_plain_text_result_becomes_line_segment_and_source() {
        let client = MockSttClient::new(Provider::Groq).with_response("こんにちは");
        let (queue, mut rx, _, _) = spawn_queue(client);

        queue.submit(chunk());
        let events = collect_until_drained(&mut rx).await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TranscriptEvent::Line("こんにちは。".to_string()));
        let TranscriptEvent::Segment(seg) = &events[1] else {
            panic!("expected segment, got {:?}", events[1]);
        };
        assert_eq!(seg.text, "こんにちは。");
        assert_eq!(seg.id, "seg-0");
        assert_eq!(
            events[2],
            TranscriptEvent::SourceText("こんにちは。".to_string())
        );

        queue.stop();
        queue.join().await;
    }

    #[tokio::test]
    async fn test_provider_segments_keep_timestamps() {
        use crate::stt::{SttResponse, SttSegment};
        let response = SttResponse {
            text: "全文".to_string(),
            segments: vec![
                SttSegment {
                    text: "前半".to_string(),
                    start: Some(0.5),
                    end: Some(2.0),
                },
                SttSegment {
                    text: "後半".to_string(),
                    start: Some(2.5),
                    end: None,
                },
            ],
        };
        let client = MockSttClient::new(Provider::Groq).with_result(response);
        let (queue, mut rx, _, _) = spawn_queue(client);

        queue.submit(chunk());
        let events = collect_until_drained(&mut rx).await;

        let segments: Vec<&TranscriptSegment> = events
            .iter()
            .filter_map(|e| match e {
                TranscriptEvent::Segment(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_ms, 500);
        assert_eq!(segments[0].end_ms, Some(2000));
        assert_eq!(segments[1].start_ms, 2500);
        assert_eq!(segments[1].end_ms, None);

        queue.stop();
        queue.join().await;
    }

    #[tokio::test]
    async fn test_failure_is_advisory_and_queue_continues() {
        let client = MockSttClient::new(Provider::Groq)
            .with_response("after")
            .then(Err("provider down".to_string()));
        let (queue, mut rx, reporter, _) = spawn_queue(client);

        queue.submit(chunk());
        queue.submit(chunk());
        let events = collect_until_drained(&mut rx).await;

        assert!(events.iter().any(|e| matches!(e, TranscriptEvent::Error(_))));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, TranscriptEvent::Line(l) if l == "after。"))
        );
        assert_eq!(reporter.reports().len(), 1);

        queue.stop();
        queue.join().await;
    }

    #[tokio::test]
    async fn test_stop_discards_inflight_results() {
        let client = MockSttClient::new(Provider::Groq)
            .with_response("late")
            .with_delay(Duration::from_millis(100));
        let (queue, mut rx, _, _) = spawn_queue(client);

        queue.submit(chunk());
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.stop();
        queue.join().await;

        // No transcript mutation from the in-flight job.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_text_is_skipped() {
        let client = MockSttClient::new(Provider::Groq).with_response("");
        let (queue, mut rx, _, _) = spawn_queue(client);

        queue.submit(chunk());
        let events = collect_until_drained(&mut rx).await;
        assert!(events.is_empty(), "unexpected events: {:?}", events);

        queue.stop();
        queue.join().await;
    }
}
