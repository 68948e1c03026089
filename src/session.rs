//! Recording session.
//!
//! Wires the whole pipeline for one recording: capture thread fanning the
//! live stream to VAD / level meter / PCM chunker, the chunk aggregator, the
//! transcription queue, and the translation queue. The host receives
//! everything over one event channel and controls the session through this
//! handle.
//!
//! Stopping is synchronous and never throws: the capture thread winds down,
//! audio resources are released with errors suppressed, queue backlogs are
//! cleared, and a session-scoped active flag makes any in-flight network
//! result a no-op.

use crate::audio::capture::spawn_capture;
use crate::audio::detector::{VadEngine, VadHandlers, build_detector};
use crate::audio::level::LevelMeter;
use crate::audio::pcm::PcmChunker;
use crate::audio::source::AudioSource;
use crate::audio::vad::VadParams;
use crate::chunk::{ChunkAggregator, RawChunk};
use crate::config::Config;
use crate::dictionary::Mapping;
use crate::error::{KaigiError, Result};
use crate::llm::LlmClient;
use crate::queue::dispatch::DispatchConfig;
use crate::queue::report::ErrorReporter;
use crate::queue::transcription::{TranscriptEvent, TranscriptionQueue, TranscriptionQueueConfig};
use crate::queue::translation::{TranslationQueue, TranslationQueueConfig};
use crate::stt::{SttOrchestrator, TranscriptionOptions};
use crate::transcript::TranscriptSegment;
use crate::transcript::turn::TurnTracker;
use crate::defaults;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Events delivered to the host, in live order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A cleaned transcript line for the live caption view.
    TranscriptLine(String),
    /// A finalized, speaker-tagged segment.
    Segment(TranscriptSegment),
    /// A translated text, in completion order.
    Translation(String),
    /// Transcription work is outstanding (true) or fully drained (false).
    Pending(bool),
    /// Advisory failure; the session keeps running.
    Error(String),
}

/// Handle to a running recording session.
pub struct RecordingSession {
    active: Arc<AtomicBool>,
    capture: Option<std::thread::JoinHandle<()>>,
    vad: Arc<dyn VadEngine>,
    level: Arc<LevelMeter>,
    turns: Arc<TurnTracker>,
    chunk_tx: Option<mpsc::Sender<RawChunk>>,
    transcription: Option<Arc<TranscriptionQueue>>,
    translation: Option<Arc<TranslationQueue>>,
}

impl RecordingSession {
    /// Starts a session. Must be called within a tokio runtime.
    ///
    /// Fails fast with [`KaigiError::NoSttClientConfigured`] when STT is
    /// enabled but no provider credential exists — nothing is started in
    /// that case.
    pub fn start(
        config: &Config,
        source: Box<dyn AudioSource>,
        orchestrator: Arc<SttOrchestrator>,
        llm: Option<Arc<dyn LlmClient>>,
        mappings: Vec<Mapping>,
        events: mpsc::Sender<SessionEvent>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        if config.stt.enabled && !orchestrator.is_configured() {
            return Err(KaigiError::NoSttClientConfigured);
        }

        let active = Arc::new(AtomicBool::new(true));
        let sample_rate = source.sample_rate();
        let epoch = Instant::now();

        let turns = Arc::new(TurnTracker::new(config.vad.turn_silence_ms));
        let level = Arc::new(LevelMeter::new(config.audio.level_window_ms, sample_rate));

        // Live turn alternation from VAD events.
        let vad_params = VadParams {
            threshold_db: config.vad.threshold_db,
            hangover_ms: config.vad.hangover_ms,
        };
        let handlers = {
            let start_turns = turns.clone();
            let end_turns = turns.clone();
            VadHandlers::new()
                .on_speech_start(move |at_ms| start_turns.on_speech_start(at_ms))
                .on_speech_end(move |at_ms| end_turns.on_speech_end(at_ms))
        };
        let vad = build_detector(
            config.vad.prefer_worker,
            vad_params,
            config.vad.frame_size,
            handlers,
        );

        // Translation queue (optional).
        let translation = if config.translate.enabled && config.stt.enabled {
            match llm {
                Some(client) => {
                    let (out_tx, out_rx) = mpsc::channel::<String>(32);
                    let queue = Arc::new(TranslationQueue::spawn(
                        TranslationQueueConfig {
                            dispatch: DispatchConfig {
                                concurrency: defaults::TRANSLATION_CONCURRENCY,
                                backlog_cap: config.translate.backlog_cap,
                                min_spacing_ms: config.translate.min_spacing_ms,
                            },
                            source_lang: Some(config.stt.language.clone()),
                            target_lang: Some(config.translate.target_language.clone()),
                            formality: Some(config.translate.formality.clone()),
                            use_dictionary: config.translate.use_dictionary,
                            mappings,
                        },
                        client,
                        out_tx,
                        reporter.clone(),
                        active.clone(),
                    ));
                    tokio::spawn(translation_pump(out_rx, events.clone()));
                    Some(queue)
                }
                None => {
                    tracing::warn!("translation enabled but no LLM client given, disabling");
                    None
                }
            }
        } else {
            None
        };

        // Transcription queue.
        let transcription = if config.stt.enabled {
            let (tr_tx, tr_rx) = mpsc::channel::<TranscriptEvent>(64);
            let queue = Arc::new(TranscriptionQueue::spawn(
                TranscriptionQueueConfig {
                    dispatch: DispatchConfig {
                        concurrency: defaults::TRANSCRIPTION_CONCURRENCY,
                        backlog_cap: defaults::TRANSCRIPTION_BACKLOG,
                        min_spacing_ms: 0,
                    },
                    options: TranscriptionOptions {
                        language: Some(config.stt.language.clone()),
                        ..Default::default()
                    },
                },
                orchestrator,
                turns.clone(),
                tr_tx,
                reporter.clone(),
                active.clone(),
                epoch,
            ));
            tokio::spawn(forward_pump(tr_rx, events.clone(), translation.clone()));
            Some(queue)
        } else {
            None
        };

        // Aggregation: raw chunks in, bounded upload-ready chunks out.
        let (chunk_tx, chunk_rx) = mpsc::channel::<RawChunk>(16);
        tokio::spawn(aggregation_pump(
            chunk_rx,
            ChunkAggregator::new(config.aggregator.clone()),
            transcription.clone(),
            events.clone(),
            active.clone(),
        ));

        // Capture thread: the stream fan-out.
        let pcm = PcmChunker::new(sample_rate, config.audio.chunk_ms);
        let capture = match spawn_capture(
            source,
            vad.clone(),
            level.clone(),
            pcm,
            chunk_tx.clone(),
            active.clone(),
            config.audio.poll_interval_ms,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                active.store(false, Ordering::SeqCst);
                vad.stop();
                if let Some(queue) = &transcription {
                    queue.stop();
                }
                if let Some(queue) = &translation {
                    queue.stop();
                }
                return Err(e);
            }
        };

        Ok(Self {
            active,
            capture: Some(capture),
            vad,
            level,
            turns,
            chunk_tx: Some(chunk_tx),
            transcription,
            translation,
        })
    }

    /// Injects an encoded chunk from a host-owned capture path.
    ///
    /// Never blocks; returns false when the session is stopped or the
    /// aggregation channel is saturated.
    pub fn push_chunk(&self, chunk: RawChunk) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        match &self.chunk_tx {
            Some(tx) => tx.try_send(chunk).is_ok(),
            None => false,
        }
    }

    /// Applies new VAD parameters without restarting the detector.
    pub fn update_vad(&self, params: VadParams) {
        self.vad.update(params);
    }

    /// Updates the speaker-turn silence threshold live.
    pub fn update_turn_silence(&self, ms: u64) {
        self.turns.set_turn_silence_ms(ms);
    }

    /// Current input level (short-window RMS, 0.0 to ~1.0).
    pub fn level(&self) -> f32 {
        self.level.level()
    }

    /// True until `stop()` is called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stops the session synchronously.
    ///
    /// Clears pending backlogs, discards in-flight results, and releases
    /// audio resources. Teardown failures are suppressed; repeated calls
    /// are no-ops.
    pub fn stop(&mut self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        // The capture thread exits on the cleared flag; join so the audio
        // source is released before we return.
        if let Some(handle) = self.capture.take() {
            let _ = handle.join();
        }
        self.vad.stop();

        if let Some(queue) = &self.transcription {
            queue.stop();
        }
        if let Some(queue) = &self.translation {
            queue.stop();
        }

        // Closing the chunk channel ends the aggregation pump.
        self.chunk_tx = None;
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn aggregation_pump(
    mut chunk_rx: mpsc::Receiver<RawChunk>,
    mut aggregator: ChunkAggregator,
    transcription: Option<Arc<TranscriptionQueue>>,
    events: mpsc::Sender<SessionEvent>,
    active: Arc<AtomicBool>,
) {
    let mut tick = tokio::time::interval(Duration::from_millis(50));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            maybe = chunk_rx.recv() => match maybe {
                Some(chunk) => aggregator.push(chunk),
                None => break,
            },
            _ = tick.tick() => {
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                aggregator.flush_if_due();
            }
        }

        while let Some(chunk) = aggregator.pop() {
            let Some(queue) = &transcription else {
                continue;
            };
            if queue.submit(chunk) {
                let _ = events.send(SessionEvent::Pending(true)).await;
            }
        }
    }
}

async fn forward_pump(
    mut transcript_rx: mpsc::Receiver<TranscriptEvent>,
    events: mpsc::Sender<SessionEvent>,
    translation: Option<Arc<TranslationQueue>>,
) {
    while let Some(event) = transcript_rx.recv().await {
        match event {
            TranscriptEvent::Line(line) => {
                let _ = events.send(SessionEvent::TranscriptLine(line)).await;
            }
            TranscriptEvent::Segment(segment) => {
                let _ = events.send(SessionEvent::Segment(segment)).await;
            }
            TranscriptEvent::SourceText(text) => {
                if let Some(queue) = &translation {
                    queue.submit(&text);
                }
            }
            TranscriptEvent::Error(message) => {
                let _ = events.send(SessionEvent::Error(message)).await;
            }
            TranscriptEvent::Drained => {
                let _ = events.send(SessionEvent::Pending(false)).await;
            }
        }
    }
}

async fn translation_pump(
    mut outputs: mpsc::Receiver<String>,
    events: mpsc::Sender<SessionEvent>,
) {
    while let Some(text) = outputs.recv().await {
        let _ = events.send(SessionEvent::Translation(text)).await;
    }
}
