//! Capture loop.
//!
//! Polls the audio source on a dedicated thread and fans every batch out to
//! the VAD engine, the level meter, and the PCM chunker. Cut chunks cross to
//! the async side over a tokio channel via `blocking_send`; a cleared active
//! flag or a dropped receiver ends the loop. Teardown never propagates
//! errors to the caller.

use crate::audio::detector::VadEngine;
use crate::audio::level::LevelMeter;
use crate::audio::pcm::PcmChunker;
use crate::audio::source::AudioSource;
use crate::chunk::RawChunk;
use crate::error::{KaigiError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// Starts the capture thread.
///
/// The loop runs until `active` is cleared, the source errors, or the chunk
/// receiver is dropped.
pub fn spawn_capture(
    mut source: Box<dyn AudioSource>,
    vad: Arc<dyn VadEngine>,
    level: Arc<LevelMeter>,
    mut pcm: PcmChunker,
    chunk_tx: mpsc::Sender<RawChunk>,
    active: Arc<AtomicBool>,
    poll_interval_ms: u64,
) -> Result<JoinHandle<()>> {
    source.start()?;
    let poll_interval = Duration::from_millis(poll_interval_ms);

    std::thread::Builder::new()
        .name("kaigi-capture".to_string())
        .spawn(move || {
            while active.load(Ordering::SeqCst) {
                match source.read_samples() {
                    Ok(samples) if !samples.is_empty() => {
                        level.push(&samples);
                        vad.feed(&samples);
                        match pcm.push(&samples) {
                            Ok(Some(chunk)) => {
                                if chunk_tx.blocking_send(chunk).is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "PCM chunk encode failed");
                            }
                        }
                    }
                    Ok(_) => {
                        // Keep the cadence running while the source is quiet
                        // so a partially filled buffer still gets cut.
                        if let Ok(Some(chunk)) = pcm.push(&[])
                            && chunk_tx.blocking_send(chunk).is_err()
                        {
                            break;
                        }
                        std::thread::sleep(poll_interval);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "audio source read failed, stopping capture");
                        break;
                    }
                }
            }

            if let Err(e) = source.stop() {
                tracing::debug!(error = %e, "audio source stop failed");
            }
        })
        .map_err(|e| KaigiError::AudioCapture {
            message: format!("Failed to spawn capture thread: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::detector::{CallbackVad, VadHandlers};
    use crate::audio::source::ScriptedAudioSource;
    use crate::audio::vad::VadParams;
    use crate::defaults;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_capture_fans_out_and_cuts_chunks() {
        let batches = vec![vec![0.3f32; 4096]; 8];
        let source = ScriptedAudioSource::new(batches, 16000);
        let vad: Arc<dyn VadEngine> = Arc::new(CallbackVad::new(
            VadParams::default(),
            2048,
            Arc::new(VadHandlers::new()),
        ));
        let level = Arc::new(LevelMeter::new(defaults::LEVEL_WINDOW_MS, 16000));
        // chunk_ms 0: every push past the first cuts a chunk
        let pcm = PcmChunker::new(16000, 0);
        let (tx, mut rx) = mpsc::channel(16);
        let active = Arc::new(AtomicBool::new(true));

        let handle = spawn_capture(
            Box::new(source),
            vad,
            level.clone(),
            pcm,
            tx,
            active.clone(),
            1,
        )
        .unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("capture produced no chunk")
            .expect("channel closed early");
        assert_eq!(chunk.mime, "audio/wav");
        assert!(chunk.pcm.is_some());
        assert!(level.level() > 0.0);

        active.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_capture_stops_on_cleared_flag() {
        let source = ScriptedAudioSource::new(Vec::new(), 16000);
        let vad: Arc<dyn VadEngine> = Arc::new(CallbackVad::new(
            VadParams::default(),
            2048,
            Arc::new(VadHandlers::new()),
        ));
        let level = Arc::new(LevelMeter::new(defaults::LEVEL_WINDOW_MS, 16000));
        let pcm = PcmChunker::new(16000, defaults::CHUNK_MS);
        let (tx, _rx) = mpsc::channel(16);
        let active = Arc::new(AtomicBool::new(true));

        let handle = spawn_capture(
            Box::new(source),
            vad,
            level,
            pcm,
            tx,
            active.clone(),
            1,
        )
        .unwrap();

        active.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
