//! Audio source abstraction.
//!
//! The host application owns the actual capture device (microphone, tab
//! stream, file decode); the core consumes samples through this trait. The
//! stream is read-only-shared: the capture loop fans each batch out to the
//! VAD engine, the level meter, and the PCM chunker without any consumer
//! mutating another's view.

use crate::error::Result;
use std::collections::VecDeque;

/// Trait for live audio sources producing mono f32 samples in [-1.0, 1.0].
pub trait AudioSource: Send {
    /// Starts capture.
    fn start(&mut self) -> Result<()>;

    /// Stops capture and releases device resources.
    fn stop(&mut self) -> Result<()>;

    /// Reads the next batch of samples.
    ///
    /// Returns an empty vec when no samples are ready yet; the capture loop
    /// polls again after a short interval.
    fn read_samples(&mut self) -> Result<Vec<f32>>;

    /// Sample rate of the produced samples in Hz.
    fn sample_rate(&self) -> u32;
}

/// In-memory source that replays scripted batches, for tests and offline runs.
pub struct ScriptedAudioSource {
    batches: VecDeque<Vec<f32>>,
    sample_rate: u32,
    started: bool,
}

impl ScriptedAudioSource {
    pub fn new(batches: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            batches: batches.into(),
            sample_rate,
            started: false,
        }
    }

    /// Remaining scripted batches.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl AudioSource for ScriptedAudioSource {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        if !self.started {
            return Ok(Vec::new());
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
