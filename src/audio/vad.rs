//! Voice Activity Detection (VAD) module.
//!
//! Classifies analysis frames as speech or silence against an adaptive noise
//! floor and emits debounced speech-start / speech-end transitions with
//! timestamps relative to detector start.

use crate::defaults;
use std::time::Instant;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Live-updatable VAD parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadParams {
    /// Speech threshold above the adaptive noise floor, in dB.
    pub threshold_db: f32,
    /// Silence duration required before speech is considered ended (milliseconds).
    pub hangover_ms: u64,
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            threshold_db: defaults::VAD_THRESHOLD_DB,
            hangover_ms: defaults::VAD_HANGOVER_MS,
        }
    }
}

/// Transition events emitted by the detector.
///
/// Timestamps are milliseconds since the detector was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    /// Speech has started after silence.
    SpeechStart { at_ms: u64 },
    /// Speech has ended after the hangover elapsed.
    SpeechEnd { at_ms: u64 },
}

/// Voice activity detector with an adaptive noise floor.
///
/// Accepts arbitrary-length sample batches and slices them into fixed
/// analysis frames internally; the frame size is rounded up to a power of two.
pub struct Vad<C: Clock = SystemClock> {
    params: VadParams,
    frame_size: usize,
    pending: Vec<f32>,
    /// Adaptive noise floor in dB, asymmetrically smoothed.
    noise_db: f32,
    speaking: bool,
    /// Last instant speech evidence was seen (start or any speech frame).
    last_voice: Instant,
    t0: Instant,
    clock: C,
}

impl<C: Clock> Vad<C> {
    /// Creates a detector with the given parameters and clock.
    pub fn with_clock(params: VadParams, frame_size: usize, clock: C) -> Self {
        let now = clock.now();
        Self {
            params,
            frame_size: frame_size.max(1).next_power_of_two(),
            pending: Vec::new(),
            noise_db: defaults::NOISE_FLOOR_DB,
            speaking: false,
            last_voice: now,
            t0: now,
            clock,
        }
    }

    /// Feeds samples into the detector, returning any transitions they caused.
    ///
    /// Samples are mono f32 in [-1.0, 1.0]. Partial frames are buffered until
    /// enough samples arrive to fill the next analysis frame.
    pub fn push(&mut self, samples: &[f32]) -> Vec<VadTransition> {
        self.pending.extend_from_slice(samples);
        let mut transitions = Vec::new();
        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            if let Some(t) = self.process_frame(&frame) {
                transitions.push(t);
            }
        }
        transitions
    }

    fn process_frame(&mut self, frame: &[f32]) -> Option<VadTransition> {
        let rms = rms(frame);
        let db = 20.0 * (rms + 1e-9).log10();

        // Adapt the noise floor: fast drop toward quiet, slow rise so
        // sustained speech cannot pull it up.
        let alpha = if db < self.noise_db { 0.1 } else { 0.01 };
        self.noise_db = self.noise_db * (1.0 - alpha) + db * alpha;

        let is_speech = db > self.noise_db + self.params.threshold_db;
        let now = self.clock.now();

        if !self.speaking && is_speech {
            self.speaking = true;
            self.last_voice = now;
            return Some(VadTransition::SpeechStart {
                at_ms: self.elapsed_ms(now),
            });
        }

        if self.speaking {
            if is_speech {
                self.last_voice = now;
            } else if now.duration_since(self.last_voice).as_millis() as u64
                > self.params.hangover_ms
            {
                self.speaking = false;
                return Some(VadTransition::SpeechEnd {
                    at_ms: self.elapsed_ms(now),
                });
            }
        }

        None
    }

    fn elapsed_ms(&self, now: Instant) -> u64 {
        now.duration_since(self.t0).as_millis() as u64
    }

    /// Updates parameters without resetting detector state.
    pub fn set_params(&mut self, params: VadParams) {
        self.params = params;
    }

    /// Returns the current parameters.
    pub fn params(&self) -> VadParams {
        self.params
    }

    /// Returns true if speech is currently active.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Returns the current noise floor estimate in dB.
    pub fn noise_db(&self) -> f32 {
        self.noise_db
    }

    /// Returns the configured analysis frame size in samples.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Resets the detector to its initial state, keeping parameters.
    pub fn reset(&mut self) {
        let now = self.clock.now();
        self.pending.clear();
        self.noise_db = defaults::NOISE_FLOOR_DB;
        self.speaking = false;
        self.last_voice = now;
        self.t0 = now;
    }
}

impl Vad<SystemClock> {
    /// Creates a detector with the given parameters using the system clock.
    pub fn new(params: VadParams, frame_size: usize) -> Self {
        Self::with_clock(params, frame_size, SystemClock)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Samples are mono f32 in [-1.0, 1.0]; the result is in the same range,
/// where 0.0 is silence and ~0.707 is a full-scale sine wave.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}
