//! Input level meter.
//!
//! Tracks short-window RMS of the live stream for UI feedback, independent
//! of voice activity detection. Reads are lock-free so the host can poll the
//! level from any thread while the capture loop keeps pushing samples.

use crate::audio::vad::rms;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Short-window RMS level meter.
pub struct LevelMeter {
    inner: Mutex<Inner>,
    /// Latest RMS level as f32 bits, for lock-free reads.
    level_bits: AtomicU32,
}

struct Inner {
    window: VecDeque<f32>,
    window_samples: usize,
    sum_squares: f64,
}

impl LevelMeter {
    /// Creates a meter averaging over the most recent `window_ms` of audio.
    pub fn new(window_ms: u64, sample_rate: u32) -> Self {
        let window_samples = ((window_ms * sample_rate as u64) / 1000).max(1) as usize;
        Self {
            inner: Mutex::new(Inner {
                window: VecDeque::with_capacity(window_samples),
                window_samples,
                sum_squares: 0.0,
            }),
            level_bits: AtomicU32::new(0),
        }
    }

    /// Pushes a batch of samples into the window and refreshes the level.
    pub fn push(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        for &s in samples {
            inner.window.push_back(s);
            inner.sum_squares += s as f64 * s as f64;
        }
        while inner.window.len() > inner.window_samples {
            if let Some(old) = inner.window.pop_front() {
                inner.sum_squares -= old as f64 * old as f64;
            }
        }
        let level = if inner.window.is_empty() {
            0.0
        } else {
            (inner.sum_squares.max(0.0) / inner.window.len() as f64).sqrt() as f32
        };
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Returns the current RMS level, 0.0 to ~1.0.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Returns the current level in dBFS.
    pub fn db(&self) -> f32 {
        20.0 * (self.level() + 1e-9).log10()
    }

    /// Clears the window.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.window.clear();
            inner.sum_squares = 0.0;
        }
        self.level_bits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_starts_at_zero() {
        let meter = LevelMeter::new(200, 16000);
        assert_eq!(meter.level(), 0.0);
    }

    #[test]
    fn test_level_tracks_constant_signal() {
        let meter = LevelMeter::new(100, 16000);
        meter.push(&vec![0.5; 1600]);
        assert!((meter.level() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_window_forgets_old_samples() {
        // 100ms window at 16kHz = 1600 samples
        let meter = LevelMeter::new(100, 16000);
        meter.push(&vec![0.9; 1600]);
        // A full window of quiet samples displaces the loud ones
        meter.push(&vec![0.01; 1600]);
        assert!(meter.level() < 0.05, "stale loud samples still dominate: {}", meter.level());
    }

    #[test]
    fn test_db_of_silence_is_very_low() {
        let meter = LevelMeter::new(100, 16000);
        meter.push(&vec![0.0; 1600]);
        assert!(meter.db() < -150.0);
    }

    #[test]
    fn test_reset_clears_level() {
        let meter = LevelMeter::new(100, 16000);
        meter.push(&vec![0.5; 1600]);
        meter.reset();
        assert_eq!(meter.level(), 0.0);
    }

    #[test]
    fn test_matches_rms_helper() {
        let meter = LevelMeter::new(100, 16000);
        let samples: Vec<f32> = (0..1600).map(|i| if i % 2 == 0 { 0.25 } else { -0.25 }).collect();
        meter.push(&samples);
        assert!((meter.level() - rms(&samples)).abs() < 1e-5);
    }
}
