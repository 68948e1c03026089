//! Turn-taking speaker assignment.
//!
//! Two independent mechanisms: a live alternator driven by VAD events, and
//! post-hoc clustering of finalized segments by inter-segment silence gaps.
//! Both produce only the two labels A and B.

use crate::defaults;
use crate::transcript::{Speaker, TranscriptSegment};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Live two-label alternator.
///
/// Flips the active speaker when a speech start arrives more than the
/// configured silence gap after the last recorded speech end. Lock-free so
/// the VAD thread and queue tasks can share one tracker.
pub struct TurnTracker {
    speaker_is_b: AtomicBool,
    last_speech_end_ms: AtomicU64,
    turn_silence_ms: AtomicU64,
}

impl TurnTracker {
    pub fn new(turn_silence_ms: u64) -> Self {
        Self {
            speaker_is_b: AtomicBool::new(false),
            last_speech_end_ms: AtomicU64::new(0),
            turn_silence_ms: AtomicU64::new(turn_silence_ms),
        }
    }

    /// Currently active speaker label.
    pub fn current(&self) -> Speaker {
        if self.speaker_is_b.load(Ordering::SeqCst) {
            Speaker::B
        } else {
            Speaker::A
        }
    }

    /// Handles a VAD speech-start event.
    pub fn on_speech_start(&self, at_ms: u64) {
        let last_end = self.last_speech_end_ms.load(Ordering::SeqCst);
        let gap = at_ms.saturating_sub(last_end);
        if gap > self.turn_silence_ms.load(Ordering::SeqCst) {
            self.speaker_is_b.fetch_xor(true, Ordering::SeqCst);
        }
    }

    /// Handles a VAD speech-end event.
    pub fn on_speech_end(&self, at_ms: u64) {
        self.last_speech_end_ms.store(at_ms, Ordering::SeqCst);
    }

    /// Updates the turn silence threshold live.
    pub fn set_turn_silence_ms(&self, ms: u64) {
        self.turn_silence_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for TurnTracker {
    fn default() -> Self {
        Self::new(defaults::TURN_SILENCE_MS)
    }
}

/// Estimated spoken duration for a segment with no end time:
/// 80ms per character, clamped to [500ms, 4000ms].
pub fn estimated_duration_ms(text: &str) -> u64 {
    (80 * text.chars().count() as u64).clamp(500, 4000)
}

/// Re-labels finalized segments by walking them in order and flipping the
/// speaker whenever the gap between a segment's start and the previous
/// segment's end exceeds `gap_ms`. Missing end times are filled with the
/// length heuristic for gap computation only.
pub fn auto_cluster_ab(segments: &mut [TranscriptSegment], gap_ms: u64) {
    let mut current = Speaker::A;
    let mut prev_end: Option<u64> = None;

    for seg in segments.iter_mut() {
        if let Some(end) = prev_end {
            if seg.start_ms.saturating_sub(end) > gap_ms {
                current = current.flipped();
            }
        }
        seg.speaker = current;
        prev_end = Some(
            seg.end_ms
                .unwrap_or_else(|| seg.start_ms + estimated_duration_ms(&seg.text)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: &str, start_ms: u64, end_ms: Option<u64>) -> TranscriptSegment {
        TranscriptSegment {
            id: id.to_string(),
            text: "テスト発言です。".to_string(),
            speaker: Speaker::A,
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn test_tracker_starts_on_a() {
        let tracker = TurnTracker::new(600);
        assert_eq!(tracker.current(), Speaker::A);
    }

    #[test]
    fn test_tracker_flips_after_long_gap() {
        let tracker = TurnTracker::new(600);
        tracker.on_speech_start(100);
        tracker.on_speech_end(2000);

        // next start only 100ms after the last end: same speaker
        let before = tracker.current();
        tracker.on_speech_start(2100);
        assert_eq!(tracker.current(), before);

        tracker.on_speech_end(3000);
        // 1000ms gap: other speaker
        tracker.on_speech_start(4000);
        assert_eq!(tracker.current(), before.flipped());
    }

    #[test]
    fn test_tracker_threshold_is_exclusive() {
        let tracker = TurnTracker::new(600);
        tracker.on_speech_end(1000);
        let before = tracker.current();
        // exactly the threshold: no flip
        tracker.on_speech_start(1600);
        assert_eq!(tracker.current(), before);
    }

    #[test]
    fn test_tracker_live_threshold_update() {
        let tracker = TurnTracker::new(600);
        tracker.on_speech_end(1000);
        tracker.set_turn_silence_ms(5000);
        let before = tracker.current();
        tracker.on_speech_start(3000);
        assert_eq!(tracker.current(), before);
    }

    #[test]
    fn test_estimated_duration_clamps() {
        assert_eq!(estimated_duration_ms(""), 500);
        assert_eq!(estimated_duration_ms("1234"), 500);
        assert_eq!(estimated_duration_ms("1234567890"), 800);
        assert_eq!(estimated_duration_ms(&"あ".repeat(100)), 4000);
    }

    #[test]
    fn test_cluster_flips_on_large_gap() {
        // Gaps: 100ms (< 600) then 1000ms (>= 600)
        let mut segs = vec![
            seg("1", 0, Some(2000)),
            seg("2", 2100, Some(4000)),
            seg("3", 5000, Some(6000)),
        ];
        auto_cluster_ab(&mut segs, 600);
        let speakers: Vec<Speaker> = segs.iter().map(|s| s.speaker).collect();
        assert_eq!(speakers, vec![Speaker::A, Speaker::A, Speaker::B]);
    }

    #[test]
    fn test_cluster_fills_missing_end_times() {
        // 8 chars * 80ms = 640ms estimated duration; next start at 3000
        // leaves a 2360ms gap from the estimated end at 640.
        let mut segs = vec![seg("1", 0, None), seg("2", 3000, Some(4000))];
        auto_cluster_ab(&mut segs, 600);
        assert_eq!(segs[0].speaker, Speaker::A);
        assert_eq!(segs[1].speaker, Speaker::B);
    }

    #[test]
    fn test_cluster_alternates_back_and_forth() {
        let mut segs = vec![
            seg("1", 0, Some(1000)),
            seg("2", 3000, Some(4000)),
            seg("3", 6000, Some(7000)),
            seg("4", 7100, Some(8000)),
        ];
        auto_cluster_ab(&mut segs, 600);
        let speakers: Vec<Speaker> = segs.iter().map(|s| s.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::A, Speaker::B, Speaker::A, Speaker::A]
        );
    }

    #[test]
    fn test_cluster_empty_input() {
        let mut segs: Vec<TranscriptSegment> = Vec::new();
        auto_cluster_ab(&mut segs, 600);
        assert!(segs.is_empty());
    }
}
