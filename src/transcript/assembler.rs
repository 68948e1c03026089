//! Dispatch-order release of out-of-order completions.
//!
//! Transcription jobs complete in network order, but the live transcript
//! must append in dispatch order. The assembler buffers completions keyed by
//! sequence number and releases the contiguous prefix; failed jobs release
//! their slot with `None` so ordering never stalls.

use std::collections::BTreeMap;

/// Buffers out-of-order items and yields them in sequence order.
pub struct SegmentAssembler<T> {
    pending: BTreeMap<u64, Option<T>>,
    next: u64,
}

impl<T> SegmentAssembler<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Records the outcome for `seq` (`None` for a failed job) and returns
    /// every item that became releasable, in order.
    pub fn insert(&mut self, seq: u64, item: Option<T>) -> Vec<T> {
        self.pending.insert(seq, item);

        let mut released = Vec::new();
        while let Some(entry) = self.pending.remove(&self.next) {
            if let Some(item) = entry {
                released.push(item);
            }
            self.next += 1;
        }
        released
    }

    /// Completions held back waiting for an earlier sequence number.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<T> Default for SegmentAssembler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_releases_immediately() {
        let mut asm = SegmentAssembler::new();
        assert_eq!(asm.insert(0, Some("a")), vec!["a"]);
        assert_eq!(asm.insert(1, Some("b")), vec!["b"]);
    }

    #[test]
    fn test_out_of_order_held_until_gap_fills() {
        let mut asm = SegmentAssembler::new();
        assert!(asm.insert(1, Some("b")).is_empty());
        assert!(asm.insert(2, Some("c")).is_empty());
        assert_eq!(asm.pending(), 2);

        assert_eq!(asm.insert(0, Some("a")), vec!["a", "b", "c"]);
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_failed_job_releases_slot() {
        let mut asm = SegmentAssembler::new();
        assert!(asm.insert(1, Some("b")).is_empty());
        // Job 0 failed; its slot must not stall job 1
        assert_eq!(asm.insert(0, None), vec!["b"]);
    }

    #[test]
    fn test_interleaved_failures_and_completions() {
        let mut asm = SegmentAssembler::new();
        assert!(asm.insert(2, Some("c")).is_empty());
        assert_eq!(asm.insert(0, Some("a")), vec!["a"]);
        assert_eq!(asm.insert(1, None), vec!["c"]);
    }
}
