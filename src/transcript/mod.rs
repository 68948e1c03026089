//! Transcript types and speaker assignment.

pub mod assembler;
pub mod turn;

use serde::{Deserialize, Serialize};

/// Two-label speaker tag.
///
/// A heuristic proxy for diarization driven by turn-taking silence gaps,
/// not true speaker identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    pub fn flipped(self) -> Self {
        match self {
            Speaker::A => Speaker::B,
            Speaker::B => Speaker::A,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::A => f.write_str("A"),
            Speaker::B => f.write_str("B"),
        }
    }
}

/// One finalized piece of the live transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: String,
    pub text: String,
    pub speaker: Speaker,
    /// Milliseconds from session start (or provider-reported chunk offset).
    pub start_ms: u64,
    pub end_ms: Option<u64>,
}
