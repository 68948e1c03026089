//! Bounded-concurrency dispatch queues.

pub mod dispatch;
pub mod report;
pub mod transcription;
pub mod translation;

pub use dispatch::{DispatchConfig, DispatchQueue, JobHandler, QueueEvent};
pub use report::{CollectingReporter, ErrorReporter, TracingReporter};
pub use transcription::{TranscriptEvent, TranscriptionQueue, TranscriptionQueueConfig};
pub use translation::{TranslationQueue, TranslationQueueConfig};
