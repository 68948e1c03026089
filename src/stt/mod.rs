//! Speech-to-text clients and orchestration.

pub mod orchestrator;
pub mod proxy;
pub mod types;

pub use orchestrator::{SttOrchestrator, SttOrchestratorConfig};
pub use proxy::ProxySttClient;
pub use types::{
    MockSttClient, Provider, SttClient, SttResponse, SttSegment, TranscriptionOptions,
};
