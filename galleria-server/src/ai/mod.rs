//! AI image generation: settings resolution, the upstream client, result
//! materialization and the background orchestrator tying them together.

pub mod client;
pub mod error;
pub mod materialize;
pub mod orchestrator;
pub mod settings;

pub use client::GenerationClient;
pub use error::{AiError, MaterializeError, SubmitError};
pub use materialize::{MaterializedAsset, Materializer};
pub use orchestrator::{GenerationOrchestrator, GenerationRequest, OrchestratorConfig};
pub use settings::{AiSetting, EnvLayer, SettingsResolver};
