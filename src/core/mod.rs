//! Core domain models: configuration, runs, stages, layers, errors

pub mod config;
pub mod error;
pub mod layer;
pub mod run;
pub mod stage;

pub use config::AppConfig;
pub use error::{AutomationError, OrchestratorError, StageError, StorageError, ValidationError};
pub use layer::{Layer, LayerManifest, LayerSet};
pub use run::{EntryPoint, Run, RunId, RunStatus};
pub use stage::{StageName, StageRecord, StageStatus};
