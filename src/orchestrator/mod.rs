//! Run orchestration: stage executor and pipeline sequencing

pub mod executor;
pub mod pipeline;

pub use executor::{StageExecutor, StageResult};
pub use pipeline::{CancelToken, EventHandler, Orchestrator, PipelineEvent, RunResult};
