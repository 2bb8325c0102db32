//! Error taxonomy for the pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the artifact store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create run directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write run metadata {path}: {source}")]
    WriteMetadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read run metadata {path}: {source}")]
    ReadMetadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("run metadata {path} is not valid JSON: {source}")]
    DecodeMetadata {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no run found with id '{0}'")]
    RunNotFound(String),

    #[error("stage history violation: {0}")]
    History(String),
}

/// Errors raised when validating a layer set, config, or run state
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("layer manifest not found at {0}")]
    MissingManifest(PathBuf),

    #[error("layer manifest {path} is malformed: {reason}")]
    MalformedManifest { path: PathBuf, reason: String },

    #[error("layer '{layer}' references missing file {file}")]
    MissingLayerFile { layer: String, file: PathBuf },

    #[error("layer '{0}' has an empty semantic tag")]
    EmptyTag(String),

    #[error("layer set at {0} contains no layers")]
    EmptyLayerSet(PathBuf),

    #[error("invalid run id '{0}'")]
    InvalidRunId(String),
}

/// Errors specific to driving the external modeling application
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Cubism did not become ready within {0}s")]
    LaunchTimeout(u64),

    #[error("failed to import layer '{layer}' after {attempts} attempts: {message}")]
    ImportFailure {
        layer: String,
        attempts: usize,
        message: String,
    },

    #[error("auto-rig action failed: {0}")]
    RigFailure(String),

    #[error("export produced no usable file at {path}")]
    ExportVerificationFailed { path: PathBuf },

    #[error("Cubism session became unresponsive: {0}")]
    Unresponsive(String),

    #[error("automation action '{action}' timed out after {timeout_secs}s")]
    ActionTimeout { action: String, timeout_secs: u64 },

    #[error("automation io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a stage can fail with; converted to a `StageResult` at the
/// executor boundary and never allowed to propagate past it.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("missing required stage input: {0}")]
    Precondition(String),

    #[error("character generation failed: {0}")]
    Generation(String),

    #[error("layer segmentation failed: {0}")]
    Segmentation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Automation(#[from] AutomationError),
}

impl StageError {
    /// Short machine-friendly name for the error kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Precondition(_) => "precondition",
            StageError::Generation(_) => "generation",
            StageError::Segmentation(_) => "segmentation",
            StageError::Storage(_) => "storage",
            StageError::Validation(_) => "validation",
            StageError::Automation(AutomationError::LaunchTimeout(_)) => "launch-timeout",
            StageError::Automation(AutomationError::ImportFailure { .. }) => "import-failure",
            StageError::Automation(AutomationError::RigFailure(_)) => "rig-failure",
            StageError::Automation(AutomationError::ExportVerificationFailed { .. }) => {
                "export-verification"
            }
            StageError::Automation(_) => "automation",
        }
    }
}

/// Errors observable at the orchestrator boundary, besides `StageResult`s
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid entry point: {0}")]
    InvalidEntryPoint(String),

    #[error("corrupted run state: {0}")]
    CorruptedState(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
