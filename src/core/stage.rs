//! Stage records and status model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The three pipeline stages, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    GenerateCharacter,
    SegmentLayers,
    AutomateModel,
}

impl StageName {
    /// All stages in execution order
    pub const ALL: [StageName; 3] = [
        StageName::GenerateCharacter,
        StageName::SegmentLayers,
        StageName::AutomateModel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::GenerateCharacter => "generate-character",
            StageName::SegmentLayers => "segment-layers",
            StageName::AutomateModel => "automate-model",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Stage has not started
    Pending,
    /// Stage is currently executing
    Running,
    /// Stage finished and produced its outputs
    Succeeded,
    /// Stage finished with an error
    Failed,
    /// Stage was not needed for this entry point
    Skipped,
}

impl StageStatus {
    /// Terminal statuses never transition to anything else
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageStatus::Succeeded | StageStatus::Failed | StageStatus::Skipped
        )
    }

    /// Whether a record with this status may be replaced by `next`.
    ///
    /// `Succeeded` and `Skipped` are final outcomes; `Failed` may only be
    /// restated as `Failed` (a re-invoked run writes a fresh history).
    pub fn can_transition_to(self, next: StageStatus) -> bool {
        match self {
            StageStatus::Pending => true,
            StageStatus::Running => true,
            StageStatus::Succeeded => next == StageStatus::Succeeded,
            StageStatus::Skipped => next == StageStatus::Skipped,
            StageStatus::Failed => next == StageStatus::Failed,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One entry in a run's stage history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Which stage this record describes
    pub stage: StageName,

    /// Stage status at the time the record was written
    pub status: StageStatus,

    /// When the stage started executing
    pub started_at: Option<DateTime<Utc>>,

    /// When the stage reached a terminal status
    pub ended_at: Option<DateTime<Utc>>,

    /// Artifact paths the stage produced
    #[serde(default)]
    pub outputs: Vec<PathBuf>,

    /// Error description when status is `Failed`
    #[serde(default)]
    pub error: Option<String>,

    /// Error kind tag when status is `Failed` (e.g. "import-failure")
    #[serde(default)]
    pub error_kind: Option<String>,
}

impl StageRecord {
    /// Fresh pending record for a stage
    pub fn pending(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            started_at: None,
            ended_at: None,
            outputs: Vec::new(),
            error: None,
            error_kind: None,
        }
    }

    /// Record for a stage that this entry point does not need
    pub fn skipped(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            started_at: None,
            ended_at: Some(Utc::now()),
            outputs: Vec::new(),
            error: None,
            error_kind: None,
        }
    }

    /// Record for a stage that just started
    pub fn running(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Running,
            started_at: Some(Utc::now()),
            ended_at: None,
            outputs: Vec::new(),
            error: None,
            error_kind: None,
        }
    }

    /// Mark this record as succeeded with the produced outputs
    pub fn succeed(mut self, outputs: Vec<PathBuf>) -> Self {
        self.status = StageStatus::Succeeded;
        self.ended_at = Some(Utc::now());
        self.outputs = outputs;
        self
    }

    /// Mark this record as failed with a message and kind tag
    pub fn fail(mut self, kind: &str, message: String) -> Self {
        self.status = StageStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.error = Some(message);
        self.error_kind = Some(kind.to_string());
        self
    }
}
