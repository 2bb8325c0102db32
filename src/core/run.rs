//! Run lifecycle and persisted run state

use crate::core::config::AppConfig;
use crate::core::error::{StorageError, ValidationError};
use crate::core::stage::{StageName, StageRecord, StageStatus};
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Timestamp-derived run identifier, e.g. `20250101_120000` (collision
/// suffix: `20250101_120000_2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

fn run_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{8}_\d{6}(_\d+)?$").unwrap())
}

impl RunId {
    /// Derive a run id from a local timestamp
    pub fn from_timestamp(now: DateTime<Local>) -> Self {
        Self(now.format("%Y%m%d_%H%M%S").to_string())
    }

    /// Parse and validate a run id string
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if run_id_pattern().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::InvalidRunId(s.to_string()))
        }
    }

    /// Variant of this id with a collision suffix appended
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}_{}", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where pipeline execution enters: from scratch, from an existing image,
/// or from an existing layer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "kebab-case")]
pub enum EntryPoint {
    /// generate → segment → automate
    FullGeneration,
    /// segment → automate, using the supplied character image
    SkipGeneration(PathBuf),
    /// automate only, using a pre-validated layer directory
    SkipSegmentation(PathBuf),
}

impl EntryPoint {
    /// Stages this entry point executes, in order
    pub fn required_stages(&self) -> &'static [StageName] {
        match self {
            EntryPoint::FullGeneration => &StageName::ALL,
            EntryPoint::SkipGeneration(_) => {
                &[StageName::SegmentLayers, StageName::AutomateModel]
            }
            EntryPoint::SkipSegmentation(_) => &[StageName::AutomateModel],
        }
    }

    /// Stages this entry point marks as skipped up front
    pub fn skipped_stages(&self) -> &'static [StageName] {
        match self {
            EntryPoint::FullGeneration => &[],
            EntryPoint::SkipGeneration(_) => &[StageName::GenerateCharacter],
            EntryPoint::SkipSegmentation(_) => {
                &[StageName::GenerateCharacter, StageName::SegmentLayers]
            }
        }
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// One end-to-end pipeline execution. Owned exclusively by the orchestrator;
/// everything here is serialized into the run's `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique timestamp-derived identifier
    pub id: RunId,

    /// How this run was entered
    pub entry: EntryPoint,

    /// Current run status
    pub status: RunStatus,

    /// Root artifact directory for this run
    pub root: PathBuf,

    /// When the run started executing
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Configuration snapshot taken when the run was created
    pub config: AppConfig,

    /// Append-only stage history, oldest first
    history: Vec<StageRecord>,
}

impl Run {
    /// Create a fresh run rooted at `root`
    pub fn new(id: RunId, root: PathBuf, entry: EntryPoint, config: AppConfig) -> Self {
        Self {
            id,
            entry,
            status: RunStatus::Pending,
            root,
            started_at: None,
            completed_at: None,
            config,
            history: Vec::new(),
        }
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the run as finished with the given terminal status
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Append a stage record to the history.
    ///
    /// A terminal record (`succeeded`/`skipped`) is never overwritten with a
    /// different outcome; attempting to do so is a history violation.
    pub fn record(&mut self, record: StageRecord) -> Result<(), StorageError> {
        if let Some(latest) = self.latest(record.stage) {
            if !latest.status.can_transition_to(record.status) {
                return Err(StorageError::History(format!(
                    "stage {} is already {} and cannot become {}",
                    record.stage, latest.status, record.status
                )));
            }
        }
        self.history.push(record);
        Ok(())
    }

    /// Latest record for one stage, if any was written
    pub fn latest(&self, stage: StageName) -> Option<&StageRecord> {
        self.history.iter().rev().find(|r| r.stage == stage)
    }

    /// Full append-only history, oldest first
    pub fn history(&self) -> &[StageRecord] {
        &self.history
    }

    /// Current per-stage view: the latest record for every stage, with
    /// untouched stages reported as `pending`.
    pub fn stage_records(&self) -> Vec<StageRecord> {
        StageName::ALL
            .iter()
            .map(|stage| {
                self.latest(*stage)
                    .cloned()
                    .unwrap_or_else(|| StageRecord::pending(*stage))
            })
            .collect()
    }

    /// Whether a stage reached `succeeded` or `skipped`
    pub fn stage_satisfied(&self, stage: StageName) -> bool {
        matches!(
            self.latest(stage).map(|r| r.status),
            Some(StageStatus::Succeeded) | Some(StageStatus::Skipped)
        )
    }

    /// Path of the metadata file inside a run directory
    pub fn metadata_path(root: &Path) -> PathBuf {
        root.join("run.json")
    }
}
