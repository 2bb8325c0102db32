//! Stage executor - runs one pipeline stage uniformly
//!
//! Every stage goes through the same wrapper: preconditions are checked
//! before any external code runs, elapsed time is captured, and every
//! failure is folded into a `StageResult` value. Nothing a stage does is
//! allowed to propagate as an uncaught fault into the orchestrator.

use crate::artifact::ArtifactStore;
use crate::core::error::{StageError, StorageError};
use crate::core::run::Run;
use crate::core::stage::{StageName, StageRecord};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Outcome of one stage execution
#[derive(Debug)]
pub struct StageResult {
    pub stage: StageName,
    pub outcome: Result<Vec<PathBuf>, StageError>,
    pub elapsed: Duration,
}

impl StageResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs stages and persists their records
pub struct StageExecutor {
    store: ArtifactStore,
}

impl StageExecutor {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Execute one stage.
    ///
    /// `inputs` are paths that must exist before the work runs; a missing
    /// one fails the stage with a precondition error instead of letting it
    /// blow up deep inside external code. The final stage record is
    /// persisted exactly once per invocation, win or lose. The returned
    /// `Err` is reserved for persistence itself failing.
    pub async fn run<Fut>(
        &self,
        run: &mut Run,
        stage: StageName,
        inputs: &[&Path],
        work: Fut,
    ) -> Result<StageResult, StorageError>
    where
        Fut: Future<Output = Result<Vec<PathBuf>, StageError>>,
    {
        info!("executing stage {}", stage);
        let record = StageRecord::running(stage);
        run.record(record.clone())?;

        let started = std::time::Instant::now();

        let outcome = match check_inputs(inputs) {
            Err(e) => Err(e),
            Ok(()) => work.await,
        };

        let elapsed = started.elapsed();

        match &outcome {
            Ok(outputs) => {
                info!(
                    "stage {} succeeded in {:.1}s ({} artifacts)",
                    stage,
                    elapsed.as_secs_f64(),
                    outputs.len()
                );
                self.store
                    .persist_stage_record(run, record.succeed(outputs.clone()))?;
            }
            Err(e) => {
                error!(
                    "stage {} failed after {:.1}s: {}",
                    stage,
                    elapsed.as_secs_f64(),
                    e
                );
                self.store
                    .persist_stage_record(run, record.fail(e.kind(), e.to_string()))?;
            }
        }

        Ok(StageResult {
            stage,
            outcome,
            elapsed,
        })
    }
}

fn check_inputs(inputs: &[&Path]) -> Result<(), StageError> {
    for input in inputs {
        if !input.exists() {
            return Err(StageError::Precondition(format!(
                "required input does not exist: {}",
                input.display()
            )));
        }
    }
    Ok(())
}
