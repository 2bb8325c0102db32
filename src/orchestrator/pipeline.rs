//! Pipeline orchestrator - sequences stages and owns the run
//!
//! The orchestrator decides the minimal stage set for the chosen entry
//! point, runs each stage through the executor in dependency order, and
//! persists the run after every transition. Stages never run in parallel:
//! each depends on its predecessor's artifact, and the automation stage
//! assumes exclusive control of the one external editor instance.

use crate::artifact::ArtifactStore;
use crate::automation::{drive_with_recovery, ModelingApp, SessionStep, StepAction};
use crate::collaborators::{ImageGenerator, LayerSegmenter};
use crate::core::config::AppConfig;
use crate::core::error::{OrchestratorError, StageError};
use crate::core::run::{EntryPoint, Run, RunId, RunStatus};
use crate::core::stage::{StageName, StageRecord};
use crate::orchestrator::executor::StageExecutor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The external editor is a non-shareable resource: concurrent runs in one
/// process serialize their automate stages on this lock.
static AUTOMATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn automation_lock() -> &'static Mutex<()> {
    AUTOMATION_LOCK.get_or_init(|| Mutex::new(()))
}

/// Events emitted during a run, for console or polling front-ends
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        run_id: RunId,
        entry: EntryPoint,
    },
    StageSkipped {
        stage: StageName,
    },
    StageStarted {
        stage: StageName,
    },
    StageCompleted {
        stage: StageName,
        elapsed_secs: f64,
    },
    StageFailed {
        stage: StageName,
        error: String,
    },
    RunCompleted {
        run_id: RunId,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Cooperative cancellation flag, checked at stage boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final report of one run
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    pub status: RunStatus,
    pub root: PathBuf,
    pub records: Vec<StageRecord>,
    pub export_path: Option<PathBuf>,
    pub session_log: Vec<SessionStep>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// The record of the stage that halted the run, if any
    pub fn failing_stage(&self) -> Option<&StageRecord> {
        self.records
            .iter()
            .find(|r| r.status == crate::core::stage::StageStatus::Failed)
    }

    /// Layers whose import completed before the automate stage ended
    pub fn imported_layers(&self) -> Vec<&str> {
        self.session_log
            .iter()
            .filter(|s| s.ok)
            .filter_map(|s| match &s.action {
                StepAction::ImportLayer(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Sequences the pipeline stages for one run at a time
pub struct Orchestrator<G, S, F> {
    config: AppConfig,
    store: ArtifactStore,
    executor: StageExecutor,
    generator: G,
    segmenter: S,
    driver_factory: F,
    handlers: std::sync::Mutex<Vec<EventHandler>>,
    status: Arc<RwLock<Vec<StageRecord>>>,
    cancel: CancelToken,
}

impl<G, S, D, F> Orchestrator<G, S, F>
where
    G: ImageGenerator,
    S: LayerSegmenter,
    D: ModelingApp,
    F: Fn() -> D,
{
    pub fn new(config: AppConfig, generator: G, segmenter: S, driver_factory: F) -> Self {
        let store = ArtifactStore::new(config.io.output_dir.clone());
        let executor = StageExecutor::new(store.clone());
        Self {
            config,
            store,
            executor,
            generator,
            segmenter,
            driver_factory,
            handlers: std::sync::Mutex::new(Vec::new()),
            status: Arc::new(RwLock::new(Vec::new())),
            cancel: CancelToken::new(),
        }
    }

    /// Register an event handler
    pub fn add_event_handler<H>(&self, handler: H)
    where
        H: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.push(Arc::new(handler));
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Ok(handlers) = self.handlers.lock() {
            for handler in handlers.iter() {
                handler(event.clone());
            }
        }
    }

    /// Current stage records, including while a stage is running
    pub fn status(&self) -> Vec<StageRecord> {
        self.status.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token used to request cancellation between stages
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn refresh_status(&self, records: Vec<StageRecord>) {
        if let Ok(mut status) = self.status.write() {
            *status = records;
        }
    }

    /// Execute a run from the given entry point.
    ///
    /// Stage failures are reported inside the returned `RunResult`; an `Err`
    /// means the run could not be set up or its state could not be persisted.
    pub async fn execute(&self, entry: EntryPoint) -> Result<RunResult, OrchestratorError> {
        // Entry inputs are validated before any directory is allocated, so
        // an unusable resume path never leaves a half-born run behind.
        match &entry {
            EntryPoint::FullGeneration => {}
            EntryPoint::SkipGeneration(image) => {
                if !image.is_file() {
                    return Err(OrchestratorError::InvalidEntryPoint(format!(
                        "character image does not exist: {}",
                        image.display()
                    )));
                }
            }
            EntryPoint::SkipSegmentation(layer_dir) => {
                self.store.resolve_layer_set(layer_dir)?;
            }
        }

        let mut run = self.store.create_run(entry.clone(), &self.config)?;
        run.start();
        self.store.save_run(&run)?;
        self.refresh_status(run.stage_records());
        self.emit(PipelineEvent::RunStarted {
            run_id: run.id.clone(),
            entry: entry.clone(),
        });

        for stage in entry.skipped_stages() {
            self.store
                .persist_stage_record(&mut run, StageRecord::skipped(*stage))?;
            self.emit(PipelineEvent::StageSkipped { stage: *stage });
        }
        self.refresh_status(run.stage_records());

        let mut session_log = Vec::new();
        let mut export_path = None;

        // Inputs threaded between stages
        let mut character_image = match &entry {
            EntryPoint::SkipGeneration(image) => Some(image.clone()),
            _ => None,
        };
        let mut layer_dir = match &entry {
            EntryPoint::SkipSegmentation(dir) => Some(dir.clone()),
            _ => None,
        };

        for stage in entry.required_stages() {
            if self.cancel.is_cancelled() {
                warn!("run {} cancelled before stage {}", run.id, stage);
                return self.finish(run, RunStatus::Cancelled, export_path, session_log);
            }

            self.refresh_status(stage_snapshot(&run, *stage));
            self.emit(PipelineEvent::StageStarted { stage: *stage });

            let result = match stage {
                StageName::GenerateCharacter => {
                    let out = ArtifactStore::character_path(&run.root);
                    let work = self.generator.generate(&out);
                    let result = self
                        .executor
                        .run(&mut run, *stage, &[], async { work.await.map(|p| vec![p]) })
                        .await?;
                    if let Ok(outputs) = &result.outcome {
                        character_image = outputs.first().cloned();
                    }
                    result
                }
                StageName::SegmentLayers => {
                    let image = character_image.clone().unwrap_or_default();
                    let out_dir = ArtifactStore::layers_dir(&run.root);
                    let work = self.segmenter.segment(&image, &out_dir);
                    let result = self
                        .executor
                        .run(&mut run, *stage, &[&image], async {
                            work.await.map(|set| vec![set.dir().to_path_buf()])
                        })
                        .await?;
                    if let Ok(outputs) = &result.outcome {
                        layer_dir = outputs.first().cloned();
                    }
                    result
                }
                StageName::AutomateModel => {
                    let dir = layer_dir.clone().unwrap_or_default();
                    let target = ArtifactStore::export_path(&run.root);
                    let store = &self.store;
                    let factory = &self.driver_factory;
                    let automation_cfg = &self.config.automation;
                    let log_slot = &mut session_log;

                    let _exclusive = automation_lock().lock().await;
                    let result = self
                        .executor
                        .run(&mut run, *stage, &[&dir], async {
                            let set = store
                                .resolve_layer_set(&dir)
                                .map_err(StageError::Validation)?;
                            let report =
                                drive_with_recovery(factory, automation_cfg, &set, &target).await;
                            *log_slot = report.log;
                            report
                                .result
                                .map(|p| vec![p])
                                .map_err(StageError::Automation)
                        })
                        .await?;
                    if let Ok(outputs) = &result.outcome {
                        export_path = outputs.first().cloned();
                    }
                    result
                }
            };

            self.refresh_status(run.stage_records());

            match &result.outcome {
                Ok(_) => {
                    self.emit(PipelineEvent::StageCompleted {
                        stage: *stage,
                        elapsed_secs: result.elapsed.as_secs_f64(),
                    });
                }
                Err(e) => {
                    self.emit(PipelineEvent::StageFailed {
                        stage: *stage,
                        error: e.to_string(),
                    });
                    // A failed stage halts the run; later stages stay pending
                    return self.finish(run, RunStatus::Failed, export_path, session_log);
                }
            }
        }

        info!("run {} completed successfully", run.id);
        self.finish(run, RunStatus::Succeeded, export_path, session_log)
    }

    fn finish(
        &self,
        mut run: Run,
        status: RunStatus,
        export_path: Option<PathBuf>,
        session_log: Vec<SessionStep>,
    ) -> Result<RunResult, OrchestratorError> {
        run.finish(status);
        self.store.save_run(&run)?;
        self.refresh_status(run.stage_records());
        self.emit(PipelineEvent::RunCompleted {
            run_id: run.id.clone(),
            status,
        });

        Ok(RunResult {
            run_id: run.id.clone(),
            status,
            root: run.root.clone(),
            records: run.stage_records(),
            export_path,
            session_log,
        })
    }
}

/// Per-stage view with `stage` shown as running, for the status query
/// while the executor owns the run.
fn stage_snapshot(run: &Run, stage: StageName) -> Vec<StageRecord> {
    run.stage_records()
        .into_iter()
        .map(|r| {
            if r.stage == stage {
                StageRecord::running(stage)
            } else {
                r
            }
        })
        .collect()
}
