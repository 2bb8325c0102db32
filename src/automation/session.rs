//! Automation session state machine
//!
//! One session is one live connection to the editor. It walks
//! `NotStarted → Launching → Ready → Importing → Rigging → Exporting`,
//! can drop into `Error` from any non-terminal state, and always ends
//! `Closed` — the editor process must never outlive the session, no matter
//! how it failed.

use crate::automation::ModelingApp;
use crate::core::config::AutomationConfig;
use crate::core::error::AutomationError;
use crate::core::layer::LayerSet;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Where the session currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Launching,
    Ready,
    Importing,
    Rigging,
    Exporting,
    Error,
    Closed,
}

/// One automation action the session attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Launch,
    ImportLayer(String),
    Rig,
    Export,
    Close,
}

/// Outcome of one attempted action, kept for failure reports
#[derive(Debug, Clone)]
pub struct SessionStep {
    pub action: StepAction,
    pub ok: bool,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl SessionStep {
    fn ok(action: StepAction) -> Self {
        Self {
            action,
            ok: true,
            detail: None,
            at: Utc::now(),
        }
    }

    fn failed(action: StepAction, detail: String) -> Self {
        Self {
            action,
            ok: false,
            detail: Some(detail),
            at: Utc::now(),
        }
    }
}

/// What the automation run produced: an export path on success, the error
/// otherwise, and the combined step log of every session involved.
#[derive(Debug)]
pub struct AutomationReport {
    pub result: Result<PathBuf, AutomationError>,
    pub log: Vec<SessionStep>,
}

impl AutomationReport {
    /// Names of layers whose import completed, in import order
    pub fn imported_layers(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter(|s| s.ok)
            .filter_map(|s| match &s.action {
                StepAction::ImportLayer(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// One live, exclusively-owned connection to the editor
pub struct AutomationSession<D: ModelingApp> {
    driver: D,
    cfg: AutomationConfig,
    state: SessionState,
    log: Vec<SessionStep>,
}

impl<D: ModelingApp> AutomationSession<D> {
    pub fn new(driver: D, cfg: AutomationConfig) -> Self {
        Self {
            driver,
            cfg,
            state: SessionState::NotStarted,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn log(&self) -> &[SessionStep] {
        &self.log
    }

    /// Run the full import → rig → export flow. The session is consumed and
    /// always ends `Closed`, success or not.
    pub async fn drive(
        mut self,
        layers: &LayerSet,
        export_target: &Path,
    ) -> (Result<PathBuf, AutomationError>, Vec<SessionStep>) {
        let result = self.run_inner(layers, export_target).await;
        if result.is_err() {
            self.state = SessionState::Error;
        }
        self.close().await;
        (result, self.log)
    }

    async fn run_inner(
        &mut self,
        layers: &LayerSet,
        export_target: &Path,
    ) -> Result<PathBuf, AutomationError> {
        self.launch().await?;
        self.import_all(layers).await?;
        self.rig().await?;
        self.export(export_target).await
    }

    async fn launch(&mut self) -> Result<(), AutomationError> {
        self.state = SessionState::Launching;
        info!("launching automation session");

        let bound = Duration::from_secs(self.cfg.launch_timeout_secs);
        let result = match timeout(bound, self.driver.launch()).await {
            Ok(result) => result,
            Err(_) => Err(AutomationError::LaunchTimeout(self.cfg.launch_timeout_secs)),
        };

        match result {
            Ok(()) => {
                self.log.push(SessionStep::ok(StepAction::Launch));
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.log
                    .push(SessionStep::failed(StepAction::Launch, e.to_string()));
                Err(e)
            }
        }
    }

    async fn import_all(&mut self, layers: &LayerSet) -> Result<(), AutomationError> {
        self.state = SessionState::Importing;
        let action_bound = Duration::from_secs(self.cfg.action_timeout_secs);
        let max_attempts = self.cfg.import_retries + 1;

        for layer in layers.layers() {
            let file = layers.layer_path(layer);
            let mut last_error = String::new();

            let mut imported = false;
            for attempt in 1..=max_attempts {
                let result = match timeout(
                    action_bound,
                    self.driver.import_layer(layer, &file),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AutomationError::ActionTimeout {
                        action: format!("import {}", layer.name),
                        timeout_secs: self.cfg.action_timeout_secs,
                    }),
                };

                match result {
                    Ok(()) => {
                        debug!("imported layer '{}' (attempt {})", layer.name, attempt);
                        imported = true;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            "import of '{}' failed on attempt {}/{}: {}",
                            layer.name, attempt, max_attempts, e
                        );
                        last_error = e.to_string();

                        if !self.driver.is_responsive() {
                            self.log.push(SessionStep::failed(
                                StepAction::ImportLayer(layer.name.clone()),
                                format!("session unresponsive: {last_error}"),
                            ));
                            return Err(AutomationError::Unresponsive(format!(
                                "while importing '{}': {last_error}",
                                layer.name
                            )));
                        }

                        if attempt < max_attempts {
                            tokio::time::sleep(Duration::from_secs(self.cfg.import_wait_secs))
                                .await;
                        }
                    }
                }
            }

            if imported {
                self.log
                    .push(SessionStep::ok(StepAction::ImportLayer(layer.name.clone())));
            } else {
                self.log.push(SessionStep::failed(
                    StepAction::ImportLayer(layer.name.clone()),
                    last_error.clone(),
                ));
                return Err(AutomationError::ImportFailure {
                    layer: layer.name.clone(),
                    attempts: max_attempts,
                    message: last_error,
                });
            }
        }

        Ok(())
    }

    async fn rig(&mut self) -> Result<(), AutomationError> {
        self.state = SessionState::Rigging;
        let bound = Duration::from_secs(self.cfg.action_timeout_secs);

        // Single best-effort call; completed imports stay valid on failure
        let result = match timeout(bound, self.driver.rig()).await {
            Ok(result) => result,
            Err(_) => Err(AutomationError::ActionTimeout {
                action: "rig".to_string(),
                timeout_secs: self.cfg.action_timeout_secs,
            }),
        };

        match result {
            Ok(()) => {
                self.log.push(SessionStep::ok(StepAction::Rig));
                Ok(())
            }
            Err(e) => {
                self.log
                    .push(SessionStep::failed(StepAction::Rig, e.to_string()));
                Err(AutomationError::RigFailure(e.to_string()))
            }
        }
    }

    async fn export(&mut self, target: &Path) -> Result<PathBuf, AutomationError> {
        self.state = SessionState::Exporting;
        let bound = Duration::from_secs(self.cfg.action_timeout_secs);

        let result = match timeout(bound, self.driver.export(target)).await {
            Ok(result) => result,
            Err(_) => Err(AutomationError::ActionTimeout {
                action: "export".to_string(),
                timeout_secs: self.cfg.action_timeout_secs,
            }),
        };

        if let Err(e) = result {
            self.log
                .push(SessionStep::failed(StepAction::Export, e.to_string()));
            return Err(e);
        }

        // The action reporting success means nothing until the file is there
        let size = std::fs::metadata(target).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            let err = AutomationError::ExportVerificationFailed {
                path: target.to_path_buf(),
            };
            self.log
                .push(SessionStep::failed(StepAction::Export, err.to_string()));
            return Err(err);
        }

        info!("export verified: {} ({} bytes)", target.display(), size);
        self.log.push(SessionStep::ok(StepAction::Export));
        Ok(target.to_path_buf())
    }

    /// Tear the session down; reached on every exit path
    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        let bound = Duration::from_secs(self.cfg.action_timeout_secs);
        match timeout(bound, self.driver.close()).await {
            Ok(Ok(())) => {
                self.log.push(SessionStep::ok(StepAction::Close));
            }
            Ok(Err(e)) => {
                error!("session close failed: {}", e);
                self.log
                    .push(SessionStep::failed(StepAction::Close, e.to_string()));
            }
            Err(_) => {
                error!("session close timed out");
                self.log.push(SessionStep::failed(
                    StepAction::Close,
                    "close timed out".to_string(),
                ));
            }
        }
        self.state = SessionState::Closed;
    }
}

/// Drive the automation flow, recreating the session once if the editor
/// stops responding mid-import. A fresh editor instance holds no layers, so
/// the replacement session replays every import from the top.
pub async fn drive_with_recovery<D, F>(
    factory: F,
    cfg: &AutomationConfig,
    layers: &LayerSet,
    export_target: &Path,
) -> AutomationReport
where
    D: ModelingApp,
    F: Fn() -> D,
{
    let session = AutomationSession::new(factory(), cfg.clone());
    let (result, mut log) = session.drive(layers, export_target).await;

    match result {
        Err(AutomationError::Unresponsive(reason)) => {
            warn!("session unresponsive ({}), recreating once", reason);

            let retry = AutomationSession::new(factory(), cfg.clone());
            let (retry_result, retry_log) = retry.drive(layers, export_target).await;
            log.extend(retry_log);

            let result = match retry_result {
                Err(AutomationError::Unresponsive(reason)) => {
                    // Second dead session: declare the import failed
                    let layer = last_attempted_layer(&log).unwrap_or_default();
                    Err(AutomationError::ImportFailure {
                        layer,
                        attempts: cfg.import_retries + 1,
                        message: format!("session unresponsive after recreation: {reason}"),
                    })
                }
                other => other,
            };
            AutomationReport { result, log }
        }
        result => AutomationReport { result, log },
    }
}

fn last_attempted_layer(log: &[SessionStep]) -> Option<String> {
    log.iter().rev().find_map(|s| match &s.action {
        StepAction::ImportLayer(name) => Some(name.clone()),
        _ => None,
    })
}
