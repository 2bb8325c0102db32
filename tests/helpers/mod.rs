//! Shared test utilities: scripted fake driver, fake collaborators,
//! temp-dir fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use live2dgen::core::config::AppConfig;
use live2dgen::core::error::{AutomationError, StageError};
use live2dgen::core::layer::{Layer, LayerManifest, LayerSet, MANIFEST_FILE};
use live2dgen::core::stage::{StageName, StageRecord, StageStatus};
use live2dgen::{ImageGenerator, LayerSegmenter, ModelingApp};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with fast timeouts, rooted in a temp directory
pub fn test_config(output_dir: &Path) -> AppConfig {
    AppConfig::from_yaml(&format!(
        r#"
generation:
  prompt: "test character"
  timeout_secs: 5
segmentation:
  timeout_secs: 5
cubism:
  executable_path: /opt/cubism/Cubism
io:
  output_dir: {}
automation:
  launch_timeout_secs: 1
  action_timeout_secs: 1
  import_wait_secs: 0
  import_retries: 2
  close_grace_secs: 1
"#,
        output_dir.display()
    ))
    .unwrap()
}

/// Write a valid layer directory (files + manifest) and return its path
pub fn seed_layer_dir(dir: &Path, names: &[&str]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let layers: Vec<Layer> = names
        .iter()
        .map(|n| Layer {
            name: n.to_string(),
            tag: n.to_string(),
            file: PathBuf::from(format!("{n}.png")),
            bbox: [0, 0, 64, 64],
        })
        .collect();
    for layer in &layers {
        std::fs::write(dir.join(&layer.file), b"fake png bytes").unwrap();
    }
    let manifest = LayerManifest::new(PathBuf::from("character.png"), layers);
    std::fs::write(
        dir.join(MANIFEST_FILE),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    dir.to_path_buf()
}

/// Assert the latest status of one stage in a record set
pub fn assert_stage(records: &[StageRecord], stage: StageName, status: StageStatus) {
    let record = records
        .iter()
        .find(|r| r.stage == stage)
        .unwrap_or_else(|| panic!("no record for stage {stage}"));
    assert_eq!(
        record.status, status,
        "stage {stage} expected {status:?}, got {:?} (error: {:?})",
        record.status, record.error
    );
}

// --- Fake collaborators ----------------------------------------------------

/// Generator that writes a placeholder image, or fails on demand
pub struct FakeGenerator {
    pub fail: bool,
}

impl FakeGenerator {
    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, out: &Path) -> Result<PathBuf, StageError> {
        if self.fail {
            return Err(StageError::Generation("model refused the prompt".to_string()));
        }
        std::fs::write(out, b"fake character image").unwrap();
        Ok(out.to_path_buf())
    }
}

/// Segmenter that materializes a fixed layer list, or produces nothing
pub struct FakeSegmenter {
    pub layers: Vec<String>,
}

impl FakeSegmenter {
    pub fn with_layers(names: &[&str]) -> Self {
        Self {
            layers: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn empty() -> Self {
        Self { layers: Vec::new() }
    }
}

#[async_trait]
impl LayerSegmenter for FakeSegmenter {
    async fn segment(&self, _image: &Path, out_dir: &Path) -> Result<LayerSet, StageError> {
        if self.layers.is_empty() {
            return Err(StageError::Segmentation(
                "segmenter produced 0 layers, need at least 1".to_string(),
            ));
        }
        let names: Vec<&str> = self.layers.iter().map(|s| s.as_str()).collect();
        seed_layer_dir(out_dir, &names);
        LayerSet::resolve(out_dir).map_err(|e| StageError::Segmentation(e.to_string()))
    }
}

// --- Fake modeling application ---------------------------------------------

/// How the fake handles the export action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Write a non-empty model file
    #[default]
    Write,
    /// Report success but leave the file empty
    WriteEmpty,
    /// Report success without writing anything
    Skip,
    /// Fail the export action outright
    Fail,
}

/// Scripted behavior for one fake editor instance
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    /// Launch takes this long (for timeout injection)
    pub launch_delay: Option<Duration>,
    pub fail_launch: bool,
    /// Layer name -> number of attempts that fail before succeeding
    /// (usize::MAX fails every attempt)
    pub import_fail_times: HashMap<String, usize>,
    /// Importing this layer kills the app (session turns unresponsive)
    pub unresponsive_on: Option<String>,
    /// Only the first created instance gets `unresponsive_on`
    pub unresponsive_once: bool,
    pub fail_rig: bool,
    pub export_mode: ExportMode,
}

impl FakeBehavior {
    pub fn fail_import_always(mut self, layer: &str) -> Self {
        self.import_fail_times.insert(layer.to_string(), usize::MAX);
        self
    }

    pub fn fail_import_times(mut self, layer: &str, times: usize) -> Self {
        self.import_fail_times.insert(layer.to_string(), times);
        self
    }
}

/// State shared across every instance a factory creates
#[derive(Debug, Default)]
pub struct SharedState {
    /// Sessions created so far
    pub sessions: usize,
    /// Sessions whose close() ran
    pub closed: usize,
    /// Launched-but-not-closed handles right now
    pub open_handles: isize,
    /// Every import attempt, in order (layer names)
    pub import_attempts: Vec<String>,
    /// Imports that completed, in order
    pub imports_completed: Vec<String>,
}

/// Factory producing scripted fake editor instances
#[derive(Clone)]
pub struct FakeCubismFactory {
    behavior: FakeBehavior,
    pub shared: Arc<Mutex<SharedState>>,
}

impl FakeCubismFactory {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            shared: Arc::new(Mutex::new(SharedState::default())),
        }
    }

    pub fn healthy() -> Self {
        Self::new(FakeBehavior::default())
    }

    pub fn build(&self) -> FakeCubism {
        let mut shared = self.shared.lock().unwrap();
        shared.sessions += 1;
        let index = shared.sessions;
        drop(shared);

        let mut behavior = self.behavior.clone();
        if behavior.unresponsive_once && index > 1 {
            behavior.unresponsive_on = None;
        }

        FakeCubism {
            behavior,
            shared: self.shared.clone(),
            fail_counts: HashMap::new(),
            launched: false,
            responsive: true,
        }
    }

    /// Closure form for the orchestrator / drive_with_recovery
    pub fn as_fn(&self) -> impl Fn() -> FakeCubism + '_ {
        move || self.build()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap()
    }
}

/// Scripted in-memory stand-in for the Cubism editor
pub struct FakeCubism {
    behavior: FakeBehavior,
    shared: Arc<Mutex<SharedState>>,
    fail_counts: HashMap<String, usize>,
    launched: bool,
    responsive: bool,
}

#[async_trait]
impl ModelingApp for FakeCubism {
    async fn launch(&mut self) -> Result<(), AutomationError> {
        if let Some(delay) = self.behavior.launch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.behavior.fail_launch {
            return Err(AutomationError::Unresponsive(
                "splash screen never cleared".to_string(),
            ));
        }
        self.launched = true;
        self.shared.lock().unwrap().open_handles += 1;
        Ok(())
    }

    async fn import_layer(&mut self, layer: &Layer, _file: &Path) -> Result<(), AutomationError> {
        self.shared
            .lock()
            .unwrap()
            .import_attempts
            .push(layer.name.clone());

        if self.behavior.unresponsive_on.as_deref() == Some(layer.name.as_str()) {
            self.responsive = false;
            return Err(AutomationError::Unresponsive(
                "import dialog froze".to_string(),
            ));
        }

        let scripted_failures = self
            .behavior
            .import_fail_times
            .get(&layer.name)
            .copied()
            .unwrap_or(0);
        let remaining = self
            .fail_counts
            .entry(layer.name.clone())
            .or_insert(scripted_failures);

        if *remaining > 0 {
            if *remaining != usize::MAX {
                *remaining -= 1;
            }
            return Err(AutomationError::ImportFailure {
                layer: layer.name.clone(),
                attempts: 1,
                message: "import action did not take".to_string(),
            });
        }

        self.shared
            .lock()
            .unwrap()
            .imports_completed
            .push(layer.name.clone());
        Ok(())
    }

    async fn rig(&mut self) -> Result<(), AutomationError> {
        if self.behavior.fail_rig {
            return Err(AutomationError::RigFailure(
                "template could not be applied".to_string(),
            ));
        }
        Ok(())
    }

    async fn export(&mut self, target: &Path) -> Result<(), AutomationError> {
        match self.behavior.export_mode {
            ExportMode::Write => {
                std::fs::write(target, b"moc3 model bytes").unwrap();
                Ok(())
            }
            ExportMode::WriteEmpty => {
                std::fs::write(target, b"").unwrap();
                Ok(())
            }
            ExportMode::Skip => Ok(()),
            ExportMode::Fail => Err(AutomationError::ActionTimeout {
                action: "export".to_string(),
                timeout_secs: 1,
            }),
        }
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        let mut shared = self.shared.lock().unwrap();
        shared.closed += 1;
        if self.launched {
            shared.open_handles -= 1;
            self.launched = false;
        }
        Ok(())
    }

    fn is_responsive(&mut self) -> bool {
        self.responsive
    }
}
