//! Filesystem-backed artifact store
//!
//! One directory per run, named by timestamp:
//!
//! ```text
//! <output_dir>/<run_id>/
//!   run.json              stage history and config snapshot
//!   character/            input or generated character image
//!   layers/               segmented layers + manifest.json
//!   model/                exported model artifact
//! ```

use crate::core::config::AppConfig;
use crate::core::error::{StorageError, ValidationError};
use crate::core::layer::{LayerManifest, LayerSet, MANIFEST_FILE};
use crate::core::run::{EntryPoint, Run, RunId};
use crate::core::stage::StageRecord;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Subdirectories allocated inside every run directory
const RUN_SUBDIRS: [&str; 3] = ["character", "layers", "model"];

/// Filesystem store managing the per-run artifact layout
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Allocate a fresh timestamped run directory and persist the initial
    /// run metadata. A same-second collision gets a numeric suffix.
    pub fn create_run(
        &self,
        entry: EntryPoint,
        config: &AppConfig,
    ) -> Result<Run, StorageError> {
        let base = RunId::from_timestamp(Local::now());
        let (id, root) = self.allocate_run_dir(&base)?;

        for sub in RUN_SUBDIRS {
            let dir = root.join(sub);
            fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        let run = Run::new(id, root, entry, config.clone());
        self.save_run(&run)?;

        info!("created run {} at {}", run.id, run.root.display());
        Ok(run)
    }

    fn allocate_run_dir(&self, base: &RunId) -> Result<(RunId, PathBuf), StorageError> {
        let mut id = base.clone();
        let mut suffix = 2u32;
        loop {
            let root = self.output_dir.join(id.as_str());
            match fs::create_dir_all(&self.output_dir)
                .and_then(|()| fs::create_dir(&root))
            {
                Ok(()) => return Ok((id, root)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    id = base.with_suffix(suffix);
                    suffix += 1;
                }
                Err(source) => {
                    return Err(StorageError::CreateDir { path: root, source });
                }
            }
        }
    }

    /// Validate an existing layer directory and return its layer set.
    /// See [`LayerSet::resolve`] for the well-formedness rules.
    pub fn resolve_layer_set(&self, dir: &Path) -> Result<LayerSet, ValidationError> {
        let set = LayerSet::resolve(dir)?;
        debug!(
            "resolved layer set at {} ({} layers)",
            dir.display(),
            set.len()
        );
        Ok(set)
    }

    /// Write a layer manifest into a layer directory
    pub fn write_manifest(
        &self,
        dir: &Path,
        manifest: &LayerManifest,
    ) -> Result<(), StorageError> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest).map_err(|source| {
            StorageError::DecodeMetadata {
                path: path.clone(),
                source,
            }
        })?;
        atomic_write(&path, json.as_bytes())
    }

    /// Apply a stage record to the run and atomically rewrite its metadata.
    /// Exactly one call per stage execution, win or lose.
    pub fn persist_stage_record(
        &self,
        run: &mut Run,
        record: StageRecord,
    ) -> Result<(), StorageError> {
        run.record(record)?;
        self.save_run(run)
    }

    /// Atomically rewrite the run's `run.json` (write-to-temp-then-rename,
    /// so a crash mid-write never corrupts prior state).
    pub fn save_run(&self, run: &Run) -> Result<(), StorageError> {
        let path = Run::metadata_path(&run.root);
        let json = serde_json::to_string_pretty(run).map_err(|source| {
            StorageError::DecodeMetadata {
                path: path.clone(),
                source,
            }
        })?;
        atomic_write(&path, json.as_bytes())
    }

    /// Reconstruct a run's state from its persisted metadata
    pub fn load_run(&self, id: &RunId) -> Result<Run, StorageError> {
        let root = self.output_dir.join(id.as_str());
        let path = Run::metadata_path(&root);
        if !path.is_file() {
            return Err(StorageError::RunNotFound(id.to_string()));
        }

        let content = fs::read_to_string(&path).map_err(|source| StorageError::ReadMetadata {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::DecodeMetadata {
            path,
            source,
        })
    }

    /// Run ids found under the output directory, newest first
    pub fn list_runs(&self) -> Result<Vec<RunId>, StorageError> {
        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::ReadMetadata {
                    path: self.output_dir.clone(),
                    source,
                })
            }
        };

        let mut ids: Vec<RunId> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| RunId::parse(&e.file_name().to_string_lossy()).ok())
            .collect();

        // Run ids are timestamps, so lexical order is chronological
        ids.sort_by(|a, b| b.as_str().cmp(a.as_str()));
        Ok(ids)
    }

    /// Where a run's character image lives
    pub fn character_path(root: &Path) -> PathBuf {
        root.join("character").join("character.png")
    }

    /// A run's layer directory
    pub fn layers_dir(root: &Path) -> PathBuf {
        root.join("layers")
    }

    /// Where a run's exported model artifact lives
    pub fn export_path(root: &Path) -> PathBuf {
        root.join("model").join("model.moc3")
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|source| StorageError::WriteMetadata {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StorageError::WriteMetadata {
        path: path.to_path_buf(),
        source,
    })
}
