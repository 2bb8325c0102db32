//! Segmentation collaborator - calls the configured layer-splitting command

use crate::collaborators::LayerSegmenter;
use crate::core::config::SegmentationConfig;
use crate::core::error::StageError;
use crate::core::layer::LayerSet;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Client that shells out to an external segmentation tool
///
/// The tool receives `--image/--quality/--out`, cuts the character into
/// part layers under the `--out` directory, and writes a `manifest.json`
/// describing them. The produced manifest is re-validated here so a
/// misbehaving tool surfaces as a segmentation failure, not as a broken
/// automation stage later.
#[derive(Debug, Clone)]
pub struct SegmenterCommand {
    config: SegmentationConfig,
}

impl SegmenterCommand {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LayerSegmenter for SegmenterCommand {
    async fn segment(&self, image: &Path, out_dir: &Path) -> Result<LayerSet, StageError> {
        debug!(
            "spawning segmenter '{}' on {}",
            self.config.command,
            image.display()
        );

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(
            timeout_duration,
            Command::new(&self.config.command)
                .arg("--image")
                .arg(image)
                .arg("--quality")
                .arg(self.config.quality.as_str())
                .arg("--out")
                .arg(out_dir)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            StageError::Segmentation(format!(
                "segmenter timed out after {}s",
                self.config.timeout_secs
            ))
        })?;

        let output = result.map_err(|e| {
            StageError::Segmentation(format!(
                "failed to spawn segmenter '{}': {}",
                self.config.command, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("segmenter exited with code {}: {}", exit_code, stderr.trim());
            return Err(StageError::Segmentation(format!(
                "segmenter exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        let set = LayerSet::resolve(out_dir)
            .map_err(|e| StageError::Segmentation(e.to_string()))?;

        if set.len() < self.config.min_layers {
            return Err(StageError::Segmentation(format!(
                "segmenter produced {} layers, need at least {}",
                set.len(),
                self.config.min_layers
            )));
        }

        debug!("segmenter produced {} layers", set.len());
        Ok(set)
    }
}
