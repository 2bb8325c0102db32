//! Image-generation collaborator - calls the configured generator command

use crate::collaborators::ImageGenerator;
use crate::core::config::GenerationConfig;
use crate::core::error::StageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Client that shells out to an external text-to-image tool
///
/// The tool receives `--prompt/--style/--width/--height/--out` and must
/// write the finished image to the `--out` path.
#[derive(Debug, Clone)]
pub struct SdCommandGenerator {
    config: GenerationConfig,
}

impl SdCommandGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ImageGenerator for SdCommandGenerator {
    async fn generate(&self, out: &Path) -> Result<PathBuf, StageError> {
        debug!(
            "spawning generator '{}' (prompt length {})",
            self.config.command,
            self.config.prompt.len()
        );

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(
            timeout_duration,
            Command::new(&self.config.command)
                .arg("--prompt")
                .arg(&self.config.prompt)
                .arg("--style")
                .arg(&self.config.style)
                .arg("--width")
                .arg(self.config.resolution[0].to_string())
                .arg("--height")
                .arg(self.config.resolution[1].to_string())
                .arg("--out")
                .arg(out)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            StageError::Generation(format!(
                "generator timed out after {}s",
                self.config.timeout_secs
            ))
        })?;

        let output = result.map_err(|e| {
            StageError::Generation(format!(
                "failed to spawn generator '{}': {}",
                self.config.command, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("generator exited with code {}: {}", exit_code, stderr.trim());
            return Err(StageError::Generation(format!(
                "generator exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        let produced = std::fs::metadata(out).map(|m| m.len()).unwrap_or(0);
        if produced == 0 {
            return Err(StageError::Generation(format!(
                "generator reported success but wrote nothing to {}",
                out.display()
            )));
        }

        debug!("generator wrote {} bytes to {}", produced, out.display());
        Ok(out.to_path_buf())
    }
}
