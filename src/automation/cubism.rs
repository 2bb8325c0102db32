//! Production driver for the Live2D Cubism editor
//!
//! Drives the real application through process control and menu keystroke
//! sequences. Timing is the enemy here: every action is followed by a
//! settle delay, and launch waits for either a window probe or a fixed
//! grace period before the editor is considered ready.

use crate::automation::input::UiInput;
use crate::automation::ModelingApp;
use crate::core::config::{AutomationConfig, CubismConfig};
use crate::core::error::AutomationError;
use crate::core::layer::Layer;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Poll interval while waiting for the editor to come up or go down
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// UI driver holding the editor process and its input channel
pub struct CubismUi {
    cubism: CubismConfig,
    automation: AutomationConfig,
    input: UiInput,
    child: Option<Child>,
}

impl CubismUi {
    pub fn new(cubism: CubismConfig, automation: AutomationConfig) -> Self {
        Self {
            cubism,
            automation,
            input: UiInput::new(),
            child: None,
        }
    }

    /// Whether the optional window probe reports the main window as up
    async fn window_ready(&self) -> bool {
        let Some(probe) = &self.cubism.window_probe else {
            return false;
        };
        match Command::new("sh")
            .arg("-c")
            .arg(probe)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(e) => {
                warn!("window probe failed to run: {}", e);
                false
            }
        }
    }

    fn settle(&self) -> Duration {
        Duration::from_secs(self.automation.import_wait_secs)
    }
}

#[async_trait]
impl ModelingApp for CubismUi {
    async fn launch(&mut self) -> Result<(), AutomationError> {
        info!(
            "launching Cubism from {}",
            self.cubism.executable_path.display()
        );

        let child = Command::new(&self.cubism.executable_path)
            .kill_on_drop(true)
            .spawn()?;
        self.child = Some(child);

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.automation.launch_timeout_secs);
        let grace = Duration::from_secs(self.cubism.startup_grace_secs);
        let started = tokio::time::Instant::now();

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::LaunchTimeout(
                    self.automation.launch_timeout_secs,
                ));
            }

            if !self.is_responsive() {
                return Err(AutomationError::Unresponsive(
                    "Cubism exited during startup".to_string(),
                ));
            }

            if self.cubism.window_probe.is_some() {
                if self.window_ready().await {
                    break;
                }
            } else if started.elapsed() >= grace {
                break;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        debug!("Cubism ready after {:?}", started.elapsed());
        Ok(())
    }

    async fn import_layer(&mut self, layer: &Layer, file: &Path) -> Result<(), AutomationError> {
        info!("importing layer '{}' from {}", layer.name, file.display());

        if !file.is_file() {
            return Err(AutomationError::ImportFailure {
                layer: layer.name.clone(),
                attempts: 1,
                message: format!("layer file missing: {}", file.display()),
            });
        }

        // File > Import > Image, then type the path into the file dialog
        self.input.press_sequence(&["alt", "f", "i", "p"]).await?;
        self.input.type_text(&file.to_string_lossy()).await?;
        self.input.press("Return").await?;

        tokio::time::sleep(self.settle()).await;
        Ok(())
    }

    async fn rig(&mut self) -> Result<(), AutomationError> {
        info!("triggering auto-rig");

        // Modeling > Apply template, confirm the dialog
        self.input.press_sequence(&["alt", "m", "t"]).await?;
        self.input.press("Return").await?;

        tokio::time::sleep(self.settle()).await;
        Ok(())
    }

    async fn export(&mut self, target: &Path) -> Result<(), AutomationError> {
        info!("exporting model to {}", target.display());

        // File > Export, type the target path, confirm
        self.input.press_sequence(&["alt", "f", "e"]).await?;
        self.input.type_text(&target.to_string_lossy()).await?;
        self.input.press("Return").await?;

        tokio::time::sleep(self.settle()).await;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!("closing Cubism");

        // Ask nicely first; discard any unsaved-changes dialog
        if self.input.press("alt+F4").await.is_ok() {
            let deadline = tokio::time::Instant::now()
                + Duration::from_secs(self.automation.close_grace_secs);
            while tokio::time::Instant::now() < deadline {
                if child.try_wait()?.is_some() {
                    debug!("Cubism exited gracefully");
                    return Ok(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        warn!("Cubism did not exit within grace period, killing");
        child.kill().await?;
        Ok(())
    }

    fn is_responsive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn driver_for(executable: &str) -> CubismUi {
        CubismUi::new(
            CubismConfig {
                executable_path: PathBuf::from(executable),
                window_probe: None,
                startup_grace_secs: 0,
            },
            AutomationConfig {
                launch_timeout_secs: 2,
                action_timeout_secs: 2,
                import_wait_secs: 0,
                import_retries: 2,
                close_grace_secs: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let mut driver = driver_for("nonexistent-cubism-binary");
        let result = driver.launch().await;
        assert!(matches!(result, Err(AutomationError::Io(_))));
        assert!(!driver.is_responsive());
    }

    #[tokio::test]
    async fn test_launch_and_close_long_running_process() {
        // A sleeping process stands in for the editor staying up
        let mut driver = driver_for("sleep");
        let child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        driver.child = Some(child);

        assert!(driver.is_responsive());
        driver.close().await.unwrap();
        assert!(!driver.is_responsive());
    }

    #[tokio::test]
    async fn test_import_missing_file_fails_fast() {
        let mut driver = driver_for("sleep");
        let layer = Layer {
            name: "body".to_string(),
            tag: "body".to_string(),
            file: PathBuf::from("body.png"),
            bbox: [0, 0, 10, 10],
        };
        let result = driver
            .import_layer(&layer, Path::new("/nonexistent/body.png"))
            .await;
        assert!(matches!(
            result,
            Err(AutomationError::ImportFailure { .. })
        ));
    }
}
