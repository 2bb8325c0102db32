//! Application configuration from YAML

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Character image generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Layer segmentation settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// External Cubism editor settings
    pub cubism: CubismConfig,

    /// Input/output directories
    #[serde(default)]
    pub io: IoConfig,

    /// UI automation timeouts and retry counts
    #[serde(default)]
    pub automation: AutomationConfig,
}

/// Settings for the image-generation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// External generation command (receives --prompt/--style/--width/--height/--out)
    #[serde(default = "default_generation_command")]
    pub command: String,

    /// Prompt describing the character
    #[serde(default)]
    pub prompt: String,

    /// Art style passed to the generator
    #[serde(default = "default_style")]
    pub style: String,

    /// Output resolution as [width, height]
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],

    /// Timeout for one generation call (in seconds)
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

/// Settings for the segmentation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// External segmentation command (receives --image/--quality/--out)
    #[serde(default = "default_segmentation_command")]
    pub command: String,

    /// Segmentation quality preset
    #[serde(default)]
    pub quality: SegmentationQuality,

    /// Minimum number of layers a usable result must contain
    #[serde(default = "default_min_layers")]
    pub min_layers: usize,

    /// Timeout for one segmentation call (in seconds)
    #[serde(default = "default_segmentation_timeout")]
    pub timeout_secs: u64,
}

/// Segmentation quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl SegmentationQuality {
    /// String form passed on the segmenter command line
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentationQuality::Low => "low",
            SegmentationQuality::Medium => "medium",
            SegmentationQuality::High => "high",
        }
    }
}

/// Settings for the external Cubism editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubismConfig {
    /// Path to the Cubism executable (required for automation)
    pub executable_path: PathBuf,

    /// Optional command that exits 0 once the main window is up
    #[serde(default)]
    pub window_probe: Option<String>,

    /// Seconds to wait after launch when no window probe is configured
    #[serde(default = "default_startup_grace")]
    pub startup_grace_secs: u64,
}

/// Input/output directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Root directory holding one subdirectory per run
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Scratch directory for intermediate files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

/// Timeouts and retry counts for UI automation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Bound on waiting for the editor's main window after launch
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,

    /// Bound on one UI action (import, rig, export)
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,

    /// Settle delay after issuing an import, before the next action
    #[serde(default = "default_import_wait")]
    pub import_wait_secs: u64,

    /// Retries per import action before the session fails
    #[serde(default = "default_import_retries")]
    pub import_retries: usize,

    /// Grace period between a quit request and a forced kill
    #[serde(default = "default_close_grace")]
    pub close_grace_secs: u64,
}

fn default_generation_command() -> String {
    "sd-gen".to_string()
}

fn default_style() -> String {
    "anime".to_string()
}

fn default_resolution() -> [u32; 2] {
    [1024, 1536]
}

fn default_generation_timeout() -> u64 {
    600
}

fn default_segmentation_command() -> String {
    "layer-split".to_string()
}

fn default_min_layers() -> usize {
    1
}

fn default_segmentation_timeout() -> u64 {
    300
}

fn default_startup_grace() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_launch_timeout() -> u64 {
    30
}

fn default_action_timeout() -> u64 {
    60
}

fn default_import_wait() -> u64 {
    5
}

fn default_import_retries() -> usize {
    2
}

fn default_close_grace() -> u64 {
    5
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            command: default_generation_command(),
            prompt: String::new(),
            style: default_style(),
            resolution: default_resolution(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            command: default_segmentation_command(),
            quality: SegmentationQuality::default(),
            min_layers: default_min_layers(),
            timeout_secs: default_segmentation_timeout(),
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            launch_timeout_secs: default_launch_timeout(),
            action_timeout_secs: default_action_timeout(),
            import_wait_secs: default_import_wait(),
            import_retries: default_import_retries(),
            close_grace_secs: default_close_grace(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cubism.executable_path.as_os_str().is_empty() {
            anyhow::bail!("cubism.executable_path must not be empty");
        }

        if self.generation.resolution[0] == 0 || self.generation.resolution[1] == 0 {
            anyhow::bail!(
                "generation.resolution must be positive, got {:?}",
                self.generation.resolution
            );
        }

        if self.segmentation.min_layers == 0 {
            anyhow::bail!("segmentation.min_layers must be at least 1");
        }

        if self.automation.launch_timeout_secs == 0 || self.automation.action_timeout_secs == 0 {
            anyhow::bail!("automation timeouts must be positive");
        }

        Ok(())
    }
}
