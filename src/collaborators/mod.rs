//! External ML collaborators: image generation and layer segmentation
//!
//! Both are invoked as subprocess commands and specified only at their
//! interface boundary; the traits are the seams test fakes implement.

pub mod generate;
pub mod segment;

use crate::core::error::StageError;
use crate::core::layer::LayerSet;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use generate::SdCommandGenerator;
pub use segment::SegmenterCommand;

/// Produces a character illustration at the requested path
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image and return its path. Any failure is a
    /// generation-stage failure; retries belong to the collaborator itself.
    async fn generate(&self, out: &Path) -> Result<PathBuf, StageError>;
}

/// Splits a character image into semantically tagged layers
#[async_trait]
pub trait LayerSegmenter: Send + Sync {
    /// Segment `image` into `out_dir` and return the validated layer set.
    /// A result with zero layers is a segmentation-stage failure.
    async fn segment(&self, image: &Path, out_dir: &Path) -> Result<LayerSet, StageError>;
}
