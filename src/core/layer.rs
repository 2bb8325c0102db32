//! Layer set domain model and manifest schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the machine-readable manifest inside a layer directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Z-order of known semantic parts, back to front. Layers whose tag is not
/// listed sort behind `accessories` but keep their relative manifest order.
const PART_ORDER: &[&str] = &[
    "background",
    "hair_back",
    "body",
    "arm_left",
    "arm_right",
    "leg_left",
    "leg_right",
    "face",
    "eye_white_left",
    "eye_white_right",
    "iris_left",
    "iris_right",
    "eyebrows_left",
    "eyebrows_right",
    "nose",
    "mouth",
    "hair_side",
    "hair_front",
    "accessories",
];

/// One segmented image layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Layer name, unique within its set
    pub name: String,

    /// Semantic part tag (e.g. "hair_front", "body")
    pub tag: String,

    /// Image file, relative to the layer directory
    pub file: PathBuf,

    /// Bounding box as [x, y, width, height] in source-image pixels
    pub bbox: [u32; 4],
}

impl Layer {
    /// Position of this layer's tag in the part z-order
    fn z_index(&self) -> usize {
        PART_ORDER
            .iter()
            .position(|p| *p == self.tag)
            .unwrap_or(PART_ORDER.len())
    }
}

/// Serialized description of a layer directory's contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerManifest {
    /// Image the layers were cut from
    pub source_image: PathBuf,

    /// When segmentation produced this set
    pub created_at: DateTime<Utc>,

    /// Layers in import order (back to front)
    pub layers: Vec<Layer>,
}

impl LayerManifest {
    /// Build a manifest from layers, sorting them into part z-order.
    /// The sort is stable so same-part layers keep the segmenter's order.
    pub fn new(source_image: PathBuf, mut layers: Vec<Layer>) -> Self {
        layers.sort_by_key(Layer::z_index);
        Self {
            source_image,
            created_at: Utc::now(),
            layers,
        }
    }
}

/// A validated layer directory: the manifest plus the directory it lives in.
///
/// The directory path doubles as the resumability key — any directory with a
/// well-formed manifest can seed a new run without re-running earlier stages.
#[derive(Debug, Clone)]
pub struct LayerSet {
    dir: PathBuf,
    manifest: LayerManifest,
}

impl LayerSet {
    pub(crate) fn new(dir: PathBuf, manifest: LayerManifest) -> Self {
        Self { dir, manifest }
    }

    /// Validate a layer directory and return its layer set.
    ///
    /// A well-formed directory has a parseable manifest with at least one
    /// layer, non-empty tags, and every referenced file present on disk.
    /// Resolving the same directory twice yields equal contents.
    pub fn resolve(dir: &Path) -> Result<Self, crate::core::error::ValidationError> {
        use crate::core::error::ValidationError;

        let manifest_path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest_path)
            .map_err(|_| ValidationError::MissingManifest(manifest_path.clone()))?;

        let manifest: LayerManifest =
            serde_json::from_str(&content).map_err(|e| ValidationError::MalformedManifest {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?;

        if manifest.layers.is_empty() {
            return Err(ValidationError::EmptyLayerSet(dir.to_path_buf()));
        }

        for layer in &manifest.layers {
            if layer.tag.trim().is_empty() {
                return Err(ValidationError::EmptyTag(layer.name.clone()));
            }
            let file = dir.join(&layer.file);
            if !file.is_file() {
                return Err(ValidationError::MissingLayerFile {
                    layer: layer.name.clone(),
                    file,
                });
            }
        }

        Ok(Self::new(dir.to_path_buf(), manifest))
    }

    /// Directory holding the manifest and layer files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Layers in import order
    pub fn layers(&self) -> &[Layer] {
        &self.manifest.layers
    }

    pub fn manifest(&self) -> &LayerManifest {
        &self.manifest
    }

    /// Absolute path of one layer's image file
    pub fn layer_path(&self, layer: &Layer) -> PathBuf {
        self.dir.join(&layer.file)
    }

    pub fn len(&self) -> usize {
        self.manifest.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.layers.is_empty()
    }
}
