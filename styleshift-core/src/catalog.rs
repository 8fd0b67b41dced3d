//! The immutable style catalog, built once at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, StyleError};

/// A style the service can apply. `weights` points at the generator's
/// parameter file; relative paths are resolved against the models directory
/// when the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub weights: PathBuf,
}

impl StyleDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        weights: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            weights: weights.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: Vec<StyleDefinition>,
    index: HashMap<String, usize>,
}

impl StyleCatalog {
    /// Builds a catalog, rejecting duplicate ids. Order is preserved for listing.
    pub fn new(styles: Vec<StyleDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(styles.len());
        for (position, style) in styles.iter().enumerate() {
            if index.insert(style.id.clone(), position).is_some() {
                return Err(StyleError::DuplicateStyle(style.id.clone()));
            }
        }
        Ok(Self { styles, index })
    }

    /// The four styles shipped with the storefront.
    pub fn builtin(models_dir: impl AsRef<Path>) -> Result<Self> {
        let models_dir = models_dir.as_ref();
        Self::new(vec![
            StyleDefinition::new(
                "s1",
                "Monochrome",
                "Classic black and white style",
                models_dir.join("monochrome_cyclegan.pth"),
            ),
            StyleDefinition::new(
                "s2",
                "Vintage",
                "Retro-inspired warm tones",
                models_dir.join("vintage_cyclegan.pth"),
            ),
            StyleDefinition::new(
                "s3",
                "Nature",
                "Earthy green environment",
                models_dir.join("nature_cyclegan.pth"),
            ),
            StyleDefinition::new(
                "s4",
                "Neon",
                "Vibrant pink urban style",
                models_dir.join("neon_cyclegan.pth"),
            ),
        ])
    }

    /// Reads a JSON array of style definitions.
    pub fn from_json_file(path: impl AsRef<Path>, models_dir: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| StyleError::io(path, e))?;
        let styles: Vec<StyleDefinition> =
            serde_json::from_str(&raw).map_err(|e| StyleError::Catalog {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if styles.is_empty() {
            return Err(StyleError::Catalog {
                path: path.to_path_buf(),
                reason: "catalog defines no styles".to_string(),
            });
        }

        let models_dir = models_dir.as_ref();
        let styles = styles
            .into_iter()
            .map(|style| StyleDefinition {
                weights: models_dir.join(&style.weights),
                ..style
            })
            .collect();
        Self::new(styles)
    }

    pub fn get(&self, id: &str) -> Result<&StyleDefinition> {
        self.index
            .get(id)
            .map(|&position| &self.styles[position])
            .ok_or_else(|| StyleError::UnknownStyle(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDefinition> {
        self.styles.iter()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
