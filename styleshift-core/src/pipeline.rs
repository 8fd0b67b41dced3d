use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{codec, ModelCache, Result, StyleCatalog, StyleError, StyleModel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: String,
    pub style_id: String,
}

/// A validated unit of work. Planning a job touches no files; the output path
/// is unique per job so concurrent jobs never share a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub transfer_id: Uuid,
    pub product_id: String,
    pub style_id: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl TransferJob {
    /// `{product_id}_{style_id}_{transfer_id}.jpg`
    pub fn output_file_name(&self) -> String {
        format!(
            "{}_{}_{}.jpg",
            self.product_id, self.style_id, self.transfer_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDirs {
    pub products: PathBuf,
    pub results: PathBuf,
}

pub struct StylePipeline {
    catalog: StyleCatalog,
    models: ModelCache,
    dirs: PipelineDirs,
}

impl StylePipeline {
    pub fn new(catalog: StyleCatalog, models: ModelCache, dirs: PipelineDirs) -> Self {
        Self {
            catalog,
            models,
            dirs,
        }
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    pub fn dirs(&self) -> &PipelineDirs {
        &self.dirs
    }

    pub fn plan(&self, request: &TransferRequest) -> Result<TransferJob> {
        let style = self.catalog.get(&request.style_id)?;
        if !is_valid_product_id(&request.product_id) {
            return Err(StyleError::InvalidProductId(request.product_id.clone()));
        }

        let mut job = TransferJob {
            transfer_id: Uuid::new_v4(),
            product_id: request.product_id.clone(),
            style_id: style.id.clone(),
            source: self.dirs.products.join(format!("{}.jpg", request.product_id)),
            output: PathBuf::new(),
            created_at: Utc::now(),
        };
        job.output = self.dirs.results.join(job.output_file_name());
        Ok(job)
    }

    /// Runs the whole transfer for `job` and returns the written file.
    ///
    /// If `deadline` passes before the result is encoded nothing is written.
    pub fn run(&self, job: &TransferJob, deadline: Option<Instant>) -> Result<PathBuf> {
        let start = Instant::now();
        let style = self.catalog.get(&job.style_id)?;

        let input = codec::load_image_tensor(&job.source, self.models.device())?;
        let model = self.models.get(style)?;
        let output = model.stylize(&input)?;

        if output.dims() != input.dims() {
            return Err(StyleError::ShapeMismatch {
                name: "generator output".to_string(),
                expected: input.dims().to_vec(),
                actual: output.dims().to_vec(),
            });
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(StyleError::DeadlineExceeded {
                elapsed: start.elapsed(),
            });
        }

        let image = codec::tensor_to_image(&output)?;
        codec::save_image_atomic(&image, &job.output)?;

        tracing::debug!(
            transfer_id = %job.transfer_id,
            output = %job.output.display(),
            width = image.width(),
            height = image.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "wrote stylized image"
        );
        Ok(job.output.clone())
    }
}

/// Product ids become file names, so only a conservative alphabet is allowed.
fn is_valid_product_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Creates `dir` and its parents when missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| StyleError::io(dir, e))
}
