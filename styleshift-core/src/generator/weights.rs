use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use super::{Generator, GeneratorConfig};
use crate::{Loader, Result, StyleDefinition, StyleError, StyleModel};

/// Reads every tensor from a `.safetensors` file or a PyTorch pickle
/// (`.pth`/`.pt`), accepting both a bare state dict and one nested under
/// `state_dict`. Tensors stay on the CPU.
pub fn read_weights(path: &Path) -> Result<HashMap<String, Tensor>> {
    if !path.is_file() {
        return Err(StyleError::model_load(path, "weights file not found"));
    }

    let is_safetensors = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"));

    let tensors = if is_safetensors {
        candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|e| StyleError::model_load(path, e))?
    } else {
        let mut tensors = candle_core::pickle::read_all_with_key(path, None)
            .map_err(|e| StyleError::model_load(path, e))?;
        if tensors.is_empty() {
            tensors = candle_core::pickle::read_all_with_key(path, Some("state_dict"))
                .map_err(|e| StyleError::model_load(path, e))?;
        }
        tensors.into_iter().collect()
    };

    if tensors.is_empty() {
        return Err(StyleError::model_load(path, "file contains no tensors"));
    }
    Ok(tensors)
}

/// Checks that `tensors` holds every parameter of a generator built from
/// `config`, with the right shape. Extra entries are ignored.
pub fn validate_weights(
    tensors: &HashMap<String, Tensor>,
    config: &GeneratorConfig,
    path: &Path,
) -> Result<()> {
    for (name, expected) in Generator::expected_shapes(config) {
        let tensor = tensors
            .get(&name)
            .ok_or_else(|| StyleError::model_load(path, format!("missing parameter `{name}`")))?;
        if tensor.dims() != expected.as_slice() {
            return Err(StyleError::ShapeMismatch {
                name,
                expected,
                actual: tensor.dims().to_vec(),
            });
        }
    }
    Ok(())
}

/// Loads generator checkpoints for the `generator` backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorLoader {
    config: GeneratorConfig,
}

impl GeneratorLoader {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn load_generator(&self, path: &Path, device: &Device) -> Result<Generator> {
        let start = Instant::now();
        let tensors = read_weights(path)?;
        validate_weights(&tensors, &self.config, path)?;

        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        let generator =
            Generator::new(self.config, vb).map_err(|e| StyleError::model_load(path, e))?;

        tracing::debug!(
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded generator weights"
        );
        Ok(generator)
    }
}

impl Loader for GeneratorLoader {
    fn load(&self, style: &StyleDefinition, device: &Device) -> Result<Arc<dyn StyleModel>> {
        Ok(Arc::new(self.load_generator(&style.weights, device)?))
    }
}
