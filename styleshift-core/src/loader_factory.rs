use std::sync::Arc;

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::{GeneratorConfig, GeneratorLoader, Loader, Result, StyleDefinition, StyleModel};

/// Which kind of model serves the styles in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Runs the CycleGAN generator with the style's weights.
    #[default]
    Generator,
    /// Returns the input untouched. No weight files are read.
    Passthrough,
}

serde_plain::derive_display_from_serialize!(ModelBackend);
serde_plain::derive_fromstr_from_deserialize!(ModelBackend);

impl ModelBackend {
    pub fn loader(self, config: GeneratorConfig) -> Arc<dyn Loader> {
        match self {
            ModelBackend::Generator => Arc::new(GeneratorLoader::new(config)),
            ModelBackend::Passthrough => Arc::new(PassthroughLoader),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughModel;

impl StyleModel for PassthroughModel {
    fn stylize(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughLoader;

impl Loader for PassthroughLoader {
    fn load(&self, style: &StyleDefinition, _device: &Device) -> Result<Arc<dyn StyleModel>> {
        tracing::debug!(style_id = %style.id, "using passthrough model");
        Ok(Arc::new(PassthroughModel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!("generator".parse::<ModelBackend>().unwrap(), ModelBackend::Generator);
        assert_eq!(
            "passthrough".parse::<ModelBackend>().unwrap(),
            ModelBackend::Passthrough
        );
        assert!("diffusion".parse::<ModelBackend>().is_err());
        assert_eq!(ModelBackend::Passthrough.to_string(), "passthrough");
    }

    #[test]
    fn passthrough_ignores_missing_weights() {
        let style = StyleDefinition::new("s1", "Monochrome", "", "does/not/exist.pth");
        let loader = ModelBackend::Passthrough.loader(GeneratorConfig::default());
        let model = loader.load(&style, &Device::Cpu).unwrap();

        let input = Tensor::new(&[[[0.25f32, -0.5]]], &Device::Cpu).unwrap();
        let output = model.stylize(&input).unwrap();
        assert_eq!(
            output.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![0.25, -0.5]
        );
    }
}
