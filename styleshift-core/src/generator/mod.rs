//! CycleGAN-style generator: a 7×7 stem, a stack of residual blocks at constant
//! width, and a 7×7 head squashed through `tanh`.
//!
//! Parameter names mirror the `nn.Sequential` layout used to train the
//! published checkpoints, so a state dict loads without renaming:
//!
//! ```text
//! model.0            stem conv            (features, in, 7, 7)
//! model.1 / model.2  instance norm, relu  (no parameters)
//! model.{3+i}.block.0 / .block.3          (features, features, 3, 3)
//! model.{3+n}        head conv            (out, features, 7, 7)
//! ```

use candle_core::{Tensor, D};
use candle_nn::{conv2d_no_bias, Conv2d, Conv2dConfig, Module, VarBuilder};

use crate::{Result, StyleModel};

mod weights;

pub use weights::{read_weights, validate_weights, GeneratorLoader};

const INSTANCE_NORM_EPS: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub features: usize,
    pub residual_blocks: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            out_channels: 3,
            features: 64,
            residual_blocks: 9,
        }
    }
}

impl GeneratorConfig {
    pub fn with_residual_blocks(self, residual_blocks: usize) -> Self {
        Self {
            residual_blocks,
            ..self
        }
    }

    fn head_index(&self) -> usize {
        3 + self.residual_blocks
    }
}

/// Instance normalization without affine parameters: each channel of each
/// sample is shifted to zero mean and scaled to unit (biased) variance over
/// its spatial extent.
pub fn instance_norm(xs: &Tensor) -> candle_core::Result<Tensor> {
    let (b, c, h, w) = xs.dims4()?;
    let flat = xs.reshape((b, c, h * w))?;
    let mean = flat.mean_keepdim(D::Minus1)?;
    let centered = flat.broadcast_sub(&mean)?;
    let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
    let std = (var + INSTANCE_NORM_EPS)?.sqrt()?;
    centered.broadcast_div(&std)?.reshape((b, c, h, w))
}

#[derive(Debug, Clone)]
pub struct ResidualBlock {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl ResidualBlock {
    pub fn new(features: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let vb = vb.pp("block");
        let conv1 = conv2d_no_bias(features, features, 3, cfg, vb.pp(0))?;
        let conv2 = conv2d_no_bias(features, features, 3, cfg, vb.pp(3))?;
        Ok(Self { conv1, conv2 })
    }
}

impl Module for ResidualBlock {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = instance_norm(&self.conv1.forward(xs)?)?.relu()?;
        let ys = instance_norm(&self.conv2.forward(&ys)?)?;
        xs + ys
    }
}

#[derive(Debug, Clone)]
pub struct Generator {
    stem: Conv2d,
    blocks: Vec<ResidualBlock>,
    head: Conv2d,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            padding: 3,
            ..Default::default()
        };
        let vb = vb.pp("model");
        let stem = conv2d_no_bias(config.in_channels, config.features, 7, cfg, vb.pp(0))?;
        let blocks = (0..config.residual_blocks)
            .map(|i| ResidualBlock::new(config.features, vb.pp(3 + i)))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let head = conv2d_no_bias(
            config.features,
            config.out_channels,
            7,
            cfg,
            vb.pp(config.head_index()),
        )?;
        Ok(Self {
            stem,
            blocks,
            head,
            config,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Every parameter the network reads, with its shape, in layer order.
    pub fn expected_shapes(config: &GeneratorConfig) -> Vec<(String, Vec<usize>)> {
        let (f, k) = (config.features, 3);
        let mut shapes = Vec::with_capacity(2 + 2 * config.residual_blocks);
        shapes.push((
            "model.0.weight".to_string(),
            vec![f, config.in_channels, 7, 7],
        ));
        for i in 0..config.residual_blocks {
            for conv in [0, 3] {
                shapes.push((format!("model.{}.block.{conv}.weight", 3 + i), vec![f, f, k, k]));
            }
        }
        shapes.push((
            format!("model.{}.weight", config.head_index()),
            vec![config.out_channels, f, 7, 7],
        ));
        shapes
    }
}

impl Module for Generator {
    /// Accepts `(batch, channels, height, width)` or a single `(channels, height, width)`
    /// image and returns a tensor of the same rank and spatial size.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let single = xs.rank() == 3;
        let xs = if single { xs.unsqueeze(0)? } else { xs.clone() };

        let mut ys = instance_norm(&self.stem.forward(&xs)?)?.relu()?;
        for block in &self.blocks {
            ys = block.forward(&ys)?;
        }
        let ys = self.head.forward(&ys)?.tanh()?;

        if single {
            ys.squeeze(0)
        } else {
            Ok(ys)
        }
    }
}

impl StyleModel for Generator {
    fn stylize(&self, input: &Tensor) -> Result<Tensor> {
        Ok(self.forward(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn tiny_config() -> GeneratorConfig {
        GeneratorConfig {
            features: 8,
            residual_blocks: 2,
            ..Default::default()
        }
    }

    #[test]
    fn expected_shapes_follow_sequential_layout() {
        let shapes = Generator::expected_shapes(&GeneratorConfig::default());
        assert_eq!(shapes.len(), 20);
        assert_eq!(shapes[0], ("model.0.weight".to_string(), vec![64, 3, 7, 7]));
        assert_eq!(
            shapes[1],
            ("model.3.block.0.weight".to_string(), vec![64, 64, 3, 3])
        );
        assert_eq!(
            shapes[18],
            ("model.11.block.3.weight".to_string(), vec![64, 64, 3, 3])
        );
        assert_eq!(shapes[19], ("model.12.weight".to_string(), vec![3, 64, 7, 7]));
    }

    #[test]
    fn generator_registers_exactly_the_expected_parameters() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        Generator::new(tiny_config(), vb).unwrap();

        let vars = varmap.data().lock().unwrap();
        let expected = Generator::expected_shapes(&tiny_config());
        assert_eq!(vars.len(), expected.len());
        for (name, shape) in expected {
            let var = vars.get(&name).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(var.dims(), shape.as_slice(), "{name}");
        }
    }

    #[test]
    fn forward_preserves_spatial_dims_and_bounds() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let generator = Generator::new(tiny_config(), vb).unwrap();

        let input = Tensor::randn(0f32, 1., (3, 13, 10), &device).unwrap();
        let output = generator.forward(&input).unwrap();
        assert_eq!(output.dims(), &[3, 13, 10]);

        let values = output.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));

        let batch = Tensor::randn(0f32, 1., (2, 3, 8, 9), &device).unwrap();
        assert_eq!(generator.forward(&batch).unwrap().dims(), &[2, 3, 8, 9]);
    }

    #[test]
    fn residual_block_with_zero_weights_is_identity() {
        let device = Device::Cpu;
        let block = ResidualBlock::new(4, VarBuilder::zeros(DType::F32, &device)).unwrap();
        let input = Tensor::randn(0f32, 1., (1, 4, 5, 5), &device).unwrap();
        let output = block.forward(&input).unwrap();

        let diff = (output - &input)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn instance_norm_centers_each_channel() {
        let device = Device::Cpu;
        let xs = Tensor::randn(3f32, 2., (2, 3, 6, 7), &device).unwrap();
        let ys = instance_norm(&xs).unwrap().reshape((6, 42)).unwrap();

        let means = ys.mean_keepdim(1).unwrap().flatten_all().unwrap();
        for mean in means.to_vec1::<f32>().unwrap() {
            assert!(mean.abs() < 1e-4, "mean {mean}");
        }
        let vars = ys.sqr().unwrap().mean_keepdim(1).unwrap().flatten_all().unwrap();
        for var in vars.to_vec1::<f32>().unwrap() {
            assert!((var - 1.0).abs() < 1e-3, "var {var}");
        }
    }
}
