pub mod cache;
pub mod catalog;
pub mod codec;
pub mod device_map;
pub mod error;
pub mod generator;
pub mod loader;
mod loader_factory;
pub mod pipeline;
mod util;

#[cfg(feature = "accelerate")]
extern crate accelerate_src;
#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

pub use cache::ModelCache;
pub use catalog::{StyleCatalog, StyleDefinition};
pub use device_map::*;
pub use error::{Result, StyleError};
pub use generator::{Generator, GeneratorConfig, GeneratorLoader};
pub use loader::*;
pub use loader_factory::*;
pub use pipeline::{PipelineDirs, StylePipeline, TransferJob, TransferRequest};
pub use util::select_best_device;

use candle_core::Tensor;

/// Maps a normalized `(3, H, W)` image tensor to a stylized tensor of the same
/// shape.
pub trait StyleModel: Send + Sync {
    fn stylize(&self, input: &Tensor) -> Result<Tensor>;
}
