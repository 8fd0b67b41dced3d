use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use styleshift_core::{DeviceMap, GeneratorConfig, ModelBackend};

/// Command line arguments. Every flag can also be set through the
/// environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "StyleShift style transfer server")]
pub struct Args {
    /// Use CPU instead of GPU
    #[arg(long, env = "STYLESHIFT_CPU")]
    pub cpu: bool,

    /// Device to run on: `cpu`, `gpu` or `gpu:<ordinal>`
    #[arg(long, env = "STYLESHIFT_DEVICE", default_value = "gpu:0")]
    pub device: DeviceMap,

    /// Host address to bind the server to
    #[arg(long, env = "STYLESHIFT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the server to
    #[arg(long, env = "STYLESHIFT_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory holding `{product_id}.jpg` source images
    #[arg(long, env = "STYLESHIFT_PRODUCTS_DIR", default_value = "assets/products")]
    pub products_dir: PathBuf,

    /// Directory generated images are written to and served from
    #[arg(long, env = "STYLESHIFT_RESULTS_DIR", default_value = "results")]
    pub results_dir: PathBuf,

    /// Directory style weight paths are resolved against
    #[arg(long, env = "STYLESHIFT_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// JSON file of style definitions replacing the built-in catalog
    #[arg(long, env = "STYLESHIFT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Model backend: `generator` or `passthrough`
    #[arg(long, env = "STYLESHIFT_BACKEND", default_value = "generator")]
    pub backend: ModelBackend,

    /// Residual blocks in the generator
    #[arg(long, env = "STYLESHIFT_RESIDUAL_BLOCKS", default_value_t = 9)]
    pub residual_blocks: usize,

    /// Reload weights for every job instead of caching them per style
    #[arg(long, env = "STYLESHIFT_NO_MODEL_CACHE")]
    pub no_model_cache: bool,

    /// Background workers running transfers
    #[arg(long, env = "STYLESHIFT_WORKERS", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Jobs that may wait for a worker before requests are refused
    #[arg(long, env = "STYLESHIFT_QUEUE_CAPACITY", default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
    pub queue_capacity: u32,

    /// Discard a transfer that takes longer than this many seconds
    #[arg(long, env = "STYLESHIFT_JOB_TIMEOUT_SECS")]
    pub job_timeout_secs: Option<u64>,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, env = "STYLESHIFT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn device_map(&self) -> DeviceMap {
        if self.cpu {
            DeviceMap::ForceCpu
        } else {
            self.device
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::default().with_residual_blocks(self.residual_blocks)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
