use std::sync::Arc;

use candle_core::Device;

use crate::{Result, StyleDefinition, StyleModel};

/// Produces a ready-to-run model for a style. Loads are synchronous and may do
/// heavy file I/O, so callers run them off the async executor.
pub trait Loader: Send + Sync {
    fn load(&self, style: &StyleDefinition, device: &Device) -> Result<Arc<dyn StyleModel>>;
}
