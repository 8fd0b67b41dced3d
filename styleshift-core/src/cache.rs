use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use candle_core::Device;
use once_cell::sync::OnceCell;

use crate::{Loader, Result, StyleDefinition, StyleModel};

type Slot = Arc<OnceCell<Arc<dyn StyleModel>>>;

/// Read-through model cache keyed by style id.
///
/// Concurrent requests for the same style wait on a single load instead of
/// reading the weight file once each. A failed load leaves the slot empty so
/// the next request retries. With caching disabled every call goes straight
/// to the loader.
pub struct ModelCache {
    loader: Arc<dyn Loader>,
    device: Device,
    enabled: bool,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn Loader>, device: Device) -> Self {
        Self {
            loader,
            device,
            enabled: true,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Reload weights on every call.
    pub fn uncached(loader: Arc<dyn Loader>, device: Device) -> Self {
        Self {
            enabled: false,
            ..Self::new(loader, device)
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, style: &StyleDefinition) -> Result<Arc<dyn StyleModel>> {
        if !self.enabled {
            return self.load(style);
        }

        // Hold the map lock only long enough to find the slot; the load itself
        // blocks on the slot so other styles stay available.
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(style.id.clone())
            .or_default()
            .clone();

        slot.get_or_try_init(|| self.load(style)).cloned()
    }

    /// Number of styles with a loaded model.
    pub fn loaded(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    fn load(&self, style: &StyleDefinition) -> Result<Arc<dyn StyleModel>> {
        let start = Instant::now();
        let model = self.loader.load(style, &self.device).inspect_err(|e| {
            tracing::warn!(style_id = %style.id, error = %e, "model load failed");
        })?;
        tracing::info!(
            style_id = %style.id,
            cached = self.enabled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded style model"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PassthroughModel, StyleError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Loader for CountingLoader {
        fn load(&self, style: &StyleDefinition, _device: &Device) -> Result<Arc<dyn StyleModel>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            if self.fail {
                return Err(StyleError::model_load(&style.weights, "boom"));
            }
            Ok(Arc::new(PassthroughModel))
        }
    }

    fn style(id: &str) -> StyleDefinition {
        StyleDefinition::new(id, id, "", format!("{id}.pth"))
    }

    #[test]
    fn concurrent_requests_share_one_load() {
        let loader = Arc::new(CountingLoader::default());
        let cache = Arc::new(ModelCache::new(loader.clone(), Device::Cpu));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get(&style("s1")).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loaded(), 1);

        cache.get(&style("s2")).unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.loaded(), 2);
    }

    #[test]
    fn failed_loads_are_retried() {
        let loader = Arc::new(CountingLoader {
            fail: true,
            ..Default::default()
        });
        let cache = ModelCache::new(loader.clone(), Device::Cpu);

        assert!(cache.get(&style("s1")).is_err());
        assert!(cache.get(&style("s1")).is_err());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.loaded(), 0);
    }

    #[test]
    fn uncached_reloads_every_time() {
        let loader = Arc::new(CountingLoader::default());
        let cache = ModelCache::uncached(loader.clone(), Device::Cpu);
        assert!(!cache.is_enabled());

        for _ in 0..3 {
            cache.get(&style("s1")).unwrap();
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.loaded(), 0);
    }
}
