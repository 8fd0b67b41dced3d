use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;

use crate::{DeviceMap, Result};

pub fn select_best_device(device_map: DeviceMap) -> Result<Device> {
    let device = match device_map {
        DeviceMap::ForceCpu => Device::Cpu,
        DeviceMap::Ordinal(ordinal) if cuda_is_available() => Device::new_cuda(ordinal)?,
        DeviceMap::Ordinal(ordinal) if metal_is_available() => Device::new_metal(ordinal)?,
        DeviceMap::Ordinal(_) => {
            #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
            {
                tracing::warn!("running on CPU, to run on GPU(metal) build with `--features metal`");
            }
            #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
            {
                tracing::warn!("running on CPU, to run on GPU build with `--features cuda`");
            }
            Device::Cpu
        }
    };
    tracing::debug!(requested = %device_map, ?device, "selected device");
    Ok(device)
}
