use std::{fmt, str::FromStr};

use thiserror::Error;

/// Which device the generator runs on. `Ordinal` falls back to the CPU when no
/// accelerator is compiled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceMap {
    ForceCpu,
    Ordinal(usize),
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self::Ordinal(0)
    }
}

#[derive(Debug, Error)]
#[error("invalid device `{0}`, expected `cpu`, `gpu` or `gpu:<ordinal>`")]
pub struct ParseDeviceMapError(String);

impl FromStr for DeviceMap {
    type Err = ParseDeviceMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::ForceCpu),
            "gpu" => Ok(Self::Ordinal(0)),
            other => other
                .strip_prefix("gpu:")
                .and_then(|ordinal| ordinal.parse().ok())
                .map(Self::Ordinal)
                .ok_or_else(|| ParseDeviceMapError(s.to_string())),
        }
    }
}

impl fmt::Display for DeviceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForceCpu => f.write_str("cpu"),
            Self::Ordinal(ordinal) => write!(f, "gpu:{ordinal}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpu_and_gpu_ordinals() {
        assert_eq!("cpu".parse::<DeviceMap>().unwrap(), DeviceMap::ForceCpu);
        assert_eq!("GPU".parse::<DeviceMap>().unwrap(), DeviceMap::Ordinal(0));
        assert_eq!("gpu:3".parse::<DeviceMap>().unwrap(), DeviceMap::Ordinal(3));
        assert!("tpu".parse::<DeviceMap>().is_err());
        assert!("gpu:x".parse::<DeviceMap>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for map in [DeviceMap::ForceCpu, DeviceMap::Ordinal(1)] {
            assert_eq!(map.to_string().parse::<DeviceMap>().unwrap(), map);
        }
    }
}
