//! Device discovery for benchmark runs.

use std::fmt;
use std::str::FromStr;

use candle_core::Device;
use serde::Deserialize;

use crate::errors::Result;

/// Which device the benchmarks run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DeviceSelection {
    /// Prefer an accelerator compiled into the build, otherwise the CPU.
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl FromStr for DeviceSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        let (kind, ordinal) = match value.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal = ordinal
                    .parse::<usize>()
                    .map_err(|_| format!("invalid device ordinal in '{s}'"))?;
                (kind.to_string(), Some(ordinal))
            }
            None => (value, None),
        };
        match (kind.as_str(), ordinal) {
            ("auto", None) => Ok(DeviceSelection::Auto),
            ("cpu", None) => Ok(DeviceSelection::Cpu),
            ("cuda" | "gpu", ord) => Ok(DeviceSelection::Cuda(ord.unwrap_or(0))),
            ("metal", ord) => Ok(DeviceSelection::Metal(ord.unwrap_or(0))),
            _ => Err(format!(
                "unknown device '{s}' (expected auto, cpu, cuda[:N] or metal[:N])"
            )),
        }
    }
}

impl TryFrom<String> for DeviceSelection {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::Auto => f.write_str("auto"),
            DeviceSelection::Cpu => f.write_str("cpu"),
            DeviceSelection::Cuda(ord) => write!(f, "cuda:{ord}"),
            DeviceSelection::Metal(ord) => write!(f, "metal:{ord}"),
        }
    }
}

/// Open the selected device.
///
/// `CANDLE_FORCE_CPU` overrides the selection. `Auto` tries Metal (when
/// built with the `metal` feature), then CUDA, then falls back to the CPU.
pub fn setup_device(selection: DeviceSelection) -> Result<Device> {
    if std::env::var("CANDLE_FORCE_CPU").is_ok() {
        log::info!("CANDLE_FORCE_CPU set, using CPU backend");
        return Ok(Device::Cpu);
    }

    let device = match selection {
        DeviceSelection::Cpu => Device::Cpu,
        DeviceSelection::Cuda(ordinal) => Device::new_cuda(ordinal)?,
        DeviceSelection::Metal(ordinal) => Device::new_metal(ordinal)?,
        DeviceSelection::Auto => auto_device(),
    };
    log::info!("benchmark device: {:?}", device.location());
    Ok(device)
}

fn auto_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => return device,
            Err(err) => log::info!("Metal unavailable ({err}), falling back"),
        }
    }

    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => device,
        Ok(_) => {
            log::info!("CUDA unavailable, using CPU backend");
            Device::Cpu
        }
        Err(err) => {
            log::info!("CUDA initialisation failed ({err}), using CPU backend");
            Device::Cpu
        }
    }
}
