//! Read-only state shared by every benchmark in a run.

use candle_core::{DType, Device, Tensor};

use crate::config::BenchConfig;
use crate::device::setup_device;
use crate::errors::Result;
use crate::timer::EventTimer;

/// Side of the square matmul issued by [`BenchContext::launch_big_kernel`].
const BIG_KERNEL_DIM_ACCELERATOR: usize = 4096;
const BIG_KERNEL_DIM_CPU: usize = 256;

/// Device, element type and iteration counts for a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchContext {
    device: Device,
    dtype: DType,
    warmup_steps: usize,
    active_steps: usize,
}

impl BenchContext {
    pub fn new(device: Device, dtype: DType, warmup_steps: usize, active_steps: usize) -> Self {
        Self {
            device,
            dtype,
            warmup_steps,
            active_steps,
        }
    }

    /// Open the configured device and capture the run settings.
    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        config.validate()?;
        let device = setup_device(config.device)?;
        log::info!(
            "benchmark context: device={:?} dtype={:?} warmup={} active={}",
            device,
            config.precision.dtype(),
            config.warmup_steps,
            config.active_steps
        );
        Ok(Self::new(
            device,
            config.precision.dtype(),
            config.warmup_steps,
            config.active_steps,
        ))
    }

    /// Same device and dtype with different iteration counts.
    pub fn with_steps(&self, warmup_steps: usize, active_steps: usize) -> Self {
        Self {
            warmup_steps,
            active_steps,
            ..self.clone()
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    pub fn active_steps(&self) -> usize {
        self.active_steps
    }

    /// A fresh start/stop event pair on this context's device.
    pub fn timer(&self) -> EventTimer {
        EventTimer::new(&self.device)
    }

    /// Standard-normal tensor of the given shape in the context dtype.
    pub fn randn(&self, shape: &[usize]) -> Result<Tensor> {
        let t = Tensor::randn(0f32, 1f32, shape, &self.device)?;
        Ok(t.to_dtype(self.dtype)?)
    }

    /// Index array uploaded to the device.
    pub fn index_tensor(&self, values: &[u32]) -> Result<Tensor> {
        Ok(Tensor::new(values, &self.device)?)
    }

    /// Enqueue a large matmul without waiting for it. Occupies the device
    /// ahead of the timed window.
    pub fn launch_big_kernel(&self) -> Result<()> {
        let dim = if self.device.is_cpu() {
            BIG_KERNEL_DIM_CPU
        } else {
            BIG_KERNEL_DIM_ACCELERATOR
        };
        let a = Tensor::ones((dim, dim), self.dtype, &self.device)?;
        let _ = a.matmul(&a)?;
        Ok(())
    }

    pub fn synchronize(&self) -> Result<()> {
        Ok(self.device.synchronize()?)
    }
}
