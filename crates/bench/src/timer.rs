//! Start/stop timing events.
//!
//! candle exposes no device event objects, so an event is recorded by
//! draining the device queue and reading the host clock. Work enqueued
//! between the two events is therefore fully accounted for.

use std::time::Instant;

use candle_core::Device;

use crate::errors::{BenchmarkError, Result};

/// A start/stop event pair owned by a single benchmark call.
#[derive(Debug)]
pub struct EventTimer {
    device: Device,
    start: Option<Instant>,
    stop: Option<Instant>,
}

impl EventTimer {
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
            start: None,
            stop: None,
        }
    }

    /// Record the start event. Clears a previously recorded stop event.
    pub fn record_start(&mut self) -> Result<()> {
        self.device.synchronize()?;
        self.start = Some(Instant::now());
        self.stop = None;
        Ok(())
    }

    pub fn record_stop(&mut self) -> Result<()> {
        if self.start.is_none() {
            return Err(BenchmarkError::Timer(
                "stop event recorded before start event".to_string(),
            ));
        }
        self.device.synchronize()?;
        self.stop = Some(Instant::now());
        Ok(())
    }

    /// Milliseconds between the start and stop events.
    pub fn elapsed_ms(&self) -> Result<f64> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Ok(stop.duration_since(start).as_secs_f64() * 1e3),
            (None, _) => Err(BenchmarkError::Timer("start event was never recorded".to_string())),
            (Some(_), None) => Err(BenchmarkError::Timer("stop event was never recorded".to_string())),
        }
    }
}

/// Mean milliseconds per step between the timer's events.
pub fn calc_latency(timer: &EventTimer, steps: usize) -> Result<f64> {
    if steps == 0 {
        return Err(BenchmarkError::Timer(
            "latency needs at least one timed step".to_string(),
        ));
    }
    Ok(timer.elapsed_ms()? / steps as f64)
}
