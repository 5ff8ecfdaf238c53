//! Latency benchmarks for the six attention call patterns.
//!
//! Every benchmark follows the same pipeline: check preconditions, build
//! random inputs (plus index arrays and a bound wrapper session for the
//! ragged and paged patterns), warm up, launch the big kernel, time the
//! active steps between two events, synchronize and divide.
//!
//! Each pattern comes in two forms. `measure_*` returns a
//! [`Result`](crate::errors::Result); `*_latency` returns the mean latency or
//! [`FAILED_LATENCY`] after printing the failure.

mod decode;
mod prefill;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::BenchContext;
use crate::errors::{ensure, Result};
use crate::shape::WorkloadShape;
use crate::timer::calc_latency;

pub use decode::{
    decode_latency, decode_paged_latency, decode_single_latency, measure_decode,
    measure_decode_paged, measure_decode_single,
};
pub use prefill::{
    measure_prefill, measure_prefill_paged, measure_prefill_ragged, prefill_latency,
    prefill_paged_latency, prefill_ragged_latency,
};

/// Returned by the `*_latency` functions when a benchmark fails.
pub const FAILED_LATENCY: f64 = -1.0;

/// Page size the paged kernels are built for.
pub const SUPPORTED_BLOCK_SIZE: usize = 16;

/// One attention call pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Prefill,
    PrefillRagged,
    PrefillPaged,
    Decode,
    DecodePaged,
    DecodeSingle,
}

impl Variant {
    pub const ALL: [Variant; 6] = [
        Variant::Prefill,
        Variant::PrefillRagged,
        Variant::PrefillPaged,
        Variant::Decode,
        Variant::DecodePaged,
        Variant::DecodeSingle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Prefill => "prefill",
            Variant::PrefillRagged => "prefill_ragged",
            Variant::PrefillPaged => "prefill_paged",
            Variant::Decode => "decode",
            Variant::DecodePaged => "decode_paged",
            Variant::DecodeSingle => "decode_single",
        }
    }

    /// Paged variants read `block_size` from the shape.
    pub fn requires_block_size(&self) -> bool {
        matches!(self, Variant::PrefillPaged | Variant::DecodePaged)
    }

    pub fn measure(&self, ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
        match self {
            Variant::Prefill => measure_prefill(ctx, shape),
            Variant::PrefillRagged => measure_prefill_ragged(ctx, shape),
            Variant::PrefillPaged => measure_prefill_paged(ctx, shape),
            Variant::Decode => measure_decode(ctx, shape),
            Variant::DecodePaged => measure_decode_paged(ctx, shape),
            Variant::DecodeSingle => measure_decode_single(ctx, shape),
        }
    }

    /// [`Variant::measure`] with failures collapsed to [`FAILED_LATENCY`].
    pub fn latency(&self, ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
        or_sentinel(*self, self.measure(ctx, shape))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Variant::ALL
            .into_iter()
            .find(|variant| variant.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Variant::ALL.iter().map(|v| v.as_str()).collect();
                format!("unknown variant '{s}' (expected one of {})", names.join(", "))
            })
    }
}

/// Print a failed measurement and replace it with the sentinel.
pub(crate) fn or_sentinel(variant: Variant, result: Result<f64>) -> f64 {
    match result {
        Ok(latency) => latency,
        Err(err) => {
            eprintln!("{variant} benchmark failed: {err}");
            log::warn!("{variant} benchmark failed: {err:?}");
            FAILED_LATENCY
        }
    }
}

/// The paged kernels only support 16-token pages.
pub(crate) fn require_supported_block(block_size: usize) -> Result<()> {
    ensure(block_size == SUPPORTED_BLOCK_SIZE, || {
        format!("block_size must be {SUPPORTED_BLOCK_SIZE}, got {block_size}")
    })
}

/// Warm up, then time `ctx.active_steps()` back-to-back calls of `step`.
pub(crate) fn time_kernel<F>(ctx: &BenchContext, mut step: F) -> Result<f64>
where
    F: FnMut() -> Result<()>,
{
    for _ in 0..ctx.warmup_steps() {
        step()?;
    }

    ctx.launch_big_kernel()?;
    let mut timer = ctx.timer();
    timer.record_start()?;
    for _ in 0..ctx.active_steps() {
        step()?;
    }
    timer.record_stop()?;
    ctx.synchronize()?;

    calc_latency(&timer, ctx.active_steps())
}
