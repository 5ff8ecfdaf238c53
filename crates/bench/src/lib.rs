//! Latency microbenchmarks for attention kernels.
//!
//! Six call patterns are covered: contiguous, ragged and paged prefill, and
//! padded, paged and single-request decode. Each benchmark builds random
//! inputs for a [`WorkloadShape`], warms the kernel up, times a fixed number
//! of steps between two events and reports the mean milliseconds per step.
//!
//! ```no_run
//! use attn_bench::{prefill_latency, BenchConfig, BenchContext, WorkloadShape};
//!
//! let ctx = BenchContext::from_config(&BenchConfig::default()).unwrap();
//! let latency = prefill_latency(&ctx, &WorkloadShape::new(1, 128, 8, 8, 64));
//! assert!(latency >= 0.0);
//! ```

pub mod config;
pub mod context;
pub mod device;
pub mod errors;
pub mod kernels;
pub mod layout;
pub mod report;
pub mod shape;
pub mod sweep;
pub mod timer;

pub use config::{BenchConfig, CliOverrides, Precision, ShapeOverrides, SweepConfig, SweepFile};
pub use context::BenchContext;
pub use device::{setup_device, DeviceSelection};
pub use errors::{BenchmarkError, Result};
pub use kernels::{
    decode_latency, decode_paged_latency, decode_single_latency, measure_decode,
    measure_decode_paged, measure_decode_single, measure_prefill, measure_prefill_paged,
    measure_prefill_ragged, prefill_latency, prefill_paged_latency, prefill_ragged_latency,
    Variant, FAILED_LATENCY,
};
pub use report::{BenchRecord, OutputFormat};
pub use shape::WorkloadShape;
pub use sweep::run_sweep;
pub use timer::{calc_latency, EventTimer};
