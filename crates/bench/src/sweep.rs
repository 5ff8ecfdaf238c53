//! Running every configured variant over every configured shape.

use crate::config::SweepConfig;
use crate::context::BenchContext;
use crate::kernels::Variant;
use crate::report::BenchRecord;
use crate::shape::WorkloadShape;

/// Variant/shape pairs a sweep will measure, in execution order. Paged
/// variants are skipped for shapes without a `block_size`.
pub fn plan(sweep: &SweepConfig) -> Vec<(Variant, WorkloadShape)> {
    let mut entries = Vec::new();
    for shape in &sweep.shapes {
        for &variant in &sweep.variants {
            if variant.requires_block_size() && shape.block_size.is_none() {
                log::debug!("skipping {variant} for {shape}: no block_size");
                continue;
            }
            entries.push((variant, *shape));
        }
    }
    entries
}

/// Measure every planned entry. Failures become records with a `-1`
/// latency; `on_record` sees each record as soon as it is produced.
pub fn run_sweep<F>(ctx: &BenchContext, sweep: &SweepConfig, mut on_record: F) -> Vec<BenchRecord>
where
    F: FnMut(&BenchRecord),
{
    let entries = plan(sweep);
    log::info!("running {} benchmarks", entries.len());

    let mut records = Vec::with_capacity(entries.len());
    for (variant, shape) in entries {
        let record = match variant.measure(ctx, &shape) {
            Ok(latency) => {
                log::info!("{variant} {shape}: {latency:.4} ms");
                BenchRecord::success(variant, shape, latency)
            }
            Err(err) => {
                log::warn!("{variant} {shape} failed: {err}");
                BenchRecord::failure(variant, shape, err)
            }
        };
        on_record(&record);
        records.push(record);
    }
    records
}
