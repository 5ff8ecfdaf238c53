use attention::{
    single_prefill_with_kv_cache, BatchPrefillWithPagedKvCacheWrapper,
    BatchPrefillWithRaggedKvCacheWrapper, Config, HeadConfig, PagedKvIndices, TensorLayout,
    WorkspaceBuffer, PREFILL_WORKSPACE_BYTES,
};

use crate::context::BenchContext;
use crate::errors::{ensure, Result};
use crate::kernels::{or_sentinel, require_supported_block, time_kernel, Variant};
use crate::layout::{sequence_indptr, UniformPagedLayout};
use crate::shape::WorkloadShape;

/// Contiguous prefill of a single request: `q`, `k` and `v` hold `cl` tokens.
pub fn measure_prefill(ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
    shape.validate()?;
    ensure(shape.batch_size == 1, || {
        format!("batch size must be 1 for contiguous prefill, got {}", shape.batch_size)
    })?;

    let cl = shape.context_length;
    let q = ctx.randn(&[cl, shape.num_heads, shape.head_dim])?;
    let k = ctx.randn(&[cl, shape.num_kv_heads, shape.head_dim])?;
    let v = ctx.randn(&[cl, shape.num_kv_heads, shape.head_dim])?;
    let config = Config::default();

    time_kernel(ctx, || {
        single_prefill_with_kv_cache(&q, &k, &v, &config)?;
        Ok(())
    })
}

/// Causal prefill over `bs` packed requests of `cl` tokens each.
pub fn measure_prefill_ragged(ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
    shape.validate()?;

    let offsets = sequence_indptr(shape.batch_size, shape.context_length)?;
    let tokens = shape.total_tokens();
    let q = ctx.randn(&[tokens, shape.num_heads, shape.head_dim])?;
    let k = ctx.randn(&[tokens, shape.num_kv_heads, shape.head_dim])?;
    let v = ctx.randn(&[tokens, shape.num_kv_heads, shape.head_dim])?;
    let qo_indptr = ctx.index_tensor(&offsets)?;
    let kv_indptr = ctx.index_tensor(&offsets)?;

    let workspace = WorkspaceBuffer::new(PREFILL_WORKSPACE_BYTES, ctx.device())?;
    let layout: TensorLayout = "NHD".parse()?;
    let mut wrapper = BatchPrefillWithRaggedKvCacheWrapper::new(workspace, layout)?;
    let session = wrapper.begin_forward(&qo_indptr, &kv_indptr, head_config(shape))?;
    let config = Config::causal();

    time_kernel(ctx, || {
        session.forward(&q, &k, &v, &config)?;
        Ok(())
    })
}

/// Causal prefill of `bs` requests whose keys and values live in 16-token
/// pages.
pub fn measure_prefill_paged(ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
    shape.validate()?;
    let block_size = shape.require_block_size()?;
    require_supported_block(block_size)?;
    ensure(shape.context_length % block_size == 0, || {
        format!(
            "context length {} must be divisible by block_size {block_size}",
            shape.context_length
        )
    })?;

    let pages = UniformPagedLayout::new(shape.batch_size, shape.context_length, block_size)?;
    let qo_indptr = ctx.index_tensor(&sequence_indptr(shape.batch_size, shape.context_length)?)?;
    let kv_indptr = ctx.index_tensor(&pages.indptr)?;
    let kv_indices = ctx.index_tensor(&pages.indices)?;
    let kv_last_page_len = ctx.index_tensor(&pages.last_page_len)?;
    let kv_data = ctx.randn(&[
        pages.num_pages(),
        2,
        block_size,
        shape.num_kv_heads,
        shape.head_dim,
    ])?;
    let q = ctx.randn(&[shape.total_tokens(), shape.num_heads, shape.head_dim])?;

    let workspace = WorkspaceBuffer::new(PREFILL_WORKSPACE_BYTES, ctx.device())?;
    let layout: TensorLayout = "NHD".parse()?;
    let mut wrapper = BatchPrefillWithPagedKvCacheWrapper::new(workspace, layout)?;
    let session = wrapper.begin_forward(
        &qo_indptr,
        PagedKvIndices {
            indptr: &kv_indptr,
            indices: &kv_indices,
            last_page_len: &kv_last_page_len,
        },
        head_config(shape),
        block_size,
    )?;
    let config = Config::causal();

    let latency = time_kernel(ctx, || {
        session.forward(&q, &kv_data, &config)?;
        Ok(())
    })?;
    session.end_forward();
    Ok(latency)
}

pub fn prefill_latency(ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
    or_sentinel(Variant::Prefill, measure_prefill(ctx, shape))
}

pub fn prefill_ragged_latency(ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
    or_sentinel(Variant::PrefillRagged, measure_prefill_ragged(ctx, shape))
}

pub fn prefill_paged_latency(ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
    or_sentinel(Variant::PrefillPaged, measure_prefill_paged(ctx, shape))
}

pub(super) fn head_config(shape: &WorkloadShape) -> HeadConfig {
    HeadConfig::new(shape.num_heads, shape.num_kv_heads, shape.head_dim)
}
