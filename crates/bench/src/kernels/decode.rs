use attention::{
    batch_decode_with_padded_kv_cache, single_decode_with_kv_cache,
    BatchDecodeWithPagedKvCacheWrapper, PagedKvIndices, TensorLayout, WorkspaceBuffer,
    DECODE_WORKSPACE_BYTES,
};

use crate::context::BenchContext;
use crate::errors::{ensure, Result};
use crate::kernels::prefill::head_config;
use crate::kernels::{or_sentinel, require_supported_block, time_kernel, Variant};
use crate::layout::UniformPagedLayout;
use crate::shape::WorkloadShape;

/// One decode step for `bs` requests, each attending over a padded cache of
/// `cl` tokens.
pub fn measure_decode(ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
    shape.validate()?;

    let q = ctx.randn(&[shape.batch_size, shape.num_heads, shape.head_dim])?;
    let kv_shape = [
        shape.batch_size,
        shape.context_length,
        shape.num_kv_heads,
        shape.head_dim,
    ];
    let k = ctx.randn(&kv_shape)?;
    let v = ctx.randn(&kv_shape)?;

    time_kernel(ctx, || {
        batch_decode_with_padded_kv_cache(&q, &k, &v)?;
        Ok(())
    })
}

/// One decode step for `bs` requests over a paged cache. The last page of
/// each request may be partially filled.
pub fn measure_decode_paged(ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
    shape.validate()?;
    let block_size = shape.require_block_size()?;
    require_supported_block(block_size)?;

    let pages = UniformPagedLayout::new(shape.batch_size, shape.context_length, block_size)?;
    let q = ctx.randn(&[shape.batch_size, shape.num_heads, shape.head_dim])?;
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

    let workspace = WorkspaceBuffer::new(DECODE_WORKSPACE_BYTES, ctx.device())?;
    let layout: TensorLayout = "NHD".parse()?;
    let mut wrapper = BatchDecodeWithPagedKvCacheWrapper::new(workspace, layout)?;
    let session = wrapper.begin_forward(
        PagedKvIndices {
            indptr: &kv_indptr,
            indices: &kv_indices,
            last_page_len: &kv_last_page_len,
        },
        head_config(shape),
        block_size,
    )?;

    time_kernel(ctx, || {
        session.forward(&q, &kv_data)?;
        Ok(())
    })
}

/// One decode step for a single request over a contiguous cache.
pub fn measure_decode_single(ctx: &BenchContext, shape: &WorkloadShape) -> Result<f64> {
    shape.validate()?;
    ensure(shape.batch_size == 1, || {
        format!("batch size must be 1 for single-request decode, got {}", shape.batch_size)
    })?;

    let q = ctx.randn(&[shape.num_heads, shape.head_dim])?;
    let k = ctx.randn(&[shape.context_length, shape.num_kv_heads, shape.head_dim])?;
    let v = ctx.randn(&[shape.context_length, shape.num_kv_heads, shape.head_dim])?;

    time_kernel(ctx, || {
        single_decode_with_kv_cache(&q, &k, &v)?;
        Ok(())
    })
}

pub fn decode_latency(ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
    or_sentinel(Variant::Decode, measure_decode(ctx, shape))
}

pub fn decode_paged_latency(ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
    or_sentinel(Variant::DecodePaged, measure_decode_paged(ctx, shape))
}

pub fn decode_single_latency(ctx: &BenchContext, shape: &WorkloadShape) -> f64 {
    or_sentinel(Variant::DecodeSingle, measure_decode_single(ctx, shape))
}
