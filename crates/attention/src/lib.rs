//! Attention kernels for prefill and decode over contiguous, ragged and paged
//! key/value storage.
//!
//! Tensors use the `NHD` layout: tokens first, then heads, then the head
//! dimension. Query heads may outnumber key/value heads as long as they split
//! into equal groups (grouped-query attention). Inputs may be `bf16`, `f16` or
//! `f32`; reductions run in `f32` and outputs match the query dtype.
//!
//! Two API styles are offered:
//!
//! * single-call functions in [`ops`] that take whole tensors, and
//! * batch wrappers in [`wrappers`] that bind index metadata once through
//!   `begin_forward` and then serve any number of forward calls.
//!
//! All kernels are the portable reference implementation from [`reference`],
//! which runs on every candle device.

pub mod core;
pub mod kv_cache;
pub mod masks;
pub mod ops;
pub mod reference;
pub mod wrappers;

pub use crate::core::{Attention, AttentionError, Config, HeadConfig, TensorLayout};
pub use ops::{
    batch_decode_with_padded_kv_cache, single_decode_with_kv_cache, single_prefill_with_kv_cache,
};
pub use wrappers::{
    BatchDecodeWithPagedKvCacheWrapper, BatchPrefillWithPagedKvCacheWrapper,
    BatchPrefillWithRaggedKvCacheWrapper, PagedKvIndices, WorkspaceBuffer, DECODE_WORKSPACE_BYTES,
    PREFILL_WORKSPACE_BYTES,
};
