//! Core traits and types shared across attention implementations.
//!
//! Kernels operate on tensors in `NHD` order: queries are shaped
//! `[q_len, num_qo_heads, head_dim]` and keys/values
//! `[kv_len, num_kv_heads, head_dim]`. Query heads are split into groups that
//! share one key/value head (grouped-query attention). Reductions accumulate in
//! `f32` regardless of the incoming dtype (`bf16`, `f16`, or `f32`) and the
//! output mirrors the query dtype and shape.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::{Config, HeadConfig, TensorLayout};
pub use errors::AttentionError;

/// Unified interface for single-sequence attention kernels.
///
/// * `q` is `[q_len, num_qo_heads, head_dim]`.
/// * `k` and `v` are `[kv_len, num_kv_heads, head_dim]`.
/// * `num_qo_heads` must be a multiple of `num_kv_heads`.
/// * The returned tensor mirrors the layout and dtype of `q`.
pub trait Attention {
    /// Compute attention for one sequence.
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        config: &Config,
    ) -> Result<Tensor, AttentionError>;
}
