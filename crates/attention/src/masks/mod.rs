//! Mask utilities shared by attention implementations.
//!
//! Masks produced here are additive `f32` tensors shaped `[q_len, k_len]` and
//! broadcast across heads by the kernels. Values are either `0.0` (keep) or
//! `f32::NEG_INFINITY` (discard) to align with Candle's softmax-friendly
//! masking behaviour.

pub mod causal;

use candle_core::DType;

/// Dtype shared by all additive masks.
pub const MASK_DTYPE: DType = DType::F32;

pub use causal::build_causal_mask;

#[cfg(test)]
mod tests;
