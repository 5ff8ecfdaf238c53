//! Configuration options shared by all attention implementations.
//!
//! The [`Config`] struct captures per-call knobs that callers can tune without
//! swapping kernels, and [`TensorLayout`] names the axis order of the query,
//! key and value tensors handed to the wrappers.

use std::fmt;
use std::str::FromStr;

use super::AttentionError;

/// Options applied to a single forward call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Apply a causal mask aligned to the bottom-right corner of the score
    /// matrix, so the last query always sees every key.
    pub causal: bool,
    /// Softmax scale. When `None`, `1 / sqrt(head_dim)` is used.
    pub sm_scale: Option<f32>,
}

impl Config {
    /// Default options with causal masking enabled.
    pub fn causal() -> Self {
        Self {
            causal: true,
            ..Self::default()
        }
    }

    pub(crate) fn scale_for(&self, head_dim: usize) -> f32 {
        self.sm_scale
            .unwrap_or_else(|| 1.0 / (head_dim as f32).sqrt())
    }
}

/// Axis order of ragged query/key/value tensors.
///
/// `NHD` stores `[tokens, heads, head_dim]`; `HND` stores
/// `[heads, tokens, head_dim]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    Nhd,
    Hnd,
}

impl TensorLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            TensorLayout::Nhd => "NHD",
            TensorLayout::Hnd => "HND",
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TensorLayout {
    type Err = AttentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NHD" => Ok(TensorLayout::Nhd),
            "HND" => Ok(TensorLayout::Hnd),
            other => Err(AttentionError::Unsupported {
                feature: format!("tensor layout '{other}'"),
            }),
        }
    }
}

/// Head geometry bound to a wrapper plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadConfig {
    pub num_qo_heads: usize,
    pub num_kv_heads: usize,
    pub head_dim: usize,
}

impl HeadConfig {
    pub fn new(num_qo_heads: usize, num_kv_heads: usize, head_dim: usize) -> Self {
        Self {
            num_qo_heads,
            num_kv_heads,
            head_dim,
        }
    }

    /// Ensure the head counts describe a valid grouped-query ratio.
    pub fn validate(&self) -> Result<(), AttentionError> {
        if self.num_qo_heads == 0 || self.num_kv_heads == 0 || self.head_dim == 0 {
            return Err(AttentionError::shape(format!(
                "head configuration must be positive, got {self:?}"
            )));
        }
        if self.num_qo_heads % self.num_kv_heads != 0 {
            return Err(AttentionError::shape(format!(
                "num_qo_heads {} must be a multiple of num_kv_heads {}",
                self.num_qo_heads, self.num_kv_heads
            )));
        }
        Ok(())
    }

    /// Number of query heads sharing one key/value head.
    pub fn group_size(&self) -> usize {
        self.num_qo_heads / self.num_kv_heads
    }
}
