//! Workload shapes shared by every benchmark variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ensure, BenchmarkError, Result};

/// Dimensions of one benchmark invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadShape {
    pub batch_size: usize,
    pub context_length: usize,
    pub num_heads: usize,
    pub num_kv_heads: usize,
    pub head_dim: usize,
    /// Page size of the paged variants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<usize>,
}

impl WorkloadShape {
    pub fn new(
        batch_size: usize,
        context_length: usize,
        num_heads: usize,
        num_kv_heads: usize,
        head_dim: usize,
    ) -> Self {
        Self {
            batch_size,
            context_length,
            num_heads,
            num_kv_heads,
            head_dim,
            block_size: None,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// All dimensions must be positive.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("batch_size", self.batch_size),
            ("context_length", self.context_length),
            ("num_heads", self.num_heads),
            ("num_kv_heads", self.num_kv_heads),
            ("head_dim", self.head_dim),
        ];
        for (name, value) in dims {
            ensure(value > 0, || format!("{name} must be positive"))?;
        }
        if let Some(block) = self.block_size {
            ensure(block > 0, || "block_size must be positive".to_string())?;
        }
        Ok(())
    }

    /// Block size of a paged variant.
    pub fn require_block_size(&self) -> Result<usize> {
        self.block_size.ok_or_else(|| {
            BenchmarkError::Precondition("paged variants need a block_size".to_string())
        })
    }

    /// Tokens across the whole batch.
    pub fn total_tokens(&self) -> usize {
        self.batch_size * self.context_length
    }
}

impl fmt::Display for WorkloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bs={} cl={} heads={}/{} dim={}",
            self.batch_size, self.context_length, self.num_heads, self.num_kv_heads, self.head_dim
        )?;
        if let Some(block) = self.block_size {
            write!(f, " block={block}")?;
        }
        Ok(())
    }
}
