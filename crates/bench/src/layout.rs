//! Index arrays describing ragged and paged batches of uniform requests.
//!
//! Every request in a benchmark batch has the same length, so offsets grow by
//! a constant stride and every request owns the same number of pages.

use crate::errors::{BenchmarkError, Result};

/// `a * b` as a `u32` index entry.
fn index_entry(a: usize, b: usize, what: &str) -> Result<u32> {
    a.checked_mul(b)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            BenchmarkError::Precondition(format!("{what} {a} * {b} does not fit in a u32 index"))
        })
}

/// Offsets of `num_seqs` packed sequences of `seq_len` tokens:
/// `[0, seq_len, 2 * seq_len, ..., num_seqs * seq_len]`.
pub fn sequence_indptr(num_seqs: usize, seq_len: usize) -> Result<Vec<u32>> {
    (0..=num_seqs)
        .map(|i| index_entry(i, seq_len, "offset"))
        .collect()
}

/// Pages needed to hold `context_length` tokens.
pub fn pages_per_request(context_length: usize, block_size: usize) -> usize {
    context_length.div_ceil(block_size)
}

/// Tokens stored on the last page, always in `(0, block_size]`.
pub fn last_page_len(context_length: usize, block_size: usize) -> usize {
    (context_length - 1) % block_size + 1
}

/// Page table for `batch_size` requests of `context_length` tokens each,
/// with pages assigned consecutively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformPagedLayout {
    pub block_size: usize,
    pub pages_per_request: usize,
    pub indptr: Vec<u32>,
    pub indices: Vec<u32>,
    pub last_page_len: Vec<u32>,
}

impl UniformPagedLayout {
    pub fn new(batch_size: usize, context_length: usize, block_size: usize) -> Result<Self> {
        let pages = pages_per_request(context_length, block_size);
        let indptr = sequence_indptr(batch_size, pages)?;
        let total = index_entry(batch_size, pages, "page count")?;
        let last = index_entry(last_page_len(context_length, block_size), 1, "last page length")?;
        Ok(Self {
            block_size,
            pages_per_request: pages,
            indptr,
            indices: (0..total).collect(),
            last_page_len: vec![last; batch_size],
        })
    }

    /// Total pages across the batch; the first axis of the page storage.
    pub fn num_pages(&self) -> usize {
        self.indices.len()
    }
}
