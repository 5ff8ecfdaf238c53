//! Host-side descriptions of ragged and paged key/value layouts.
//!
//! Wrappers receive index arrays as device tensors and copy them into these
//! types once, during `begin_forward`. Every pointer array must start at `0`,
//! never decrease, and end at the total number of tokens (ragged) or pages
//! (paged) it indexes.

use candle_core::{DType, Tensor};

use crate::core::AttentionError;

fn host_indices(tensor: &Tensor, what: &str) -> Result<Vec<usize>, AttentionError> {
    if tensor.rank() != 1 {
        return Err(AttentionError::shape(format!(
            "{what} must be one-dimensional, got {:?}",
            tensor.dims()
        )));
    }
    if !matches!(tensor.dtype(), DType::U32 | DType::I64 | DType::U8) {
        return Err(AttentionError::UnsupportedDType {
            requested: format!("{what} expects an integer dtype, got {:?}", tensor.dtype()),
        });
    }
    let values = tensor.to_dtype(DType::U32)?.to_vec1::<u32>()?;
    Ok(values.into_iter().map(|v| v as usize).collect())
}

fn validate_indptr(indptr: &[usize], total: usize, what: &str) -> Result<(), AttentionError> {
    match indptr.first() {
        None => return Err(AttentionError::shape(format!("{what} must not be empty"))),
        Some(&first) if first != 0 => {
            return Err(AttentionError::shape(format!(
                "{what} must start at 0, got {first}"
            )))
        }
        _ => {}
    }
    if let Some(pos) = indptr.windows(2).position(|w| w[1] < w[0]) {
        return Err(AttentionError::shape(format!(
            "{what} decreases at entry {}: {} -> {}",
            pos + 1,
            indptr[pos],
            indptr[pos + 1]
        )));
    }
    let last = indptr[indptr.len() - 1];
    if last != total {
        return Err(AttentionError::shape(format!(
            "{what} ends at {last} but indexes {total} entries"
        )));
    }
    Ok(())
}

/// Offsets of variable-length sequences packed along the token axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaggedLayout {
    indptr: Vec<usize>,
}

impl RaggedLayout {
    /// Build a layout from an offset array of `num_requests + 1` entries.
    pub fn new(indptr: Vec<usize>) -> Result<Self, AttentionError> {
        let total = indptr.last().copied().unwrap_or(0);
        validate_indptr(&indptr, total, "indptr")?;
        Ok(Self { indptr })
    }

    pub fn from_tensor(indptr: &Tensor) -> Result<Self, AttentionError> {
        Self::new(host_indices(indptr, "indptr")?)
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn num_requests(&self) -> usize {
        self.indptr.len() - 1
    }

    /// Total number of packed tokens.
    pub fn total(&self) -> usize {
        self.indptr[self.indptr.len() - 1]
    }

    /// `(start, len)` of request `idx` along the packed axis.
    pub fn span(&self, idx: usize) -> (usize, usize) {
        let start = self.indptr[idx];
        (start, self.indptr[idx + 1] - start)
    }
}

/// Page table of a paged key/value cache.
///
/// Request `i` owns pages `indices[indptr[i]..indptr[i + 1]]`. Every page is
/// full except the last, which holds `last_page_len[i]` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedKvLayout {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    last_page_len: Vec<usize>,
    page_size: usize,
}

impl PagedKvLayout {
    pub fn new(
        indptr: Vec<usize>,
        indices: Vec<usize>,
        last_page_len: Vec<usize>,
        page_size: usize,
    ) -> Result<Self, AttentionError> {
        if page_size == 0 {
            return Err(AttentionError::shape("page_size must be greater than zero"));
        }
        validate_indptr(&indptr, indices.len(), "paged_kv_indptr")?;
        let requests = indptr.len() - 1;
        if last_page_len.len() != requests {
            return Err(AttentionError::shape(format!(
                "paged_kv_last_page_len has {} entries for {requests} requests",
                last_page_len.len()
            )));
        }
        for (req, window) in indptr.windows(2).enumerate() {
            if window[1] == window[0] {
                return Err(AttentionError::shape(format!(
                    "request {req} owns no pages"
                )));
            }
        }
        if let Some((req, len)) = last_page_len
            .iter()
            .enumerate()
            .find(|&(_, &len)| len == 0 || len > page_size)
        {
            return Err(AttentionError::shape(format!(
                "last page length {len} of request {req} outside (0, {page_size}]"
            )));
        }
        Ok(Self {
            indptr,
            indices,
            last_page_len,
            page_size,
        })
    }

    /// Copy the device-side page table to the host and validate it.
    pub fn from_tensors(
        indptr: &Tensor,
        indices: &Tensor,
        last_page_len: &Tensor,
        page_size: usize,
    ) -> Result<Self, AttentionError> {
        Self::new(
            host_indices(indptr, "paged_kv_indptr")?,
            host_indices(indices, "paged_kv_indices")?,
            host_indices(last_page_len, "paged_kv_last_page_len")?,
            page_size,
        )
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_requests(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn num_pages(&self) -> usize {
        self.indices.len()
    }

    /// Page ids owned by request `idx`, in sequence order.
    pub fn pages(&self, idx: usize) -> &[usize] {
        &self.indices[self.indptr[idx]..self.indptr[idx + 1]]
    }

    /// Number of cached tokens of request `idx`.
    pub fn seq_len(&self, idx: usize) -> usize {
        (self.pages(idx).len() - 1) * self.page_size + self.last_page_len[idx]
    }

    /// Largest page id referenced by the table.
    pub fn max_page_id(&self) -> Option<usize> {
        self.indices.iter().copied().max()
    }
}
