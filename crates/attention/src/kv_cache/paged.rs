//! Paged key/value storage.
//!
//! Pages live in a single tensor shaped
//! `[max_num_pages, 2, page_size, num_kv_heads, head_dim]`, where index `0` of
//! the second axis holds keys and index `1` holds values. A
//! [`PagedKvLayout`] maps each request onto an ordered list of page ids.

use candle_core::{Device, Tensor};

use crate::core::{AttentionError, HeadConfig};
use crate::kv_cache::PagedKvLayout;

/// Check that `kv_data` matches the page table and head geometry.
pub fn check_kv_data(
    kv_data: &Tensor,
    layout: &PagedKvLayout,
    heads: &HeadConfig,
) -> Result<(), AttentionError> {
    let dims = kv_data.dims();
    if dims.len() != 5 {
        return Err(AttentionError::shape(format!(
            "kv_data must have shape [pages, 2, page_size, kv_heads, head_dim], got {dims:?}"
        )));
    }
    let (pages, pair, page_size, kv_heads, head_dim) = (dims[0], dims[1], dims[2], dims[3], dims[4]);
    if pair != 2 || page_size != layout.page_size() {
        return Err(AttentionError::shape(format!(
            "kv_data expected [_, 2, {}, _, _], got {dims:?}",
            layout.page_size()
        )));
    }
    if kv_heads != heads.num_kv_heads || head_dim != heads.head_dim {
        return Err(AttentionError::shape(format!(
            "kv_data heads mismatch: expected [_, _, _, {}, {}], got {dims:?}",
            heads.num_kv_heads, heads.head_dim
        )));
    }
    if let Some(max_id) = layout.max_page_id() {
        if max_id >= pages {
            return Err(AttentionError::shape(format!(
                "page id {max_id} out of range for {pages} pages"
            )));
        }
    }
    Ok(())
}

fn page_ids(pages: &[usize], device: &Device) -> candle_core::Result<Tensor> {
    let ids: Vec<u32> = pages.iter().map(|&p| p as u32).collect();
    Tensor::from_vec(ids, pages.len(), device)
}

/// Gather the keys and values of request `idx` as contiguous
/// `[seq_len, num_kv_heads, head_dim]` tensors.
pub(crate) fn gather_request(
    kv_data: &Tensor,
    layout: &PagedKvLayout,
    idx: usize,
) -> Result<(Tensor, Tensor), AttentionError> {
    let (_, _, _, kv_heads, head_dim) = kv_data.dims5().map_err(|_| {
        AttentionError::shape(format!(
            "kv_data must have shape [pages, 2, page_size, kv_heads, head_dim], got {:?}",
            kv_data.dims()
        ))
    })?;
    let pages = layout.pages(idx);
    let seq_len = layout.seq_len(idx);
    let flat = (pages.len() * layout.page_size(), kv_heads, head_dim);

    let ids = page_ids(pages, kv_data.device())?;
    let selected = kv_data.index_select(&ids, 0)?;
    let keys = selected
        .narrow(1, 0, 1)?
        .squeeze(1)?
        .reshape(flat)?
        .narrow(0, 0, seq_len)?;
    let values = selected
        .narrow(1, 1, 1)?
        .squeeze(1)?
        .reshape(flat)?
        .narrow(0, 0, seq_len)?;
    Ok((keys.contiguous()?, values.contiguous()?))
}
