//! Stateful batch wrappers with a two-phase protocol.
//!
//! A wrapper owns its workspace buffer. `begin_forward` validates the batch
//! metadata and returns a session that mutably borrows the wrapper, so at most
//! one plan is bound at a time. Sessions run forward calls and release their
//! plan when ended or dropped, including on early returns.

pub mod paged;
pub mod ragged;
pub mod workspace;

pub use paged::{
    BatchDecodeWithPagedKvCacheWrapper, BatchPrefillWithPagedKvCacheWrapper, PagedDecodeSession,
    PagedKvIndices, PagedPrefillSession,
};
pub use ragged::{BatchPrefillWithRaggedKvCacheWrapper, RaggedPrefillSession};
pub use workspace::{WorkspaceBuffer, DECODE_WORKSPACE_BYTES, PREFILL_WORKSPACE_BYTES};

use crate::core::{AttentionError, TensorLayout};

fn require_nhd(layout: TensorLayout) -> Result<(), AttentionError> {
    match layout {
        TensorLayout::Nhd => Ok(()),
        other => Err(AttentionError::Unsupported {
            feature: format!("{other} layout in the reference wrappers"),
        }),
    }
}
