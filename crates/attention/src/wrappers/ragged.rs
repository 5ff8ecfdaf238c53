//! Batched prefill over ragged (packed, variable-length) key/value tensors.

use candle_core::Tensor;

use crate::core::{Attention, AttentionError, Config, HeadConfig, TensorLayout};
use crate::kv_cache::RaggedLayout;
use crate::reference::ExactAttention;
use crate::wrappers::{require_nhd, WorkspaceBuffer};

/// Prefill wrapper for packed query/key/value tensors.
///
/// Call [`begin_forward`](Self::begin_forward) with the offset arrays of a
/// batch, then run any number of forward calls on the returned session.
#[derive(Debug)]
pub struct BatchPrefillWithRaggedKvCacheWrapper {
    workspace: WorkspaceBuffer,
    layout: TensorLayout,
    kernel: ExactAttention,
}

impl BatchPrefillWithRaggedKvCacheWrapper {
    pub fn new(workspace: WorkspaceBuffer, layout: TensorLayout) -> Result<Self, AttentionError> {
        require_nhd(layout)?;
        Ok(Self {
            workspace,
            layout,
            kernel: ExactAttention::new(),
        })
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Bind the batch metadata. `qo_indptr` and `kv_indptr` hold
    /// `num_requests + 1` offsets into the packed token axis.
    pub fn begin_forward(
        &mut self,
        qo_indptr: &Tensor,
        kv_indptr: &Tensor,
        heads: HeadConfig,
    ) -> Result<RaggedPrefillSession<'_>, AttentionError> {
        heads.validate()?;
        let qo = RaggedLayout::from_tensor(qo_indptr)?;
        let kv = RaggedLayout::from_tensor(kv_indptr)?;
        if qo.num_requests() != kv.num_requests() {
            return Err(AttentionError::shape(format!(
                "qo_indptr describes {} requests but kv_indptr {}",
                qo.num_requests(),
                kv.num_requests()
            )));
        }
        log::info!(
            "ragged prefill plan: requests={} qo_tokens={} kv_tokens={} heads={}/{} head_dim={} workspace={}B",
            qo.num_requests(),
            qo.total(),
            kv.total(),
            heads.num_qo_heads,
            heads.num_kv_heads,
            heads.head_dim,
            self.workspace.bytes()
        );
        Ok(RaggedPrefillSession {
            wrapper: self,
            qo,
            kv,
            heads,
        })
    }
}

/// Plan bound by [`BatchPrefillWithRaggedKvCacheWrapper::begin_forward`].
#[derive(Debug)]
pub struct RaggedPrefillSession<'w> {
    wrapper: &'w mut BatchPrefillWithRaggedKvCacheWrapper,
    qo: RaggedLayout,
    kv: RaggedLayout,
    heads: HeadConfig,
}

impl RaggedPrefillSession<'_> {
    /// `q` is `[nnz_qo, num_qo_heads, head_dim]`; `k` and `v` are
    /// `[nnz_kv, num_kv_heads, head_dim]`.
    pub fn forward(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        config: &Config,
    ) -> Result<Tensor, AttentionError> {
        self.wrapper.workspace.check_device(q)?;
        check_packed(q, self.qo.total(), self.heads.num_qo_heads, self.heads.head_dim, "q")?;
        check_packed(k, self.kv.total(), self.heads.num_kv_heads, self.heads.head_dim, "k")?;
        check_packed(v, self.kv.total(), self.heads.num_kv_heads, self.heads.head_dim, "v")?;

        let mut outputs = Vec::with_capacity(self.qo.num_requests());
        for req in 0..self.qo.num_requests() {
            let (q_start, q_len) = self.qo.span(req);
            if q_len == 0 {
                continue;
            }
            let (kv_start, kv_len) = self.kv.span(req);
            let out = self.wrapper.kernel.attend(
                &q.narrow(0, q_start, q_len)?,
                &k.narrow(0, kv_start, kv_len)?,
                &v.narrow(0, kv_start, kv_len)?,
                config,
            )?;
            outputs.push(out);
        }
        if outputs.is_empty() {
            return Ok(q.clone());
        }
        Ok(Tensor::cat(&outputs, 0)?)
    }

    /// Release the bound plan.
    pub fn end_forward(self) {}
}

impl Drop for RaggedPrefillSession<'_> {
    fn drop(&mut self) {
        log::debug!(
            "ragged prefill plan released: requests={}",
            self.qo.num_requests()
        );
    }
}

pub(crate) fn check_packed(
    t: &Tensor,
    tokens: usize,
    heads: usize,
    head_dim: usize,
    name: &str,
) -> Result<(), AttentionError> {
    if t.dims() != [tokens, heads, head_dim] {
        return Err(AttentionError::shape(format!(
            "{name} expected [{tokens}, {heads}, {head_dim}], got {:?}",
            t.dims()
        )));
    }
    Ok(())
}
