//! Batched prefill and decode over a paged key/value cache.

use candle_core::Tensor;

use crate::core::{Attention, AttentionError, Config, HeadConfig, TensorLayout};
use crate::kv_cache::{check_kv_data, gather_request, PagedKvLayout, RaggedLayout};
use crate::reference::ExactAttention;
use crate::wrappers::ragged::check_packed;
use crate::wrappers::{require_nhd, WorkspaceBuffer};

/// Device-side page table handed to `begin_forward`.
#[derive(Debug, Clone, Copy)]
pub struct PagedKvIndices<'a> {
    /// `num_requests + 1` offsets into `indices`.
    pub indptr: &'a Tensor,
    /// Page ids, grouped per request.
    pub indices: &'a Tensor,
    /// Tokens held by the last page of each request.
    pub last_page_len: &'a Tensor,
}

impl PagedKvIndices<'_> {
    fn to_layout(self, page_size: usize) -> Result<PagedKvLayout, AttentionError> {
        PagedKvLayout::from_tensors(self.indptr, self.indices, self.last_page_len, page_size)
    }
}

/// Prefill wrapper reading keys and values from a paged cache.
#[derive(Debug)]
pub struct BatchPrefillWithPagedKvCacheWrapper {
    workspace: WorkspaceBuffer,
    layout: TensorLayout,
    kernel: ExactAttention,
}

impl BatchPrefillWithPagedKvCacheWrapper {
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

    pub fn begin_forward(
        &mut self,
        qo_indptr: &Tensor,
        paged_kv: PagedKvIndices<'_>,
        heads: HeadConfig,
        page_size: usize,
    ) -> Result<PagedPrefillSession<'_>, AttentionError> {
        heads.validate()?;
        let qo = RaggedLayout::from_tensor(qo_indptr)?;
        let kv = paged_kv.to_layout(page_size)?;
        if qo.num_requests() != kv.num_requests() {
            return Err(AttentionError::shape(format!(
                "qo_indptr describes {} requests but paged_kv_indptr {}",
                qo.num_requests(),
                kv.num_requests()
            )));
        }
        log::info!(
            "paged prefill plan: requests={} qo_tokens={} pages={} page_size={} heads={}/{} head_dim={}",
            qo.num_requests(),
            qo.total(),
            kv.num_pages(),
            page_size,
            heads.num_qo_heads,
            heads.num_kv_heads,
            heads.head_dim
        );
        Ok(PagedPrefillSession {
            wrapper: self,
            qo,
            kv,
            heads,
        })
    }
}

/// Plan bound by [`BatchPrefillWithPagedKvCacheWrapper::begin_forward`].
#[derive(Debug)]
pub struct PagedPrefillSession<'w> {
    wrapper: &'w mut BatchPrefillWithPagedKvCacheWrapper,
    qo: RaggedLayout,
    kv: PagedKvLayout,
    heads: HeadConfig,
}

impl PagedPrefillSession<'_> {
    /// `q` is `[nnz_qo, num_qo_heads, head_dim]`; `kv_data` is
    /// `[max_num_pages, 2, page_size, num_kv_heads, head_dim]`.
    pub fn forward(
        &self,
        q: &Tensor,
        kv_data: &Tensor,
        config: &Config,
    ) -> Result<Tensor, AttentionError> {
        self.wrapper.workspace.check_device(q)?;
        check_packed(q, self.qo.total(), self.heads.num_qo_heads, self.heads.head_dim, "q")?;
        check_kv_data(kv_data, &self.kv, &self.heads)?;

        let mut outputs = Vec::with_capacity(self.qo.num_requests());
        for req in 0..self.qo.num_requests() {
            let (q_start, q_len) = self.qo.span(req);
            if q_len == 0 {
                continue;
            }
            let (keys, values) = gather_request(kv_data, &self.kv, req)?;
            let out = self.wrapper.kernel.attend(
                &q.narrow(0, q_start, q_len)?,
                &keys,
                &values,
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

impl Drop for PagedPrefillSession<'_> {
    fn drop(&mut self) {
        log::debug!(
            "paged prefill plan released: requests={} pages={}",
            self.kv.num_requests(),
            self.kv.num_pages()
        );
    }
}

/// Decode wrapper reading keys and values from a paged cache.
#[derive(Debug)]
pub struct BatchDecodeWithPagedKvCacheWrapper {
    workspace: WorkspaceBuffer,
    layout: TensorLayout,
    kernel: ExactAttention,
}

impl BatchDecodeWithPagedKvCacheWrapper {
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

    pub fn begin_forward(
        &mut self,
        paged_kv: PagedKvIndices<'_>,
        heads: HeadConfig,
        page_size: usize,
    ) -> Result<PagedDecodeSession<'_>, AttentionError> {
        heads.validate()?;
        let kv = paged_kv.to_layout(page_size)?;
        log::info!(
            "paged decode plan: requests={} pages={} page_size={} heads={}/{} head_dim={}",
            kv.num_requests(),
            kv.num_pages(),
            page_size,
            heads.num_qo_heads,
            heads.num_kv_heads,
            heads.head_dim
        );
        Ok(PagedDecodeSession {
            wrapper: self,
            kv,
            heads,
        })
    }
}

/// Plan bound by [`BatchDecodeWithPagedKvCacheWrapper::begin_forward`].
#[derive(Debug)]
pub struct PagedDecodeSession<'w> {
    wrapper: &'w mut BatchDecodeWithPagedKvCacheWrapper,
    kv: PagedKvLayout,
    heads: HeadConfig,
}

impl PagedDecodeSession<'_> {
    /// `q` is `[num_requests, num_qo_heads, head_dim]`. Returns a tensor of
    /// the same shape.
    pub fn forward(&self, q: &Tensor, kv_data: &Tensor) -> Result<Tensor, AttentionError> {
        self.wrapper.workspace.check_device(q)?;
        check_packed(q, self.kv.num_requests(), self.heads.num_qo_heads, self.heads.head_dim, "q")?;
        check_kv_data(kv_data, &self.kv, &self.heads)?;

        let config = Config::default();
        let mut outputs = Vec::with_capacity(self.kv.num_requests());
        for req in 0..self.kv.num_requests() {
            let (keys, values) = gather_request(kv_data, &self.kv, req)?;
            outputs.push(
                self.wrapper
                    .kernel
                    .attend(&q.narrow(0, req, 1)?, &keys, &values, &config)?,
            );
        }
        Ok(Tensor::cat(&outputs, 0)?)
    }

    /// Release the bound plan.
    pub fn end_forward(self) {}
}

impl Drop for PagedDecodeSession<'_> {
    fn drop(&mut self) {
        log::debug!(
            "paged decode plan released: requests={} pages={}",
            self.kv.num_requests(),
            self.kv.num_pages()
        );
    }
}
