//! Reference attention kernel over `NHD` tensors.
//!
//! The exact path prioritises numerical fidelity over speed. Grouped key/value
//! heads are expanded to match the query heads, scores are accumulated in
//! `f32`, and the output is cast back to the query dtype.

use std::sync::OnceLock;

use candle_core::{DType, Tensor};
use candle_nn::ops::softmax_last_dim;

use crate::core::{Attention, AttentionError, Config, HeadConfig};
use crate::masks::build_causal_mask;

/// Set by the first `attend` call in the process.
static FIRST_CALL: OnceLock<()> = OnceLock::new();

/// Numerically stable, portable attention kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactAttention;

impl ExactAttention {
    pub fn new() -> Self {
        Self
    }

    fn check_inputs(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
    ) -> Result<(usize, usize, HeadConfig), AttentionError> {
        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(AttentionError::shape("q, k, v must reside on the same device"));
        }

        let dtype = q.dtype();
        if dtype != k.dtype() || dtype != v.dtype() {
            return Err(AttentionError::shape("q, k, v must share the same dtype"));
        }
        if !matches!(dtype, DType::F32 | DType::F16 | DType::BF16) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{dtype:?}"),
            });
        }

        let (q_len, heads, head_dim) = q
            .dims3()
            .map_err(|_| AttentionError::shape("q must have shape [q_len, heads, head_dim]"))?;
        let (k_len, kv_heads, kd) = k
            .dims3()
            .map_err(|_| AttentionError::shape("k must have shape [kv_len, kv_heads, head_dim]"))?;
        let (v_len, vh, vd) = v
            .dims3()
            .map_err(|_| AttentionError::shape("v must have shape [kv_len, kv_heads, head_dim]"))?;

        if kd != head_dim {
            return Err(AttentionError::shape(format!(
                "k head_dim {kd} does not match q head_dim {head_dim}"
            )));
        }
        if v_len != k_len || vh != kv_heads || vd != head_dim {
            return Err(AttentionError::shape(format!(
                "v shape mismatch: expected [{k_len}, {kv_heads}, {head_dim}] got [{v_len}, {vh}, {vd}]"
            )));
        }

        let heads = HeadConfig::new(heads, kv_heads, head_dim);
        heads.validate()?;
        Ok((q_len, k_len, heads))
    }
}

impl Attention for ExactAttention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        config: &Config,
    ) -> Result<Tensor, AttentionError> {
        let (q_len, k_len, heads) = self.check_inputs(q, k, v)?;

        if FIRST_CALL.set(()).is_ok() {
            log::info!(
                "attention::reference init dtype={:?} device={:?} causal={} group_size={}",
                q.dtype(),
                q.device().location(),
                config.causal,
                heads.group_size()
            );
        }

        if config.causal && k_len < q_len {
            return Err(AttentionError::shape(format!(
                "causal attention needs kv_len >= q_len, got kv_len={k_len} q_len={q_len}"
            )));
        }

        let head_dim = heads.head_dim;
        let dtype = q.dtype();

        // [len, heads, dim] -> [heads, len, dim], promoted for accumulation.
        let q_work = q.to_dtype(DType::F32)?.transpose(0, 1)?.contiguous()?;
        let k_work = expand_kv_heads(k, heads.group_size())?;
        let v_work = expand_kv_heads(v, heads.group_size())?;

        let scale = config.scale_for(head_dim) as f64;
        let mut scores = q_work.matmul(&k_work.t()?)?.affine(scale, 0.0)?;

        if config.causal {
            let mask = build_causal_mask(q.device(), q_len, k_len)?;
            scores = scores.broadcast_add(&mask)?;
        }

        let probs = softmax_last_dim(&scores)?;
        let output = probs.matmul(&v_work)?;

        Ok(output.transpose(0, 1)?.contiguous()?.to_dtype(dtype)?)
    }
}

/// Promote `[len, kv_heads, dim]` to `[kv_heads * group, len, dim]` in `f32`.
fn expand_kv_heads(t: &Tensor, group: usize) -> candle_core::Result<Tensor> {
    let t = t.to_dtype(DType::F32)?.transpose(0, 1)?.contiguous()?;
    if group == 1 {
        return Ok(t);
    }
    let (kv_heads, len, dim) = t.dims3()?;
    t.unsqueeze(1)?
        .broadcast_as((kv_heads, group, len, dim))?
        .contiguous()?
        .reshape((kv_heads * group, len, dim))
}
