use candle_core::Tensor;

use crate::core::{Attention, AttentionError, Config};
use crate::reference::ExactAttention;

/// Decode attention for one request.
///
/// `q` is `[num_qo_heads, head_dim]`; `k` and `v` are
/// `[kv_len, num_kv_heads, head_dim]`. Returns `[num_qo_heads, head_dim]`.
pub fn single_decode_with_kv_cache(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
) -> Result<Tensor, AttentionError> {
    let (heads, head_dim) = q
        .dims2()
        .map_err(|_| AttentionError::shape("decode q must have shape [heads, head_dim]"))?;
    let out = ExactAttention::new().attend(&q.unsqueeze(0)?, k, v, &Config::default())?;
    Ok(out.reshape((heads, head_dim))?)
}

/// Decode attention over a batch of equally long, padded key/value caches.
///
/// `q` is `[batch, num_qo_heads, head_dim]`; `k` and `v` are
/// `[batch, kv_len, num_kv_heads, head_dim]`. Returns
/// `[batch, num_qo_heads, head_dim]`.
pub fn batch_decode_with_padded_kv_cache(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
) -> Result<Tensor, AttentionError> {
    let (batch, _, _) = q
        .dims3()
        .map_err(|_| AttentionError::shape("decode q must have shape [batch, heads, head_dim]"))?;
    let (kb, _, _, _) = k.dims4().map_err(|_| {
        AttentionError::shape("padded k must have shape [batch, kv_len, kv_heads, head_dim]")
    })?;
    if kb != batch || v.dims() != k.dims() {
        return Err(AttentionError::shape(format!(
            "padded kv batch mismatch: q {:?}, k {:?}, v {:?}",
            q.dims(),
            k.dims(),
            v.dims()
        )));
    }

    let kernel = ExactAttention::new();
    let mut outputs = Vec::with_capacity(batch);
    for b in 0..batch {
        let q_b = q.narrow(0, b, 1)?;
        let k_b = k.narrow(0, b, 1)?.squeeze(0)?;
        let v_b = v.narrow(0, b, 1)?.squeeze(0)?;
        outputs.push(kernel.attend(&q_b, &k_b, &v_b, &Config::default())?);
    }
    Ok(Tensor::cat(&outputs, 0)?)
}
