use candle_core::Tensor;

use crate::core::{Attention, AttentionError, Config};
use crate::reference::ExactAttention;

/// Prefill attention for one request.
///
/// `q` is `[qo_len, num_qo_heads, head_dim]`; `k` and `v` are
/// `[kv_len, num_kv_heads, head_dim]`. Returns `[qo_len, num_qo_heads, head_dim]`.
pub fn single_prefill_with_kv_cache(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    config: &Config,
) -> Result<Tensor, AttentionError> {
    ExactAttention::new().attend(q, k, v, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn prefill_preserves_query_shape() {
        let device = Device::Cpu;
        let q = Tensor::randn(0f32, 1.0, (16, 8, 32), &device).unwrap();
        let k = Tensor::randn(0f32, 1.0, (16, 2, 32), &device).unwrap();
        let v = Tensor::randn(0f32, 1.0, (16, 2, 32), &device).unwrap();
        let out = single_prefill_with_kv_cache(&q, &k, &v, &Config::causal()).unwrap();
        assert_eq!(out.dims(), &[16, 8, 32]);
        assert_eq!(out.dtype(), DType::F32);
    }
}
