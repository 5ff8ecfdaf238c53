use super::*;
use candle_core::{Device, Result};

#[test]
fn causal_mask_respects_offsets() -> Result<()> {
    let device = Device::Cpu;
    let q_len = 3;
    let k_len = 5;

    let mask = build_causal_mask(&device, q_len, k_len)?;
    assert_eq!(mask.dims(), &[q_len, k_len]);
    assert_eq!(mask.dtype(), MASK_DTYPE);

    let values = mask.to_vec2::<f32>()?;

    // Earliest query can only see the prefix (offset = k_len - q_len).
    assert_eq!(values[0][2], 0.0);
    assert_eq!(values[0][3], f32::NEG_INFINITY);

    // The last query sees every key.
    assert!(values[2].iter().all(|v| *v == 0.0));

    Ok(())
}

#[test]
fn causal_mask_handles_single_token_cases() -> Result<()> {
    let device = Device::Cpu;

    let mask = build_causal_mask(&device, 1, 1)?;
    assert_eq!(mask.flatten_all()?.to_vec1::<f32>()?, vec![0.0]);

    let mask = build_causal_mask(&device, 1, 4)?;
    assert_eq!(
        mask.flatten_all()?.to_vec1::<f32>()?,
        vec![0.0, 0.0, 0.0, 0.0]
    );

    let values = build_causal_mask(&device, 4, 2)?.to_vec2::<f32>()?;
    assert_eq!(values[0][1], f32::NEG_INFINITY);
    assert_eq!(values[3][1], 0.0);

    Ok(())
}

#[test]
fn square_causal_mask_is_lower_triangular() -> Result<()> {
    let device = Device::Cpu;
    let values = build_causal_mask(&device, 4, 4)?.to_vec2::<f32>()?;
    for (q, row) in values.iter().enumerate() {
        for (k, value) in row.iter().enumerate() {
            if k > q {
                assert_eq!(*value, f32::NEG_INFINITY, "q={q} k={k}");
            } else {
                assert_eq!(*value, 0.0, "q={q} k={k}");
            }
        }
    }
    Ok(())
}
