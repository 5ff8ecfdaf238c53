use super::{gather_request, PagedKvLayout, RaggedLayout};
use crate::core::{AttentionError, HeadConfig};
use crate::kv_cache::check_kv_data;
use candle_core::{DType, Device, Tensor};

#[test]
fn ragged_layout_exposes_spans() {
    let layout = RaggedLayout::new(vec![0, 8, 16]).unwrap();
    assert_eq!(layout.num_requests(), 2);
    assert_eq!(layout.total(), 16);
    assert_eq!(layout.span(0), (0, 8));
    assert_eq!(layout.span(1), (8, 8));
}

#[test]
fn ragged_layout_rejects_bad_offsets() {
    assert!(RaggedLayout::new(vec![]).is_err());
    assert!(RaggedLayout::new(vec![1, 8]).is_err());
    assert!(RaggedLayout::new(vec![0, 8, 4]).is_err());
    // empty sequences are allowed in a ragged batch
    assert!(RaggedLayout::new(vec![0, 0, 4]).is_ok());
}

#[test]
fn ragged_layout_reads_device_tensor() {
    let device = Device::Cpu;
    let indptr = Tensor::new(&[0u32, 5, 12], &device).unwrap();
    let layout = RaggedLayout::from_tensor(&indptr).unwrap();
    assert_eq!(layout.indptr(), &[0, 5, 12]);

    let floats = Tensor::new(&[0f32, 5.0], &device).unwrap();
    assert!(RaggedLayout::from_tensor(&floats).is_err());
}

#[test]
fn paged_layout_counts_partial_last_page() {
    let layout = PagedKvLayout::new(vec![0, 3, 6], (0..6).collect(), vec![1, 1], 16).unwrap();
    assert_eq!(layout.num_requests(), 2);
    assert_eq!(layout.num_pages(), 6);
    assert_eq!(layout.pages(1), &[3, 4, 5]);
    assert_eq!(layout.seq_len(0), 33);
    assert_eq!(layout.max_page_id(), Some(5));
}

#[test]
fn paged_layout_enforces_invariants() {
    // indptr must end at the number of indices
    assert!(PagedKvLayout::new(vec![0, 2], vec![0, 1, 2], vec![4], 16).is_err());
    // last page length must be in (0, page_size]
    assert!(PagedKvLayout::new(vec![0, 1], vec![0], vec![0], 16).is_err());
    assert!(PagedKvLayout::new(vec![0, 1], vec![0], vec![17], 16).is_err());
    assert!(PagedKvLayout::new(vec![0, 1], vec![0], vec![16], 16).is_ok());
    // one length per request
    assert!(PagedKvLayout::new(vec![0, 1, 2], vec![0, 1], vec![16], 16).is_err());
    // every request owns at least one page
    assert!(PagedKvLayout::new(vec![0, 0, 1], vec![0], vec![1, 1], 16).is_err());
    assert!(PagedKvLayout::new(vec![0, 1], vec![0], vec![1], 0).is_err());
}

#[test]
fn gather_follows_page_table_order() {
    let device = Device::Cpu;
    let (pages, page_size, kv_heads, head_dim) = (3, 2, 1, 1);
    // page p, slot s, kv k: value = 100 * k + 10 * p + s
    let mut data = Vec::new();
    for p in 0..pages {
        for k in 0..2 {
            for s in 0..page_size {
                data.push((100 * k + 10 * p + s) as f32);
            }
        }
    }
    let kv_data =
        Tensor::from_vec(data, (pages, 2, page_size, kv_heads, head_dim), &device).unwrap();

    // request 0 uses pages [2, 0] with one token on its last page
    let layout = PagedKvLayout::new(vec![0, 2, 3], vec![2, 0, 1], vec![1, 2], page_size).unwrap();
    check_kv_data(&kv_data, &layout, &HeadConfig::new(1, 1, 1)).unwrap();

    let (keys, values) = gather_request(&kv_data, &layout, 0).unwrap();
    assert_eq!(keys.dims(), &[3, 1, 1]);
    assert_eq!(
        keys.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        vec![20.0, 21.0, 0.0]
    );
    assert_eq!(
        values.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        vec![120.0, 121.0, 100.0]
    );

    let (keys, _) = gather_request(&kv_data, &layout, 1).unwrap();
    assert_eq!(
        keys.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        vec![10.0, 11.0]
    );
}

#[test]
fn kv_data_shape_is_checked() {
    let device = Device::Cpu;
    let layout = PagedKvLayout::new(vec![0, 2], vec![0, 4], vec![16], 16).unwrap();
    let heads = HeadConfig::new(4, 2, 8);

    let kv_data = Tensor::zeros((5, 2, 16, 2, 8), DType::F32, &device).unwrap();
    assert!(check_kv_data(&kv_data, &layout, &heads).is_ok());

    let too_few_pages = Tensor::zeros((4, 2, 16, 2, 8), DType::F32, &device).unwrap();
    assert!(check_kv_data(&too_few_pages, &layout, &heads).is_err());

    let wrong_page = Tensor::zeros((5, 2, 8, 2, 8), DType::F32, &device).unwrap();
    assert!(check_kv_data(&wrong_page, &layout, &heads).is_err());

    let wrong_heads = Tensor::zeros((5, 2, 16, 4, 8), DType::F32, &device).unwrap();
    assert!(check_kv_data(&wrong_heads, &layout, &heads).is_err());
}

#[test]
fn gather_rejects_low_rank_storage() {
    let device = Device::Cpu;
    let layout = PagedKvLayout::new(vec![0, 1], vec![0], vec![4], 16).unwrap();
    let flat = Tensor::zeros((16, 2, 8), DType::F32, &device).unwrap();
    let err = gather_request(&flat, &layout, 0).unwrap_err();
    assert!(matches!(err, AttentionError::InvalidShape { .. }), "{err}");
}
