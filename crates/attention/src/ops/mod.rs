//! Single-call attention entry points.
//!
//! These functions take whole query/key/value tensors and need no planning
//! step, unlike the batch wrappers in [`crate::wrappers`].

pub mod decode;
pub mod prefill;

pub use decode::{batch_decode_with_padded_kv_cache, single_decode_with_kv_cache};
pub use prefill::single_prefill_with_kv_cache;
