//! Portable reference kernels.
//!
//! These kernels run on every candle device and back the public functions
//! and wrappers of this crate.

pub mod exact;

pub use exact::ExactAttention;
