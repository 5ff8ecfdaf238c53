//! Key/value layout metadata and paged storage helpers.
//!
//! Wrappers translate the index arrays they receive into these host-side
//! layouts once per plan, then reuse them for every forward call.

pub mod layout;
pub mod paged;

pub use layout::{PagedKvLayout, RaggedLayout};
pub use paged::check_kv_data;
pub(crate) use paged::gather_request;

#[cfg(test)]
mod tests;
