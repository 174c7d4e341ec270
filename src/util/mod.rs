//! Small, shared helpers: normalization and canonical hashing.
//!
//! Everything in here is pure and allocation-light by design — both are
//! called on every save and every search.

pub mod canonical;
pub mod normalize;

pub use canonical::{canonical_json, content_hash};
pub use normalize::{common_prefix_len_chars, normalize, strip_diacritics};
