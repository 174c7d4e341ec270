//! Cross-module integration tests.
//!
//! Per-module unit tests already cover each primitive in isolation; these
//! exercise several modules wired together the way a caller actually would.

#[path = "integration/corpus_lifecycle.rs"]
mod corpus_lifecycle;

#[path = "integration/lookup_flow.rs"]
mod lookup_flow;

#[path = "integration/version_rollback.rs"]
mod version_rollback;
