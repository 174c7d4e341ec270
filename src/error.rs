//! The error taxonomy.
//!
//! One enum, one `Result` alias, used everywhere. Transient failures
//! (`ConcurrentVersionBump`, `ProviderTimeout`, `ProviderRateLimit`) are
//! retried by callers per their own backoff policy; everything else is
//! surfaced immediately. See `SPEC_FULL.md` §1 "Errors".

/// Every error the store can return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {resource_id} ({resource_type})")]
    NotFound {
        resource_id: String,
        resource_type: String,
    },

    #[error("version not found: {resource_id} ({resource_type}) @ {version}")]
    VersionNotFound {
        resource_id: String,
        resource_type: String,
        version: String,
    },

    #[error("corpus not found: {0}")]
    CorpusNotFound(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("cycle rejected: {child} is already an ancestor of {parent}")]
    CycleRejected { parent: String, child: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("content hash mismatch for {resource_id} @ {version}: expected {expected}, got {actual}")]
    ContentHashMismatch {
        resource_id: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("failed to apply delta for {resource_id} @ {version}: {reason}")]
    DeltaApplyFailure {
        resource_id: String,
        version: String,
        reason: String,
    },

    #[error("concurrent version bump race on {resource_id} ({resource_type}), retry")]
    ConcurrentVersionBump {
        resource_id: String,
        resource_type: String,
    },

    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    #[error("provider '{provider}' rate limited")]
    ProviderRateLimit { provider: String },

    #[error("semantic search unavailable: {0}")]
    SemanticUnavailable(String),

    #[error("aggregation partially failed: child {child_uuid} unreachable, parent rolled back")]
    AggregationPartialFailure { child_uuid: String },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// A single-line reason string, for status surfaces.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Short machine-readable kind tag, for structured logging and status endpoints.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::VersionNotFound { .. } => "version_not_found",
            StoreError::CorpusNotFound(_) => "corpus_not_found",
            StoreError::ValidationError(_) => "validation_error",
            StoreError::CycleRejected { .. } => "cycle_rejected",
            StoreError::InvariantViolation(_) => "invariant_violation",
            StoreError::ContentHashMismatch { .. } => "content_hash_mismatch",
            StoreError::DeltaApplyFailure { .. } => "delta_apply_failure",
            StoreError::ConcurrentVersionBump { .. } => "concurrent_version_bump",
            StoreError::ProviderTimeout { .. } => "provider_timeout",
            StoreError::ProviderRateLimit { .. } => "provider_rate_limit",
            StoreError::SemanticUnavailable(_) => "semantic_unavailable",
            StoreError::AggregationPartialFailure { .. } => "aggregation_partial_failure",
            StoreError::Other(_) => "other",
        }
    }

    /// Transient errors are worth a local retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrentVersionBump { .. }
                | StoreError::ProviderTimeout { .. }
                | StoreError::ProviderRateLimit { .. }
        )
    }
}

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
