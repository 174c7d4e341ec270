//! Process-wide configuration, read from the environment.
//!
//! Mirrors the process's env vars. Everything has a default so a missing
//! environment still produces a working, conservative config.

use std::time::Duration;

/// Which component of a semver triple to bump on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionLevel {
    Major,
    Minor,
    Patch,
}

impl Default for VersionLevel {
    fn default() -> Self {
        VersionLevel::Patch
    }
}

/// Knobs for the version chain manager.
#[derive(Debug, Clone)]
pub struct VersioningConfig {
    pub default_level: VersionLevel,
    /// Distance (in chain positions) between forced snapshots.
    pub snapshot_interval: usize,
    /// Content payload byte size below which a version is inlined/snapshotted
    /// rather than stored externally/delta-encoded.
    pub inline_threshold_bytes: usize,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            default_level: VersionLevel::Patch,
            snapshot_interval: 10,
            inline_threshold_bytes: 10_000,
        }
    }
}

/// Knobs for the bloom filter.
#[derive(Debug, Clone, Copy)]
pub struct BloomConfig {
    pub target_false_positive_rate: f64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            target_false_positive_rate: 0.01,
        }
    }
}

/// Knobs for the fuzzy matcher.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyConfig {
    pub length_tolerance: usize,
    pub default_max_results: usize,
    pub default_min_score: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            length_tolerance: 2,
            default_max_results: 20,
            default_min_score: 0.6,
        }
    }
}

/// Knobs for the semantic index adapter.
#[derive(Debug, Clone, Copy)]
pub struct SemanticConfig {
    pub enabled: bool,
    /// Vocabulary size at or above which the index switches from flat to IVFPQ.
    pub ivfpq_threshold: usize,
}

impl SemanticConfig {
    /// Reads `SEMANTIC_SEARCH_ENABLED` (default `true`).
    pub fn from_env() -> Self {
        let enabled = std::env::var("SEMANTIC_SEARCH_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        Self {
            enabled,
            ..Self::default()
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ivfpq_threshold: 50_000,
        }
    }
}

/// Knobs for the hot-reload controller.
#[derive(Debug, Clone, Copy)]
pub struct HotReloadConfig {
    pub check_interval: Duration,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Knobs for the cache layer.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub in_memory_capacity: usize,
    pub default_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            in_memory_capacity: 10_000,
            default_ttl: None,
        }
    }
}

/// Knobs for the pipeline orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub dedup_wait_time: Duration,
    pub provider_timeout: Duration,
    pub stream_keepalive_interval: Duration,
    pub exact_threshold: f64,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            dedup_wait_time: env_secs("CACHE_DEDUP_WAIT_TIME", 120),
            provider_timeout: env_secs("API_LOOKUP_TIMEOUT", 120),
            stream_keepalive_interval: env_secs("STREAM_KEEPALIVE_INTERVAL", 15),
            exact_threshold: 1.0,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_secs(var: &str, default_secs: u64) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

/// Top-level config bundle, constructed once per process.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub versioning: VersioningConfig,
    pub bloom: BloomConfig,
    pub fuzzy: FuzzyConfig,
    pub semantic: SemanticConfig,
    pub hot_reload: HotReloadConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            semantic: SemanticConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            ..Self::default()
        }
    }
}
