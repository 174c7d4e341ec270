// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! A versioned, content-addressed metadata store with hierarchical corpora
//! and a multi-modal word search engine.
//!
//! This crate is the storage-and-indexing core of a dictionary-lookup
//! pipeline: it persists resources under semantic-version chains,
//! deduplicates identical content, composes corpora into parent/child trees
//! with vocabulary aggregation, and serves exact/fuzzy/semantic word lookups
//! over large lexicons. Transport, CLI wrapping, AI synthesis, and provider
//! scraping are external collaborators, reached through trait seams
//! ([`pipeline::DictionaryProvider`], [`pipeline::LiteratureProvider`],
//! [`pipeline::Synthesizer`], [`semantic::EmbeddingProvider`]).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌─────────────┐   ┌───────────────┐
//! │  bloom.rs │──▶│  trie.rs   │──▶│  search/    │──▶│  hot_reload.rs│
//! │ (gate)    │   │ (exact/    │   │ (orchestrate│   │ (rebuild on   │
//! │           │   │  prefix)   │   │  bloom/trie/│   │  fingerprint  │
//! │           │   │            │   │  fuzzy/sem) │   │  change)      │
//! └───────────┘   └────────────┘   └─────────────┘   └───────────────┘
//!        ▲               ▲                ▲                  │
//!        │               │                │                  ▼
//! ┌──────┴───────────────┴────────────────┴──────┐   ┌───────────────┐
//! │                  corpus.rs                    │   │  pipeline.rs  │
//! │   (parent/child tree, vocabulary aggregation,  │◀──│  (lookup:     │
//! │    cascade delete)                             │   │   search ->   │
//! └──────────────────────┬─────────────────────────┘   │   providers ->│
//!                        │                              │   synthesize)│
//!                        ▼                              └───────┬───────┘
//!                 ┌─────────────┐    ┌─────────────┐            │
//!                 │  version/   │◀───│  cache.rs   │◀───────────┘
//!                 │ (chains,    │    │ (two-tier,  │
//!                 │  deltas,    │    │  namespaced)│
//!                 │  dedup)     │    └─────────────┘
//!                 └─────────────┘
//! ```
//!
//! # Module map
//!
//! | Module        | Responsibility                                          |
//! |---------------|----------------------------------------------------------|
//! | [`types`]     | The data model: `Resource`, `Corpus`, index resources     |
//! | [`error`]     | The error taxonomy and `Result` alias                     |
//! | [`config`]    | Process-wide configuration, env-var driven                |
//! | [`util`]      | Word normalization, canonical JSON, content hashing       |
//! | [`bloom`]     | Probabilistic vocabulary membership pre-filter             |
//! | [`trie`]      | Exact + prefix lookup over normalized vocabulary           |
//! | [`fuzzy`]     | Length-and-phrase-aware approximate matching               |
//! | [`semantic`]  | Dense-vector nearest-neighbour search adapter              |
//! | [`search`]    | Orchestrates bloom/trie/fuzzy/semantic behind one call     |
//! | [`version`]   | Snapshot/delta version chains, dedup, rollback             |
//! | [`corpus`]    | Parent/child corpus tree, aggregation, cascade delete      |
//! | [`cache`]     | Two-tier namespaced cache with TTL                         |
//! | [`hot_reload`]| Detects corpus changes, rebuilds the search engine          |
//! | [`pipeline`]  | Lookup flow: search -> provider fetch -> synthesize -> save|
//!
//! [`testing`] holds shared test fixtures and is hidden from documentation.

pub mod bloom;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod error;
pub mod fuzzy;
pub mod hot_reload;
pub mod pipeline;
pub mod search;
pub mod semantic;
#[doc(hidden)]
pub mod testing;
pub mod trie;
pub mod types;
pub mod util;
pub mod version;

pub use bloom::{BloomFilter, BloomStats};
pub use cache::Cache;
pub use config::StoreConfig;
pub use corpus::{CorpusTreeManager, LanguageSourceConnector};
pub use error::{Result, StoreError};
pub use fuzzy::scoring::FuzzyMethod;
pub use fuzzy::{FuzzyIndex, FuzzyMatch};
pub use hot_reload::{EngineStatus, SearchEngineManager};
pub use pipeline::{BackoffPolicy, DictionaryProvider, LiteratureProvider, LookupOutcome, LookupPipeline, Synthesizer};
pub use search::{Engine, Match, MatchSource, SearchMode};
pub use semantic::{EmbeddingProvider, SemanticIndex, SemanticMatch, SemanticStatus};
pub use trie::{TrieIndex, TrieMatch};
pub use types::{
    derived_resource_id, synthesis_resource_id, ContentRef, Corpus, CorpusType, Namespace, Resource,
    ResourceType, SearchIndexResource, SemanticIndexResource, SemanticIndexType, StorageMode,
    TrieIndexResource, VersionInfo,
};
pub use version::delta::{apply_delta, compute_delta, compute_diff_between, reconstruct_version, should_keep_as_snapshot, Delta, DeltaOp};
pub use version::store::{FsStore, InMemoryStore, ResourceStore};
pub use version::{SaveConfig, VersionChainManager};
