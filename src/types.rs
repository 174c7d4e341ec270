// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The data model: every shape persisted by the version chain manager.
//!
//! `Resource` is the universal persisted unit. `Corpus`, `TrieIndexResource`,
//! `SearchIndexResource`, and `SemanticIndexResource` are typed payloads
//! carried inside a `Resource`'s content, keyed by `resource_type`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// =============================================================================
// NAMESPACES & RESOURCE TYPES
// =============================================================================

/// Logical partition of persisted data, used to isolate the cache layer and
/// scope lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Dictionary,
    Corpus,
    Semantic,
    Literature,
    Default,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Dictionary => "dictionary",
            Namespace::Corpus => "corpus",
            Namespace::Semantic => "semantic",
            Namespace::Literature => "literature",
            Namespace::Default => "default",
        }
    }
}

/// Discriminant for `Resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Corpus,
    Dictionary,
    Search,
    Trie,
    Semantic,
    Language,
    Literature,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Corpus => "corpus",
            ResourceType::Dictionary => "dictionary",
            ResourceType::Search => "search",
            ResourceType::Trie => "trie",
            ResourceType::Semantic => "semantic",
            ResourceType::Language => "language",
            ResourceType::Literature => "literature",
        }
    }

    /// Snapshot-only resource types whose payload is a binary blob that
    /// can't be usefully diffed.
    pub fn is_delta_eligible(&self) -> bool {
        !matches!(self, ResourceType::Semantic | ResourceType::Trie)
    }

    /// The namespace a resource of this type is conventionally saved under,
    /// used to key the cache when a caller doesn't carry the namespace
    /// alongside a bare `(resource_id, resource_type)` pair.
    pub fn default_namespace(&self) -> Namespace {
        match self {
            ResourceType::Dictionary => Namespace::Dictionary,
            ResourceType::Semantic => Namespace::Semantic,
            ResourceType::Literature => Namespace::Literature,
            ResourceType::Corpus | ResourceType::Search | ResourceType::Trie | ResourceType::Language => {
                Namespace::Corpus
            }
        }
    }
}

// =============================================================================
// VERSION
// =============================================================================

/// Which semver component `save()` bumps by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

/// Storage mode of a single version link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Snapshot,
    Delta,
}

/// One link in a resource's version chain.
///
/// Invariants enforced by the version chain manager, not by this type alone:
/// exactly one `is_latest=true` per `(resource_id, resource_type)`; the chain
/// is acyclic and totally ordered by semver; every delta node reaches a
/// snapshot without crossing another snapshot first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: semver::Version,
    pub is_latest: bool,
    pub previous_version: Option<semver::Version>,
    pub next_version: Option<semver::Version>,
    pub storage_mode: StorageMode,
    /// Required when `storage_mode == Delta`: points to the nearest prior snapshot.
    pub delta_base_version: Option<semver::Version>,
    pub data_hash: String,
    pub created_at: i64,
}

// =============================================================================
// RESOURCE
// =============================================================================

/// Where a resource's payload actually lives: inline in the metadata record,
/// or at an external location resolved by the storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContentRef {
    Inline(serde_json::Value),
    Location(String),
}

/// The universal persisted unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub namespace: Namespace,
    pub version_info: VersionInfo,
    pub content_hash: String,
    pub content: ContentRef,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: HashSet<String>,
}

impl Resource {
    /// The logical content, when stored inline. Resolving `content_location`
    /// (fetching an external blob) is the storage backend's job
    /// (`ResourceStore`); by the time a `Resource` reaches this layer its
    /// content has normally already been materialized.
    pub fn content_value(&self) -> Option<&serde_json::Value> {
        match &self.content {
            ContentRef::Inline(v) => Some(v),
            ContentRef::Location(_) => None,
        }
    }
}

// =============================================================================
// CORPUS
// =============================================================================

/// Container vs. leaf distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusType {
    Language,
    Lexicon,
    Literature,
    Custom,
}

/// A named, versioned vocabulary — leaf or master container.
///
/// Invariants: `vocabulary`, `original_vocabulary`, and `lemmatized_vocabulary`
/// stay the same length and index-aligned; `vocabulary_to_index[vocabulary[i]]
/// == i`; a node is never its own ancestor; a master corpus's `vocabulary`
/// equals the sorted union of its children's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    pub corpus_name: String,
    pub corpus_uuid: Uuid,
    pub corpus_type: CorpusType,
    pub language: String,
    pub is_master: bool,
    pub parent_uuid: Option<Uuid>,
    #[serde(default)]
    pub child_uuids: Vec<Uuid>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub original_vocabulary: Vec<String>,
    #[serde(default)]
    pub lemmatized_vocabulary: Vec<String>,
    #[serde(default)]
    pub vocabulary_to_index: HashMap<String, usize>,
    pub vocabulary_hash: String,
}

impl Corpus {
    /// Build a fresh leaf corpus from original-cased words, deduplicating on
    /// normalized form and sorting.
    pub fn new_leaf(
        corpus_name: String,
        corpus_type: CorpusType,
        language: String,
        parent_uuid: Option<Uuid>,
        original_words: Vec<String>,
    ) -> Self {
        // Normalization is embarrassingly parallel and dominates build time on
        // a ~270k-word lexicon corpus; sorting afterward stays sequential
        // since dedup needs stable adjacency.
        let mut pairs: Vec<(String, String)> = original_words
            .into_par_iter()
            .map(|w| (crate::util::normalize(&w), w))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);

        let vocabulary: Vec<String> = pairs.iter().map(|(n, _)| n.clone()).collect();
        let original_vocabulary: Vec<String> = pairs.iter().map(|(_, o)| o.clone()).collect();
        let lemmatized_vocabulary = vocabulary.clone(); // no stemmer in scope; lemma == normalized form
        let vocabulary_to_index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        let vocabulary_hash = crate::util::content_hash(&vocabulary).unwrap_or_default();

        Self {
            corpus_name,
            corpus_uuid: Uuid::new_v4(),
            corpus_type,
            language,
            is_master: false,
            parent_uuid,
            child_uuids: Vec::new(),
            vocabulary,
            original_vocabulary,
            lemmatized_vocabulary,
            vocabulary_to_index,
            vocabulary_hash,
        }
    }

    /// Build an empty master container: a pure aggregation node whose
    /// vocabulary is the union of its children's.
    pub fn new_master(
        corpus_name: String,
        corpus_type: CorpusType,
        language: String,
        parent_uuid: Option<Uuid>,
    ) -> Self {
        Self {
            corpus_name,
            corpus_uuid: Uuid::new_v4(),
            corpus_type,
            language,
            is_master: true,
            parent_uuid,
            child_uuids: Vec::new(),
            vocabulary: Vec::new(),
            original_vocabulary: Vec::new(),
            lemmatized_vocabulary: Vec::new(),
            vocabulary_to_index: HashMap::new(),
            vocabulary_hash: crate::util::content_hash(&Vec::<String>::new()).unwrap_or_default(),
        }
    }

    /// Original-cased form at `index`.
    pub fn original_word_at(&self, index: usize) -> Option<&str> {
        self.original_vocabulary.get(index).map(String::as_str)
    }

    /// Recompute `vocabulary_to_index`/`vocabulary_hash` after the parallel
    /// arrays have been mutated directly (used by aggregation).
    pub fn recompute_derived(&mut self) {
        self.vocabulary_to_index = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        self.vocabulary_hash = crate::util::content_hash(&self.vocabulary).unwrap_or_default();
    }
}

// =============================================================================
// SEARCH INDEX RESOURCES
// =============================================================================

/// Serialized trie index payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrieIndexResource {
    pub corpus_uuid: Uuid,
    pub vocabulary_hash: String,
    /// Normalized word -> original-cased form.
    pub original_forms: HashMap<String, String>,
    /// Normalized word -> observed frequency, used for prefix ranking.
    pub frequencies: HashMap<String, u64>,
}

/// Capability flags + pointers to subordinate indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexResource {
    pub corpus_uuid: Uuid,
    pub vocabulary_hash: String,
    pub trie_index_id: Option<String>,
    pub semantic_index_id: Option<String>,
    pub has_trie: bool,
    pub has_fuzzy: bool,
    pub has_semantic: bool,
}

/// Dense-vector index type, selected by vocabulary size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticIndexType {
    Flat,
    IvfPq,
}

/// Compressed embeddings blob + parallel word list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticIndexResource {
    pub corpus_uuid: Uuid,
    pub vocabulary_hash: String,
    pub model_name: String,
    pub embedding_dimension: usize,
    pub index_type: SemanticIndexType,
    /// zlib-compressed little-endian f32 buffer, row-major (words.len() x dim).
    pub compressed_embeddings: Vec<u8>,
    pub words: Vec<String>,
}

/// Canonical derived resource id for a corpus's trie/search/semantic indices,
/// e.g. `<corpus_uuid>:trie`.
pub fn derived_resource_id(corpus_uuid: &Uuid, suffix: &str) -> String {
    format!("{corpus_uuid}:{suffix}")
}

/// Canonical resource id for a synthesized dictionary entry, e.g. `<word>:synthesis`.
pub fn synthesis_resource_id(word: &str) -> String {
    format!("{word}:synthesis")
}
