// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Combines the bloom/trie/fuzzy/semantic primitives behind one
//! `search(query, mode, max_results, min_score)` call.
//!
//! `mode` selects which primitives run: `exact` only touches the bloom gate
//! and trie; `fuzzy` and `semantic` each run their own primitive; `smart`
//! cascades exact -> fuzzy -> semantic (when ready), merging results with
//! first-occurrence-wins de-duplication by word.

pub mod dedup;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::bloom::BloomFilter;
use crate::config::{BloomConfig, FuzzyConfig, SemanticConfig};
use crate::fuzzy::scoring::FuzzyMethod;
use crate::fuzzy::FuzzyIndex;
use crate::semantic::{EmbeddingProvider, SemanticIndex, SemanticStatus};
use crate::trie::TrieIndex;
use crate::util::normalize;
use dedup::ResultMerger;

/// Which retrieval method produced a [`Match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Exact,
    Fuzzy,
    Semantic,
}

/// Search mode, exactly the four named in the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Exact,
    Fuzzy,
    Semantic,
    Smart,
}

/// One ranked hit, regardless of which primitive produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub word: String,
    pub original_form: String,
    pub score: f64,
    pub source: MatchSource,
    /// Set when a `semantic` query silently fell back to fuzzy because the
    /// semantic index wasn't ready.
    pub degraded_from_semantic: bool,
}

/// Per-corpus bundle of search primitives. One instance per
/// `(corpus_uuid, vocabulary_hash)`.
pub struct Engine {
    bloom: BloomFilter,
    trie: TrieIndex,
    fuzzy: FuzzyIndex,
    /// Behind a lock so a background task can swap it in after the engine is
    /// already shared via `Arc<Engine>` — semantic construction never blocks
    /// a caller holding the engine for exact/fuzzy queries.
    semantic: RwLock<SemanticIndex>,
    fuzzy_config: FuzzyConfig,
}

impl Engine {
    /// Build every primitive from a corpus's parallel `(normalized, original)`
    /// vocabulary. Semantic is left disabled; call `build_semantic` to
    /// populate it asynchronously.
    pub fn build<'a, I>(words: I, bloom_config: BloomConfig, fuzzy_config: FuzzyConfig, semantic_config: SemanticConfig) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)> + Clone,
    {
        let mut bloom_words = Vec::new();
        let mut trie = TrieIndex::new(uuid::Uuid::nil(), String::new());
        let mut fuzzy = FuzzyIndex::new(fuzzy_config);

        for (normalized, original) in words.clone() {
            bloom_words.push(normalized.to_string());
            trie.insert(original, 1);
            fuzzy.insert(normalized, original);
        }

        let mut bloom = BloomFilter::new(bloom_words.len().max(1), bloom_config.target_false_positive_rate);
        bloom.add_many(bloom_words);

        Self {
            bloom,
            trie,
            fuzzy,
            semantic: RwLock::new(SemanticIndex::empty(semantic_config)),
            fuzzy_config,
        }
    }

    /// Build the semantic index in place. Callable on a shared `&Engine`
    /// (e.g. from inside a `tokio::spawn`ed task against an `Arc<Engine>`)
    /// so the hot-reload controller can kick this off without holding up
    /// the engine swap that makes trie/fuzzy available.
    pub fn build_semantic(&self, vocabulary: &[String], provider: &dyn EmbeddingProvider, config: &SemanticConfig) {
        self.semantic.write().rebuild(vocabulary, provider, config);
    }

    pub fn semantic_enabled(&self, config: &SemanticConfig) -> bool {
        config.enabled
    }

    pub fn semantic_building(&self) -> bool {
        self.semantic.read().status() == SemanticStatus::Building
    }

    pub fn semantic_ready(&self) -> bool {
        self.semantic.read().is_ready()
    }

    pub fn semantic_init_error(&self) -> Option<String> {
        self.semantic.read().init_error().map(str::to_string)
    }

    /// Bloom gate + trie exact lookup. Hot path: no heap allocation beyond
    /// the returned `Match` itself, and no corpus-mutating calls here.
    pub fn search_exact(&self, query: &str) -> Option<Match> {
        let normalized = normalize(query);
        if !self.bloom.contains(&normalized) {
            return None;
        }
        self.trie.get_exact(&normalized).map(|hit| Match {
            word: hit.normalized,
            original_form: hit.original_form,
            score: 1.0,
            source: MatchSource::Exact,
            degraded_from_semantic: false,
        })
    }

    pub fn search_fuzzy(&self, query: &str, max_results: usize, min_score: f64, method: FuzzyMethod) -> Vec<Match> {
        self.fuzzy
            .search(query, max_results, min_score, method)
            .into_iter()
            .map(|hit| Match {
                word: hit.word,
                original_form: hit.original_form,
                score: hit.score,
                source: MatchSource::Fuzzy,
                degraded_from_semantic: false,
            })
            .collect()
    }

    /// Semantic search; if the index isn't ready, falls back to fuzzy
    /// silently and tags the results `degraded_from_semantic`.
    pub fn search_semantic(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        max_results: usize,
        min_score: f64,
    ) -> Vec<Match> {
        let semantic = self.semantic.read();
        if let (true, Some(embedding)) = (semantic.is_ready(), query_embedding) {
            return semantic
                .search(embedding, max_results, min_score)
                .into_iter()
                .map(|hit| Match {
                    word: hit.word.clone(),
                    original_form: self
                        .trie
                        .get_exact(&hit.word)
                        .map(|m| m.original_form)
                        .unwrap_or(hit.word),
                    score: hit.score,
                    source: MatchSource::Semantic,
                    degraded_from_semantic: false,
                })
                .collect();
        }

        self.search_fuzzy(query, max_results, min_score, FuzzyMethod::Auto)
            .into_iter()
            .map(|mut m| {
                m.degraded_from_semantic = true;
                m
            })
            .collect()
    }

    /// `exact` first; if fewer than `max_results`, append fuzzy, then
    /// semantic (when ready), de-duplicated by word, first occurrence wins.
    pub fn search_smart(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        max_results: usize,
        min_score: f64,
    ) -> Vec<Match> {
        let mut merger = ResultMerger::new();

        if let Some(exact) = self.search_exact(query) {
            merger.push(exact);
        }

        if merger.len() < max_results {
            for m in self.search_fuzzy(query, max_results - merger.len(), min_score, FuzzyMethod::Auto) {
                merger.push(m);
            }
        }

        if merger.len() < max_results && self.semantic.read().is_ready() {
            if let Some(embedding) = query_embedding {
                for m in self
                    .semantic
                    .read()
                    .search(embedding, max_results - merger.len(), min_score)
                {
                    merger.push(Match {
                        word: m.word.clone(),
                        original_form: self
                            .trie
                            .get_exact(&m.word)
                            .map(|hit| hit.original_form)
                            .unwrap_or(m.word),
                        score: m.score,
                        source: MatchSource::Semantic,
                        degraded_from_semantic: false,
                    });
                }
            }
        }

        merger.into_sorted(max_results)
    }

    /// Dispatch on `mode`.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        query_embedding: Option<&[f32]>,
        max_results: usize,
        min_score: f64,
    ) -> Vec<Match> {
        match mode {
            SearchMode::Exact => self.search_exact(query).into_iter().collect(),
            SearchMode::Fuzzy => self.search_fuzzy(query, max_results, min_score, FuzzyMethod::Auto),
            SearchMode::Semantic => self.search_semantic(query, query_embedding, max_results, min_score),
            SearchMode::Smart => self.search_smart(query, query_embedding, max_results, min_score),
        }
    }
}

/// Sugar for callers only interested in the words a corpus contains, not the
/// full `Engine` (used by corpus aggregation sanity checks).
pub fn vocabulary_frequencies<'a, I: IntoIterator<Item = &'a str>>(words: I) -> HashMap<String, u64> {
    let mut freq = HashMap::new();
    for word in words {
        *freq.entry(normalize(word)).or_insert(0) += 1;
    }
    freq
}
