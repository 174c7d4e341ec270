// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Approximate word matching over a corpus's vocabulary.
//!
//! Scoring two strings directly is O(len) and cheap; the expensive part is
//! candidate selection across a 200k-word vocabulary. `FuzzyIndex` keeps a
//! length-bucket and a prefix-bucket map so a query only gets scored against
//! words it could plausibly match, then [`scoring::apply_corrections`] turns
//! the base similarity into the corrected score callers see.

pub mod levenshtein;
pub mod scoring;

use levenshtein::levenshtein_within;
use scoring::FuzzyMethod;
use std::collections::HashMap;

use crate::config::FuzzyConfig;
use crate::util::normalize;

/// A single fuzzy hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub word: String,
    pub original_form: String,
    pub score: f64,
    pub method: FuzzyMethod,
}

/// Candidate-pruning structure built alongside a corpus's trie.
pub struct FuzzyIndex {
    /// Normalized word -> original-cased form.
    words: HashMap<String, String>,
    /// Word length (chars) -> normalized words of that length.
    length_buckets: HashMap<usize, Vec<String>>,
    /// Short prefix -> normalized words sharing it.
    prefix_buckets: HashMap<String, Vec<String>>,
    config: FuzzyConfig,
}

impl FuzzyIndex {
    pub fn new(config: FuzzyConfig) -> Self {
        Self {
            words: HashMap::new(),
            length_buckets: HashMap::new(),
            prefix_buckets: HashMap::new(),
            config,
        }
    }

    /// Build from a corpus's parallel `(normalized, original)` vocabulary.
    pub fn build<'a, I>(words: I, config: FuzzyConfig) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::new(config);
        for (normalized, original) in words {
            index.insert(normalized, original);
        }
        index
    }

    pub fn insert(&mut self, normalized: &str, original_form: &str) {
        self.words
            .insert(normalized.to_string(), original_form.to_string());
        self.length_buckets
            .entry(normalized.chars().count())
            .or_default()
            .push(normalized.to_string());
        for prefix in prefix_keys(normalized) {
            self.prefix_buckets
                .entry(prefix)
                .or_default()
                .push(normalized.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Union of length-bucket and prefix-bucket candidates for `query`.
    fn candidates(&self, query: &str) -> Vec<&str> {
        let query_len = query.chars().count();
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for len in query_len.saturating_sub(self.config.length_tolerance)
            ..=query_len + self.config.length_tolerance
        {
            if let Some(bucket) = self.length_buckets.get(&len) {
                for word in bucket {
                    if seen.insert(word.as_str()) {
                        out.push(word.as_str());
                    }
                }
            }
        }

        for prefix in prefix_keys(query) {
            if let Some(bucket) = self.prefix_buckets.get(&prefix) {
                for word in bucket {
                    if seen.insert(word.as_str()) {
                        out.push(word.as_str());
                    }
                }
            }
        }

        out
    }

    /// Score `query` against every pruned candidate, apply the length/phrase
    /// correction table, filter by `min_score`, sort descending, cap at
    /// `max_results`.
    pub fn search(
        &self,
        query: &str,
        max_results: usize,
        min_score: f64,
        method: FuzzyMethod,
    ) -> Vec<FuzzyMatch> {
        let normalized_query = normalize(query);
        if normalized_query.is_empty() {
            return Vec::new();
        }

        let scorer = method.resolve(normalized_query.chars().count());
        // Max edits any candidate could plausibly need to clear min_score; a
        // cheap filter that's never wrong to over-approximate.
        let max_edits = normalized_query.chars().count().max(1);

        let mut matches: Vec<FuzzyMatch> = self
            .candidates(&normalized_query)
            .into_iter()
            .filter(|candidate| levenshtein_within(&normalized_query, candidate, max_edits))
            .filter_map(|candidate| {
                let base = scorer.score(&normalized_query, candidate);
                let corrected = scoring::apply_corrections(base, &normalized_query, candidate);
                if corrected < min_score {
                    return None;
                }
                Some(FuzzyMatch {
                    word: candidate.to_string(),
                    original_form: self.words.get(candidate).cloned().unwrap_or_default(),
                    score: corrected,
                    method: scorer.as_method(),
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.word.cmp(&b.word))
        });
        matches.dedup_by(|a, b| a.word == b.word);
        matches.truncate(max_results);
        matches
    }
}

/// 2-3 character prefixes of `word`, scaled to its length: short words
/// contribute a single short prefix, longer words contribute both lengths so
/// queries of either granularity can find them.
fn prefix_keys(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut keys = Vec::with_capacity(2);
    if chars.len() >= 2 {
        keys.push(chars[..2].iter().collect());
    }
    if chars.len() >= 3 {
        keys.push(chars[..3].iter().collect());
    }
    keys
}
