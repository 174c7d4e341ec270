// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Exact and prefix lookup over a corpus's vocabulary.
//!
//! Built once per `(corpus_uuid, vocabulary_hash)` pair and persisted as a
//! `TrieIndexResource`. Walking a path character-by-character rather than
//! hashing the whole word is what makes prefix search (`prefix_search`)
//! possible at all; exact lookup (`contains`) is a side effect of the same
//! structure.

use crate::error::{Result, StoreError};
use crate::types::TrieIndexResource;
use crate::util::normalize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    /// Set only at the node terminating a complete word.
    terminal: Option<TerminalInfo>,
}

#[derive(Debug, Clone)]
struct TerminalInfo {
    original_form: String,
    frequency: u64,
}

/// One ranked hit from `prefix_search`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrieMatch {
    pub normalized: String,
    pub original_form: String,
    pub frequency: u64,
}

/// In-memory trie over a corpus's normalized vocabulary, one `HashMap` entry
/// per child character — no edge compression; vocabulary sizes here don't
/// make the extra bookkeeping worth it.
///
/// Invariant: every terminal node's accumulated path equals some entry of
/// `original_forms`'s key set; `contains(w) == true` iff `w` (normalized) was
/// passed to `insert`.
#[derive(Debug)]
pub struct TrieIndex {
    corpus_uuid: Uuid,
    vocabulary_hash: String,
    root: TrieNode,
    len: usize,
}

impl TrieIndex {
    pub fn new(corpus_uuid: Uuid, vocabulary_hash: String) -> Self {
        Self {
            corpus_uuid,
            vocabulary_hash,
            root: TrieNode::default(),
            len: 0,
        }
    }

    /// Insert `original_form`, normalizing it for the path key. Re-inserting
    /// an existing word accumulates its frequency rather than resetting it.
    pub fn insert(&mut self, original_form: &str, frequency: u64) {
        let normalized = normalize(original_form);
        let mut node = &mut self.root;
        for ch in normalized.chars() {
            node = node.children.entry(ch).or_default();
        }
        match &mut node.terminal {
            Some(info) => info.frequency += frequency,
            None => {
                node.terminal = Some(TerminalInfo {
                    original_form: original_form.to_string(),
                    frequency,
                });
                self.len += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exact membership test on the normalized form.
    pub fn contains(&self, word: &str) -> bool {
        self.find_node(&normalize(word))
            .is_some_and(|node| node.terminal.is_some())
    }

    /// Original-cased form for an exact normalized match, if present.
    pub fn get_exact(&self, word: &str) -> Option<TrieMatch> {
        let node = self.find_node(&normalize(word))?;
        node.terminal.as_ref().map(|info| TrieMatch {
            normalized: normalize(word),
            original_form: info.original_form.clone(),
            frequency: info.frequency,
        })
    }

    fn find_node(&self, normalized: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for ch in normalized.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    /// All words beginning with `prefix` (normalized), ranked by descending
    /// frequency then lexicographically, capped at `limit`.
    pub fn prefix_search(&self, prefix: &str, limit: usize) -> Vec<TrieMatch> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let normalized_prefix = normalize(prefix);
        let Some(start) = self.find_node(&normalized_prefix) else {
            return Vec::new();
        };

        let mut matches = Vec::new();
        collect_terminals(start, &normalized_prefix, &mut matches);
        matches.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.normalized.cmp(&b.normalized))
        });
        matches.truncate(limit);
        matches
    }

    /// Rebuild from a persisted `TrieIndexResource`, verifying the vocabulary
    /// hash it was built against still matches the corpus it claims to index.
    pub fn from_resource(resource: &TrieIndexResource) -> Result<Self> {
        let mut trie = Self::new(resource.corpus_uuid, resource.vocabulary_hash.clone());
        for (normalized, original_form) in &resource.original_forms {
            let frequency = resource.frequencies.get(normalized).copied().unwrap_or(0);
            trie.insert(original_form, frequency);
        }
        Ok(trie)
    }

    /// Serialize to the persisted shape, verifying freshness against the
    /// corpus's current `vocabulary_hash` before the caller saves it.
    pub fn to_resource(&self, expected_vocabulary_hash: &str) -> Result<TrieIndexResource> {
        if self.vocabulary_hash != expected_vocabulary_hash {
            return Err(StoreError::ContentHashMismatch {
                resource_id: self.corpus_uuid.to_string(),
                version: "trie".to_string(),
                expected: expected_vocabulary_hash.to_string(),
                actual: self.vocabulary_hash.clone(),
            });
        }

        let mut original_forms = HashMap::new();
        let mut frequencies = HashMap::new();
        let mut matches = Vec::new();
        collect_terminals(&self.root, "", &mut matches);
        for m in matches {
            original_forms.insert(m.normalized.clone(), m.original_form);
            frequencies.insert(m.normalized, m.frequency);
        }

        Ok(TrieIndexResource {
            corpus_uuid: self.corpus_uuid,
            vocabulary_hash: self.vocabulary_hash.clone(),
            original_forms,
            frequencies,
        })
    }
}

fn collect_terminals(node: &TrieNode, prefix: &str, out: &mut Vec<TrieMatch>) {
    if let Some(info) = &node.terminal {
        out.push(TrieMatch {
            normalized: prefix.to_string(),
            original_form: info.original_form.clone(),
            frequency: info.frequency,
        });
    }
    for (ch, child) in &node.children {
        let mut next = String::with_capacity(prefix.len() + ch.len_utf8());
        next.push_str(prefix);
        next.push(*ch);
        collect_terminals(child, &next, out);
    }
}
