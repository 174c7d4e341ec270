// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Single source of truth for merging results across search primitives.
//!
//! `smart` mode calls `exact`, then `fuzzy`, then `semantic` in sequence;
//! each stage may rediscover a word the previous stage already returned.
//! `ResultMerger` keeps first occurrence (exact beats fuzzy beats semantic,
//! since that's call order) and sorts by score only at the end.

use super::Match;
use std::collections::HashSet;

/// Accumulates `Match`es across cascaded search stages, keeping the first
/// occurrence of each word.
pub struct ResultMerger {
    seen: HashSet<String>,
    matches: Vec<Match>,
}

impl ResultMerger {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            matches: Vec::new(),
        }
    }

    /// Insert `m` unless its word was already seen from an earlier stage.
    pub fn push(&mut self, m: Match) {
        if self.seen.insert(m.word.clone()) {
            self.matches.push(m);
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Sort by score descending (stable, so first-occurrence order survives
    /// ties) and cap at `max_results`.
    pub fn into_sorted(mut self, max_results: usize) -> Vec<Match> {
        self.matches
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        self.matches.truncate(max_results);
        self.matches
    }
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new()
    }
}
