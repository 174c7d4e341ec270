// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Probabilistic vocabulary membership pre-filter.
//!
//! A Bloom filter can say "definitely not in the vocabulary" in O(1) without
//! touching the trie, at the cost of an occasional false positive. Used as
//! the first gate in `search::Engine` so a miss on a 500k-word corpus never
//! walks the trie.

use xxhash_rust::xxh64::xxh64;

/// Fixed-size bit array with `k` independent xxHash64 hash functions, one per
/// seed `0..k`.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    capacity: usize,
    error_rate: f64,
    bit_count: usize,
    hash_count: usize,
    bits: Vec<u8>,
    item_count: usize,
}

/// Snapshot of filter health, mirroring what a caller would log or export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomStats {
    pub capacity: usize,
    pub item_count: usize,
    pub bit_count: usize,
    pub hash_count: usize,
    pub fill_rate: f64,
    pub target_error_rate: f64,
    pub estimated_error_rate: f64,
    pub memory_bytes: usize,
    pub memory_per_item: f64,
}

impl BloomFilter {
    /// Size the filter for `capacity` elements at `error_rate` false positives,
    /// using the standard `m = -n*ln(p) / (ln(2)^2)`, `k = m/n * ln(2)` formulas.
    pub fn new(capacity: usize, error_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let bit_count =
            (-(capacity as f64) * error_rate.ln() / (std::f64::consts::LN_2.powi(2))).ceil()
                as usize;
        let bit_count = bit_count.max(8);
        let hash_count = ((bit_count as f64 / capacity as f64) * std::f64::consts::LN_2).round()
            as usize;
        let hash_count = hash_count.max(1);

        Self {
            capacity,
            error_rate,
            bit_count,
            hash_count,
            bits: vec![0u8; bit_count.div_ceil(8)],
            item_count: 0,
        }
    }

    fn bit_positions(&self, item: &str) -> impl Iterator<Item = usize> + '_ {
        let bytes = item.as_bytes();
        (0..self.hash_count as u64).map(move |seed| (xxh64(bytes, seed) as usize) % self.bit_count)
    }

    fn set_bit(&mut self, position: usize) {
        self.bits[position / 8] |= 1 << (position % 8);
    }

    fn get_bit(&self, position: usize) -> bool {
        self.bits[position / 8] & (1 << (position % 8)) != 0
    }

    /// Register `item` as present.
    pub fn add(&mut self, item: &str) {
        let positions: Vec<usize> = self.bit_positions(item).collect();
        for position in positions {
            self.set_bit(position);
        }
        self.item_count += 1;
    }

    /// Register every item in `items`.
    pub fn add_many<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, items: I) {
        for item in items {
            self.add(item.as_ref());
        }
    }

    /// `true` means "maybe present"; `false` means "definitely absent".
    pub fn contains(&self, item: &str) -> bool {
        self.bit_positions(item).all(|pos| self.get_bit(pos))
    }

    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Current statistics, including an estimate of the actual (as opposed to
    /// target) false-positive rate given the observed fill level.
    pub fn stats(&self) -> BloomStats {
        let set_bits: u32 = self.bits.iter().map(|b| b.count_ones()).sum();
        let fill_rate = set_bits as f64 / self.bit_count as f64;

        let estimated_error_rate = if self.item_count > 0 {
            (1.0 - (-(self.hash_count as f64) * self.item_count as f64 / self.bit_count as f64)
                .exp())
            .powi(self.hash_count as i32)
        } else {
            0.0
        };

        BloomStats {
            capacity: self.capacity,
            item_count: self.item_count,
            bit_count: self.bit_count,
            hash_count: self.hash_count,
            fill_rate,
            target_error_rate: self.error_rate,
            estimated_error_rate,
            memory_bytes: self.bits.len(),
            memory_per_item: self.bits.len() as f64 / self.item_count.max(1) as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_false_negatives() {
        let words = vec!["apple", "banana", "cherry", "date", "elderberry"];
        let mut bloom = BloomFilter::new(words.len(), 0.01);
        bloom.add_many(words.clone());
        for word in words {
            assert!(bloom.contains(word));
        }
    }

    #[test]
    fn absent_word_is_usually_rejected() {
        let mut bloom = BloomFilter::new(1000, 0.01);
        bloom.add_many(vec!["apple", "banana"]);
        assert!(!bloom.contains("zzzznonexistentzzzz"));
    }

    #[test]
    fn stats_report_expected_shape() {
        let mut bloom = BloomFilter::new(100, 0.01);
        bloom.add("test");
        let stats = bloom.stats();
        assert_eq!(stats.item_count, 1);
        assert!(stats.hash_count >= 1);
        assert!(stats.fill_rate > 0.0);
    }

    #[test]
    fn empty_filter_has_zero_estimated_error_rate() {
        let bloom = BloomFilter::new(100, 0.01);
        assert_eq!(bloom.stats().estimated_error_rate, 0.0);
    }

    proptest! {
        #[test]
        fn every_added_word_is_always_contained(
            words in proptest::collection::hash_set("[a-z]{1,12}", 1..200)
        ) {
            let words: Vec<String> = words.into_iter().collect();
            let mut bloom = BloomFilter::new(words.len(), 0.01);
            bloom.add_many(words.clone());
            for word in &words {
                prop_assert!(bloom.contains(word));
            }
        }
    }
}
