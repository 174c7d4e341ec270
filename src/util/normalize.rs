//! Word normalization for search.
//!
//! NFC-normalize, lowercase, and strip combining marks, so `"café"` and
//! `"cafe"` normalize to the same key. Diacritic-preserving forms are kept
//! separately in `Corpus::original_vocabulary` so the original casing and
//! diacritics survive for display.

use unicode_normalization::UnicodeNormalization;

/// Normalize a word or phrase for search: NFC, strip diacritics, lowercase,
/// collapse whitespace.
pub fn normalize(value: &str) -> String {
    value
        .nfc()
        .collect::<String>()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip diacritics only, preserving case — used when building an
/// ASCII-normalized prefix-bucket key so a diacritic form and its ASCII
/// equivalent (`café` / `cafe`) can share a secondary index entry.
pub fn strip_diacritics(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}' |
        '\u{1DC0}'..='\u{1DFF}' |
        '\u{20D0}'..='\u{20FF}' |
        '\u{FE20}'..='\u{FE2F}'
    )
}

/// Common prefix length in Unicode scalar values (not bytes).
pub fn common_prefix_len_chars(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(ca, cb)| ca == cb)
        .count()
}
