//! Test utilities shared across unit and integration tests.
//!
//! This module is always compiled but hidden from documentation.
//! It provides canonical implementations of test helpers to avoid duplication.

#![doc(hidden)]

use crate::types::{ContentRef, Corpus, CorpusType, Namespace, Resource, ResourceType, StorageMode, VersionInfo};

/// Install a best-effort `tracing` subscriber for test output. Safe to call
/// from multiple tests; only the first call wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a leaf corpus from a handful of plain-string words, for tests that
/// just need some vocabulary to search or aggregate over.
pub fn make_corpus(name: &str, words: &[&str]) -> Corpus {
    Corpus::new_leaf(
        name.to_string(),
        CorpusType::Lexicon,
        "en".to_string(),
        None,
        words.iter().map(|w| w.to_string()).collect(),
    )
}

/// Build an empty master corpus with no children yet.
pub fn make_master_corpus(name: &str) -> Corpus {
    Corpus::new_master(name.to_string(), CorpusType::Language, "en".to_string(), None)
}

/// Build a minimal, self-consistent `Resource` wrapping arbitrary JSON
/// content as the first (`1.0.0`, latest, snapshot) version.
pub fn make_resource(resource_id: &str, resource_type: ResourceType, namespace: Namespace, content: serde_json::Value) -> Resource {
    let hash = crate::util::content_hash(&content).unwrap_or_default();
    Resource {
        resource_id: resource_id.to_string(),
        resource_type,
        namespace,
        version_info: VersionInfo {
            version: semver::Version::new(1, 0, 0),
            is_latest: true,
            previous_version: None,
            next_version: None,
            storage_mode: StorageMode::Snapshot,
            delta_base_version: None,
            data_hash: hash.clone(),
            created_at: 0,
        },
        content_hash: hash,
        content: ContentRef::Inline(content),
        metadata: Default::default(),
        tags: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_corpus_builds_sorted_vocabulary() {
        let corpus = make_corpus("sample", &["dog", "cat"]);
        assert_eq!(corpus.vocabulary, vec!["cat".to_string(), "dog".to_string()]);
        assert!(!corpus.is_master);
    }

    #[test]
    fn make_master_corpus_starts_empty() {
        let corpus = make_master_corpus("sample-master");
        assert!(corpus.is_master);
        assert!(corpus.vocabulary.is_empty());
    }

    #[test]
    fn make_resource_round_trips_content() {
        let resource = make_resource("test:synthesis", ResourceType::Dictionary, Namespace::Dictionary, serde_json::json!({"word": "test"}));
        assert_eq!(resource.content_value(), Some(&serde_json::json!({"word": "test"})));
        assert_eq!(resource.version_info.version, semver::Version::new(1, 0, 0));
    }
}
