// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The corpus tree: parent/child vocabulary containers, aggregation, and
//! cascade deletion of derived search indices.
//!
//! The parent/child graph is a set of UUID references, not pointers — child
//! edges are weak (lookups, not lifetime). Ownership is single-rooted per
//! corpus record; deletion never follows the down edge into children.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SemanticConfig;
use crate::error::{Result, StoreError};
use crate::semantic::{EmbeddingProvider, SemanticIndex};
use crate::trie::TrieIndex;
use crate::types::{derived_resource_id, Corpus, CorpusType, Namespace, ResourceType, SearchIndexResource};
use crate::version::{SaveConfig, VersionChainManager};

/// Fetches the vocabulary for one language source descriptor (e.g. a
/// dictionary provider's full word list for a given language code). An
/// external collaborator; this crate ships no implementation.
#[async_trait]
pub trait LanguageSourceConnector: Send + Sync {
    async fn fetch_vocabulary(&self, source_descriptor: &str) -> Result<Vec<String>>;
}

/// Owns the corpus registry and coordinates aggregation/cascade-delete
/// against the version chain manager for each corpus's derived indices.
pub struct CorpusTreeManager {
    corpora: DashMap<Uuid, Corpus>,
    name_index: DashMap<String, Uuid>,
    versions: Arc<VersionChainManager>,
}

impl CorpusTreeManager {
    pub fn new(versions: Arc<VersionChainManager>) -> Self {
        Self {
            corpora: DashMap::new(),
            name_index: DashMap::new(),
            versions,
        }
    }

    /// Create and register a leaf or master corpus.
    pub fn save_corpus(
        &self,
        name: String,
        corpus_type: CorpusType,
        language: String,
        parent_uuid: Option<Uuid>,
        is_master: bool,
        original_words: Vec<String>,
    ) -> Result<Corpus> {
        if let Some(parent) = parent_uuid {
            if !self.corpora.contains_key(&parent) {
                return Err(StoreError::CorpusNotFound(parent.to_string()));
            }
        }

        let corpus = if is_master {
            Corpus::new_master(name.clone(), corpus_type, language, parent_uuid)
        } else {
            Corpus::new_leaf(name.clone(), corpus_type, language, parent_uuid, original_words)
        };

        if let Some(parent) = parent_uuid {
            self.link_child(parent, corpus.corpus_uuid)?;
        }

        self.name_index.insert(name, corpus.corpus_uuid);
        self.corpora.insert(corpus.corpus_uuid, corpus.clone());
        Ok(corpus)
    }

    /// Replace a corpus's vocabulary (for leaves) in place.
    pub fn update_corpus(&self, corpus_uuid: Uuid, original_words: Option<Vec<String>>) -> Result<Corpus> {
        let mut entry = self
            .corpora
            .get_mut(&corpus_uuid)
            .ok_or_else(|| StoreError::CorpusNotFound(corpus_uuid.to_string()))?;

        if let Some(words) = original_words {
            if entry.is_master {
                return Err(StoreError::ValidationError(
                    "cannot set vocabulary directly on a master corpus".to_string(),
                ));
            }
            let rebuilt = Corpus::new_leaf(
                entry.corpus_name.clone(),
                entry.corpus_type,
                entry.language.clone(),
                entry.parent_uuid,
                words,
            );
            entry.vocabulary = rebuilt.vocabulary;
            entry.original_vocabulary = rebuilt.original_vocabulary;
            entry.lemmatized_vocabulary = rebuilt.lemmatized_vocabulary;
            entry.recompute_derived();
        }

        Ok(entry.clone())
    }

    pub fn get_by_uuid(&self, corpus_uuid: Uuid) -> Option<Corpus> {
        self.corpora.get(&corpus_uuid).map(|e| e.clone())
    }

    pub fn get_by_name(&self, corpus_name: &str) -> Option<Corpus> {
        self.name_index
            .get(corpus_name)
            .and_then(|uuid| self.corpora.get(&uuid).map(|e| e.clone()))
    }

    /// Cycle prevention: refuse to link `child` under `parent` if `parent` is
    /// already an ancestor of `child`, or if they're the same node.
    fn link_child(&self, parent: Uuid, child: Uuid) -> Result<()> {
        if parent == child {
            return Err(StoreError::CycleRejected {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if self.is_ancestor(child, parent) {
            return Err(StoreError::CycleRejected {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        if let Some(mut parent_entry) = self.corpora.get_mut(&parent) {
            if !parent_entry.child_uuids.contains(&child) {
                parent_entry.child_uuids.push(child);
            }
        }
        Ok(())
    }

    /// Walk `node`'s `parent_uuid` chain, bounded by the corpus count, to
    /// check whether `candidate` appears among its ancestors.
    fn is_ancestor(&self, candidate: Uuid, node: Uuid) -> bool {
        let mut current = Some(node);
        let mut steps = 0usize;
        let bound = self.corpora.len() + 1;
        while let Some(uuid) = current {
            if uuid == candidate {
                return true;
            }
            steps += 1;
            if steps > bound {
                // Would indicate an existing cycle snuck in; treat as found
                // rather than loop forever.
                return true;
            }
            current = self.corpora.get(&uuid).and_then(|e| e.parent_uuid);
        }
        false
    }

    /// Explicitly link an existing child under an existing parent.
    pub fn update_parent(&self, parent_uuid: Uuid, child_uuid: Uuid) -> Result<()> {
        if !self.corpora.contains_key(&parent_uuid) {
            return Err(StoreError::CorpusNotFound(parent_uuid.to_string()));
        }
        if !self.corpora.contains_key(&child_uuid) {
            return Err(StoreError::CorpusNotFound(child_uuid.to_string()));
        }
        self.link_child(parent_uuid, child_uuid)?;
        if let Some(mut child) = self.corpora.get_mut(&child_uuid) {
            child.parent_uuid = Some(parent_uuid);
        }
        Ok(())
    }

    /// `sort(⋃ children.vocabulary)`. When `update_parent` and the corpus is
    /// a master, writes the result back and bumps its own derived fields. If
    /// a child is unreachable, the parent's vocabulary is left untouched
    /// (`AggregationPartialFailure`).
    pub fn aggregate_vocabularies(&self, corpus_uuid: Uuid, update_parent: bool) -> Result<Vec<String>> {
        let corpus = self
            .corpora
            .get(&corpus_uuid)
            .ok_or_else(|| StoreError::CorpusNotFound(corpus_uuid.to_string()))?
            .clone();

        let mut pairs: Vec<(String, String)> = Vec::new();
        for child_uuid in &corpus.child_uuids {
            let child = self.corpora.get(child_uuid).ok_or_else(|| {
                StoreError::AggregationPartialFailure {
                    child_uuid: child_uuid.to_string(),
                }
            })?;
            pairs.extend(
                child
                    .vocabulary
                    .iter()
                    .cloned()
                    .zip(child.original_vocabulary.iter().cloned()),
            );
        }

        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);
        let aggregated: Vec<String> = pairs.iter().map(|(n, _)| n.clone()).collect();

        if update_parent && corpus.is_master {
            if let Some(mut entry) = self.corpora.get_mut(&corpus_uuid) {
                entry.vocabulary = pairs.iter().map(|(n, _)| n.clone()).collect();
                entry.original_vocabulary = pairs.iter().map(|(_, o)| o.clone()).collect();
                entry.lemmatized_vocabulary = entry.vocabulary.clone();
                entry.recompute_derived();
            }
        }

        Ok(aggregated)
    }

    /// Build this corpus's trie index (and, if an embedding provider is
    /// given, its semantic index) and persist both as versioned resources,
    /// along with a `SearchIndexResource` manifest recording which ones
    /// exist. Without this, `delete_corpus`'s cascade has nothing real to
    /// delete — this is the counterpart that makes `<corpus_uuid>:trie`,
    /// `<corpus_uuid>:semantic`, and `<corpus_uuid>:search` exist in the
    /// first place.
    pub async fn build_and_persist_indices(
        &self,
        corpus_uuid: Uuid,
        semantic: Option<(&dyn EmbeddingProvider, &SemanticConfig)>,
    ) -> Result<SearchIndexResource> {
        let corpus = self
            .get_by_uuid(corpus_uuid)
            .ok_or_else(|| StoreError::CorpusNotFound(corpus_uuid.to_string()))?;

        let mut trie = TrieIndex::new(corpus_uuid, corpus.vocabulary_hash.clone());
        for original in &corpus.original_vocabulary {
            trie.insert(original, 1);
        }
        let trie_resource = trie.to_resource(&corpus.vocabulary_hash)?;
        let trie_id = derived_resource_id(&corpus_uuid, "trie");
        self.versions
            .save(
                &trie_id,
                ResourceType::Trie,
                Namespace::Corpus,
                serde_json::to_value(&trie_resource).map_err(|e| StoreError::Other(e.to_string()))?,
                SaveConfig::default(),
            )
            .await?;

        let mut semantic_index_id = None;
        if let Some((provider, semantic_config)) = semantic {
            let mut index = SemanticIndex::empty(*semantic_config);
            index.rebuild(&corpus.vocabulary, provider, semantic_config);
            if index.is_ready() {
                let resource = index.to_resource(corpus_uuid, corpus.vocabulary_hash.clone())?;
                let id = derived_resource_id(&corpus_uuid, &format!("semantic:{}", provider.model_name()));
                self.versions
                    .save(
                        &id,
                        ResourceType::Semantic,
                        Namespace::Semantic,
                        serde_json::to_value(&resource).map_err(|e| StoreError::Other(e.to_string()))?,
                        SaveConfig::default(),
                    )
                    .await?;
                semantic_index_id = Some(id);
            } else {
                warn!(corpus_uuid = %corpus_uuid, error = ?index.init_error(), "semantic index build failed, skipping persistence");
            }
        }

        let search_resource = SearchIndexResource {
            corpus_uuid,
            vocabulary_hash: corpus.vocabulary_hash.clone(),
            trie_index_id: Some(trie_id),
            semantic_index_id: semantic_index_id.clone(),
            has_trie: true,
            has_fuzzy: true,
            has_semantic: semantic_index_id.is_some(),
        };
        self.versions
            .save(
                &derived_resource_id(&corpus_uuid, "search"),
                ResourceType::Search,
                Namespace::Corpus,
                serde_json::to_value(&search_resource).map_err(|e| StoreError::Other(e.to_string()))?,
                SaveConfig::default(),
            )
            .await?;

        info!(corpus_uuid = %corpus_uuid, has_semantic = search_resource.has_semantic, "persisted derived search indices");
        Ok(search_resource)
    }

    /// Cascade-delete a corpus's derived indices (semantic, trie, search,
    /// keyed by `corpus_uuid`), then the corpus itself. Children become
    /// orphans (`parent_uuid <- None`); they are never cascade-deleted.
    ///
    /// The semantic index id carries its model name
    /// (`<corpus_uuid>:semantic:<model_name>`), so it can't be derived from
    /// `corpus_uuid` alone — the search manifest is read first to learn the
    /// real trie/semantic ids it points at.
    pub async fn delete_corpus(&self, corpus_uuid: Uuid) -> Result<bool> {
        let Some((_, corpus)) = self.corpora.remove(&corpus_uuid) else {
            return Ok(false);
        };
        self.name_index.remove(&corpus.corpus_name);

        let search_id = derived_resource_id(&corpus_uuid, "search");
        let manifest = self
            .versions
            .get_latest(&search_id, ResourceType::Search, true)
            .await?
            .and_then(|resource| resource.content_value().cloned())
            .and_then(|value| serde_json::from_value::<SearchIndexResource>(value).ok());

        if let Some(manifest) = &manifest {
            if let Some(semantic_id) = &manifest.semantic_index_id {
                self.delete_latest_version(semantic_id, ResourceType::Semantic).await?;
            }
            if let Some(trie_id) = &manifest.trie_index_id {
                self.delete_latest_version(trie_id, ResourceType::Trie).await?;
            }
        }
        self.delete_latest_version(&search_id, ResourceType::Search).await?;

        for child_uuid in &corpus.child_uuids {
            if let Some(mut child) = self.corpora.get_mut(child_uuid) {
                child.parent_uuid = None;
            }
        }

        if let Some(parent_uuid) = corpus.parent_uuid {
            if let Some(mut parent) = self.corpora.get_mut(&parent_uuid) {
                parent.child_uuids.retain(|c| *c != corpus_uuid);
            }
        }

        info!(corpus_uuid = %corpus_uuid, "cascade-deleted corpus and its derived indices");
        Ok(true)
    }

    async fn delete_latest_version(&self, resource_id: &str, resource_type: ResourceType) -> Result<()> {
        if let Some(latest) = self.versions.get_latest(resource_id, resource_type, true).await? {
            self.versions
                .delete_version(resource_id, resource_type, &latest.version_info.version)
                .await?;
        }
        Ok(())
    }

    /// Fetch a language source's vocabulary via `connector` and register it
    /// as a new leaf child under `parent_uuid`.
    pub async fn add_language_source(
        &self,
        parent_uuid: Uuid,
        source_descriptor: &str,
        language: String,
        connector: Arc<dyn LanguageSourceConnector>,
    ) -> Result<Uuid> {
        if !self.corpora.contains_key(&parent_uuid) {
            return Err(StoreError::CorpusNotFound(parent_uuid.to_string()));
        }

        let words = connector.fetch_vocabulary(source_descriptor).await?;
        let child = self.save_corpus(
            format!("{parent_uuid}:{source_descriptor}"),
            CorpusType::Language,
            language,
            Some(parent_uuid),
            false,
            words,
        )?;
        Ok(child.corpus_uuid)
    }

    /// Defensive sweep: any corpus record where `self.uuid ∈ self.child_uuids`
    /// is cleaned in place, with a log event, rather than left to corrupt
    /// cycle detection.
    pub fn clean_self_referencing_children(&self) {
        for mut entry in self.corpora.iter_mut() {
            let uuid = entry.corpus_uuid;
            if entry.child_uuids.contains(&uuid) {
                warn!(corpus_uuid = %uuid, "removed self-referencing child entry");
                entry.child_uuids.retain(|c| *c != uuid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::store::InMemoryStore;
    use crate::config::VersioningConfig;

    fn manager() -> CorpusTreeManager {
        let versions = Arc::new(VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default()));
        CorpusTreeManager::new(versions)
    }

    #[test]
    fn save_corpus_registers_by_name_and_uuid() {
        let manager = manager();
        let corpus = manager
            .save_corpus("english".into(), CorpusType::Language, "en".into(), None, false, vec!["cat".into(), "dog".into()])
            .unwrap();
        assert!(manager.get_by_uuid(corpus.corpus_uuid).is_some());
        assert!(manager.get_by_name("english").is_some());
    }

    #[test]
    fn direct_cycle_is_rejected() {
        let manager = manager();
        let parent = manager
            .save_corpus("parent".into(), CorpusType::Language, "en".into(), None, true, vec![])
            .unwrap();
        let err = manager.update_parent(parent.corpus_uuid, parent.corpus_uuid).unwrap_err();
        assert!(matches!(err, StoreError::CycleRejected { .. }));
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let manager = manager();
        let root = manager
            .save_corpus("root".into(), CorpusType::Language, "en".into(), None, true, vec![])
            .unwrap();
        let child = manager
            .save_corpus("child".into(), CorpusType::Language, "en".into(), Some(root.corpus_uuid), true, vec![])
            .unwrap();
        let err = manager.update_parent(child.corpus_uuid, root.corpus_uuid).unwrap_err();
        assert!(matches!(err, StoreError::CycleRejected { .. }));
    }

    #[test]
    fn aggregation_unions_and_sorts_children() {
        let manager = manager();
        let master = manager
            .save_corpus("master".into(), CorpusType::Language, "en".into(), None, true, vec![])
            .unwrap();
        manager
            .save_corpus("c1".into(), CorpusType::Lexicon, "en".into(), Some(master.corpus_uuid), false, vec!["banana".into()])
            .unwrap();
        manager
            .save_corpus("c2".into(), CorpusType::Lexicon, "en".into(), Some(master.corpus_uuid), false, vec!["apple".into()])
            .unwrap();

        let aggregated = manager.aggregate_vocabularies(master.corpus_uuid, true).unwrap();
        assert_eq!(aggregated, vec!["apple".to_string(), "banana".to_string()]);
        let refreshed = manager.get_by_uuid(master.corpus_uuid).unwrap();
        assert_eq!(refreshed.vocabulary, vec!["apple".to_string(), "banana".to_string()]);
    }

    struct StaticConnector;

    #[async_trait]
    impl LanguageSourceConnector for StaticConnector {
        async fn fetch_vocabulary(&self, _source_descriptor: &str) -> Result<Vec<String>> {
            Ok(vec!["bonjour".into(), "chat".into()])
        }
    }

    #[tokio::test]
    async fn add_language_source_registers_fetched_vocabulary_as_child() {
        let manager = manager();
        let parent = manager
            .save_corpus("french".into(), CorpusType::Language, "fr".into(), None, true, vec![])
            .unwrap();

        let child_uuid = manager
            .add_language_source(parent.corpus_uuid, "wiktionary-fr", "fr".into(), Arc::new(StaticConnector))
            .await
            .unwrap();

        let child = manager.get_by_uuid(child_uuid).unwrap();
        assert_eq!(child.vocabulary, vec!["bonjour".to_string(), "chat".to_string()]);
        assert_eq!(child.parent_uuid, Some(parent.corpus_uuid));

        let refreshed_parent = manager.get_by_uuid(parent.corpus_uuid).unwrap();
        assert_eq!(refreshed_parent.child_uuids, vec![child_uuid]);
    }

    #[tokio::test]
    async fn cascade_delete_orphans_children_without_removing_them() {
        let manager = manager();
        let parent = manager
            .save_corpus("parent".into(), CorpusType::Language, "en".into(), None, true, vec![])
            .unwrap();
        let child = manager
            .save_corpus("child".into(), CorpusType::Lexicon, "en".into(), Some(parent.corpus_uuid), false, vec!["word".into()])
            .unwrap();

        let deleted = manager.delete_corpus(parent.corpus_uuid).await.unwrap();
        assert!(deleted);
        assert!(manager.get_by_uuid(parent.corpus_uuid).is_none());

        let surviving_child = manager.get_by_uuid(child.corpus_uuid).unwrap();
        assert_eq!(surviving_child.parent_uuid, None);
    }

    struct StubEmbeddingProvider;

    impl crate::semantic::EmbeddingProvider for StubEmbeddingProvider {
        fn embed(&self, words: &[String]) -> Vec<Vec<f32>> {
            words.iter().map(|_| vec![1.0, 0.0]).collect()
        }
        fn model_name(&self) -> &str {
            "stub-v1"
        }
    }

    #[tokio::test]
    async fn build_and_persist_indices_creates_trie_search_and_semantic_resources() {
        let manager = manager();
        let corpus = manager
            .save_corpus("english".into(), CorpusType::Language, "en".into(), None, false, vec!["cat".into(), "dog".into()])
            .unwrap();

        let semantic_config = crate::config::SemanticConfig::default();
        let manifest = manager
            .build_and_persist_indices(corpus.corpus_uuid, Some((&StubEmbeddingProvider, &semantic_config)))
            .await
            .unwrap();
        assert!(manifest.has_trie);
        assert!(manifest.has_semantic);

        let trie_id = derived_resource_id(&corpus.corpus_uuid, "trie");
        assert!(manager.versions.get_latest(&trie_id, ResourceType::Trie, true).await.unwrap().is_some());

        let semantic_id = manifest.semantic_index_id.clone().expect("semantic index was built");
        assert_eq!(semantic_id, derived_resource_id(&corpus.corpus_uuid, "semantic:stub-v1"));
        assert!(manager.versions.get_latest(&semantic_id, ResourceType::Semantic, true).await.unwrap().is_some());

        let search_id = derived_resource_id(&corpus.corpus_uuid, "search");
        assert!(manager.versions.get_latest(&search_id, ResourceType::Search, true).await.unwrap().is_some());
    }

    /// Two models over the same corpus must not collide on one resource id.
    #[tokio::test]
    async fn semantic_index_ids_are_scoped_by_model_name() {
        struct OtherEmbeddingProvider;
        impl crate::semantic::EmbeddingProvider for OtherEmbeddingProvider {
            fn embed(&self, words: &[String]) -> Vec<Vec<f32>> {
                words.iter().map(|_| vec![0.0, 1.0]).collect()
            }
            fn model_name(&self) -> &str {
                "other-v2"
            }
        }

        let manager = manager();
        let corpus = manager
            .save_corpus("english".into(), CorpusType::Language, "en".into(), None, false, vec!["cat".into(), "dog".into()])
            .unwrap();
        let semantic_config = crate::config::SemanticConfig::default();

        let first = manager
            .build_and_persist_indices(corpus.corpus_uuid, Some((&StubEmbeddingProvider, &semantic_config)))
            .await
            .unwrap();
        let second = manager
            .build_and_persist_indices(corpus.corpus_uuid, Some((&OtherEmbeddingProvider, &semantic_config)))
            .await
            .unwrap();

        assert_ne!(first.semantic_index_id, second.semantic_index_id);
        assert!(manager
            .versions
            .get_latest(&first.semantic_index_id.unwrap(), ResourceType::Semantic, true)
            .await
            .unwrap()
            .is_some());
        assert!(manager
            .versions
            .get_latest(&second.semantic_index_id.unwrap(), ResourceType::Semantic, true)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn cascade_delete_removes_persisted_derived_indices() {
        let manager = manager();
        let corpus = manager
            .save_corpus("english".into(), CorpusType::Language, "en".into(), None, false, vec!["cat".into()])
            .unwrap();
        manager.build_and_persist_indices(corpus.corpus_uuid, None).await.unwrap();

        let trie_id = derived_resource_id(&corpus.corpus_uuid, "trie");
        assert!(manager.versions.get_latest(&trie_id, ResourceType::Trie, true).await.unwrap().is_some());

        manager.delete_corpus(corpus.corpus_uuid).await.unwrap();
        assert!(manager.versions.get_latest(&trie_id, ResourceType::Trie, true).await.unwrap().is_none());
        let search_id = derived_resource_id(&corpus.corpus_uuid, "search");
        assert!(manager.versions.get_latest(&search_id, ResourceType::Search, true).await.unwrap().is_none());
    }
}
