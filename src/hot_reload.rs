// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Lazily builds and refreshes the in-memory search engine for a set of
//! corpora, without ever blocking a query on a rebuild.
//!
//! One global engine is shared across requests, guarded by a single
//! `tokio::sync::Mutex`. `get_engine` returns the current engine immediately
//! if it's fresh; if the underlying corpora have changed (detected by a
//! cheap fingerprint, not a full vocabulary diff) it rebuilds trie/fuzzy
//! inline and kicks semantic embedding off as a non-blocking background
//! step.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{BloomConfig, FuzzyConfig, HotReloadConfig, SemanticConfig};
use crate::corpus::CorpusTreeManager;
use crate::error::{Result, StoreError};
use crate::semantic::EmbeddingProvider;
use crate::search::Engine;

/// `(corpus_name, vocabulary_hash, version)` — cheap enough to compare every
/// `check_interval` tick without touching the vocabulary itself.
type Fingerprint = Vec<(String, String, String)>;

/// Snapshot of controller state for health/diagnostics endpoints.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub engine_loaded: bool,
    pub initializing: bool,
    pub semantic_enabled: bool,
    pub semantic_building: bool,
    pub semantic_ready: bool,
    pub semantic_init_error: Option<String>,
    pub corpus_fingerprint: Vec<String>,
    pub check_interval: Duration,
}

struct Loaded {
    engine: Arc<Engine>,
    fingerprint: Fingerprint,
    checked_at: Instant,
}

/// Owns the single shared engine instance and the logic for when to rebuild
/// it.
pub struct SearchEngineManager {
    state: Mutex<Option<Loaded>>,
    initializing: std::sync::atomic::AtomicBool,
    corpora: Arc<CorpusTreeManager>,
    bloom_config: BloomConfig,
    fuzzy_config: FuzzyConfig,
    semantic_config: SemanticConfig,
    hot_reload_config: HotReloadConfig,
}

impl SearchEngineManager {
    pub fn new(
        corpora: Arc<CorpusTreeManager>,
        bloom_config: BloomConfig,
        fuzzy_config: FuzzyConfig,
        semantic_config: SemanticConfig,
        hot_reload_config: HotReloadConfig,
    ) -> Self {
        Self {
            state: Mutex::new(None),
            initializing: std::sync::atomic::AtomicBool::new(false),
            corpora,
            bloom_config,
            fuzzy_config,
            semantic_config,
            hot_reload_config,
        }
    }

    /// Returns the current engine for `languages`, building or rebuilding it
    /// if stale. `force_rebuild` skips the fingerprint check entirely.
    /// Semantic construction, if enabled, is kicked off in a spawned task
    /// after the trie/fuzzy engine is already published — a caller of this
    /// method is never blocked on embedding inference.
    pub async fn get_engine(
        &self,
        languages: &[String],
        provider: Option<Arc<dyn EmbeddingProvider>>,
        force_rebuild: bool,
    ) -> Result<Arc<Engine>> {
        let fingerprint = self.compute_fingerprint(languages)?;
        let mut guard = self.state.lock().await;

        let needs_rebuild = match &*guard {
            None => true,
            Some(loaded) => {
                force_rebuild
                    || (loaded.checked_at.elapsed() >= self.hot_reload_config.check_interval
                        && loaded.fingerprint != fingerprint)
            }
        };

        if !needs_rebuild {
            return Ok(guard.as_ref().unwrap().engine.clone());
        }

        self.initializing.store(true, std::sync::atomic::Ordering::SeqCst);
        let words = self.collect_vocabulary(languages)?;
        let engine = Engine::build(
            words.iter().map(|(n, o)| (n.as_str(), o.as_str())),
            self.bloom_config,
            self.fuzzy_config,
            self.semantic_config,
        );

        info!(languages = ?languages, "rebuilt trie/fuzzy search engine");
        let engine = Arc::new(engine);
        *guard = Some(Loaded {
            engine: engine.clone(),
            fingerprint,
            checked_at: Instant::now(),
        });
        self.initializing.store(false, std::sync::atomic::Ordering::SeqCst);
        drop(guard);

        // Persist each corpus's trie (and, once the background step below
        // finishes, its semantic index) so `delete_corpus`'s cascade has a
        // real `<corpus_uuid>:trie`/`:search`/`:semantic` to remove — spawned
        // so a slow store backend never adds latency to this call.
        for name in languages {
            if let Some(corpus) = self.corpora.get_by_name(name) {
                let corpora = self.corpora.clone();
                tokio::spawn(async move {
                    if let Err(err) = corpora.build_and_persist_indices(corpus.corpus_uuid, None).await {
                        tracing::warn!(corpus = %corpus.corpus_name, error = %err, "failed to persist derived trie/search indices");
                    }
                });
            }
        }

        if self.semantic_config.enabled {
            if let Some(provider) = provider {
                let vocabulary: Vec<String> = words.into_iter().map(|(n, _)| n).collect();
                let semantic_config = self.semantic_config;
                let engine_for_task = engine.clone();
                let corpora = self.corpora.clone();
                let languages = languages.to_vec();
                let provider_for_build = provider.clone();
                tokio::spawn(async move {
                    // CPU-bound embedding inference offloaded to a blocking
                    // worker thread; never runs on the caller's task.
                    let engine_for_build = engine_for_task.clone();
                    let _ = tokio::task::spawn_blocking(move || {
                        engine_for_build.build_semantic(&vocabulary, provider_for_build.as_ref(), &semantic_config);
                    })
                    .await;

                    if engine_for_task.semantic_ready() {
                        for name in &languages {
                            if let Some(corpus) = corpora.get_by_name(name) {
                                if let Err(err) = corpora
                                    .build_and_persist_indices(corpus.corpus_uuid, Some((provider.as_ref(), &semantic_config)))
                                    .await
                                {
                                    tracing::warn!(corpus = %corpus.corpus_name, error = %err, "failed to persist derived semantic index");
                                }
                            }
                        }
                    }
                });
            }
        }

        Ok(engine)
    }

    /// Drop the cached engine, forcing the next `get_engine` call to rebuild
    /// from scratch.
    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        *guard = None;
    }

    pub async fn get_status(&self) -> EngineStatus {
        let guard = self.state.lock().await;
        match &*guard {
            Some(loaded) => EngineStatus {
                engine_loaded: true,
                initializing: self.initializing.load(std::sync::atomic::Ordering::SeqCst),
                semantic_enabled: self.semantic_config.enabled,
                semantic_building: loaded.engine.semantic_building(),
                semantic_ready: loaded.engine.semantic_ready(),
                semantic_init_error: loaded.engine.semantic_init_error(),
                corpus_fingerprint: loaded.fingerprint.iter().map(|(name, _, _)| name.clone()).collect(),
                check_interval: self.hot_reload_config.check_interval,
            },
            None => EngineStatus {
                engine_loaded: false,
                initializing: self.initializing.load(std::sync::atomic::Ordering::SeqCst),
                semantic_enabled: self.semantic_config.enabled,
                semantic_building: false,
                semantic_ready: false,
                semantic_init_error: None,
                corpus_fingerprint: Vec::new(),
                check_interval: self.hot_reload_config.check_interval,
            },
        }
    }

    fn compute_fingerprint(&self, languages: &[String]) -> Result<Fingerprint> {
        languages
            .iter()
            .map(|name| {
                let corpus = self
                    .corpora
                    .get_by_name(name)
                    .ok_or_else(|| StoreError::CorpusNotFound(name.clone()))?;
                Ok((corpus.corpus_name, corpus.vocabulary_hash, corpus.corpus_uuid.to_string()))
            })
            .collect()
    }

    fn collect_vocabulary(&self, languages: &[String]) -> Result<Vec<(String, String)>> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for name in languages {
            let corpus = self
                .corpora
                .get_by_name(name)
                .ok_or_else(|| StoreError::CorpusNotFound(name.clone()))?;
            pairs.extend(corpus.vocabulary.iter().cloned().zip(corpus.original_vocabulary.iter().cloned()));
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VersioningConfig;
    use crate::types::CorpusType;
    use crate::version::store::InMemoryStore;
    use crate::version::VersionChainManager;

    struct NoopProvider;
    impl EmbeddingProvider for NoopProvider {
        fn embed(&self, words: &[String]) -> Vec<Vec<f32>> {
            words.iter().map(|_| vec![0.0]).collect()
        }
        fn model_name(&self) -> &str {
            "noop"
        }
    }

    fn manager_with_corpus(word: &str) -> (Arc<CorpusTreeManager>, String) {
        let versions = Arc::new(VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default()));
        let corpora = Arc::new(CorpusTreeManager::new(versions));
        corpora
            .save_corpus("english".into(), CorpusType::Language, "en".into(), None, false, vec![word.to_string()])
            .unwrap();
        (corpora, "english".to_string())
    }

    #[tokio::test]
    async fn semantic_build_does_not_block_engine_availability() {
        let (corpora, name) = manager_with_corpus("cat");
        let manager = SearchEngineManager::new(
            corpora,
            BloomConfig::default(),
            FuzzyConfig::default(),
            SemanticConfig { enabled: true, ..SemanticConfig::default() },
            HotReloadConfig::default(),
        );

        let engine = manager
            .get_engine(&[name], Some(Arc::new(NoopProvider)), false)
            .await
            .unwrap();

        // The trie/fuzzy engine is already usable even though semantic
        // construction was just kicked off in the background.
        assert!(engine.search_exact("cat").is_some());

        for _ in 0..50 {
            if engine.semantic_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.semantic_ready());
    }

    #[tokio::test]
    async fn first_call_builds_and_caches_engine() {
        let (corpora, name) = manager_with_corpus("cat");
        let manager = SearchEngineManager::new(
            corpora,
            BloomConfig::default(),
            FuzzyConfig::default(),
            SemanticConfig { enabled: false, ..SemanticConfig::default() },
            HotReloadConfig::default(),
        );
        let status_before = manager.get_status().await;
        assert!(!status_before.engine_loaded);

        let engine = manager.get_engine(&[name], None, false).await.unwrap();
        assert!(engine.search_exact("cat").is_some());

        let status_after = manager.get_status().await;
        assert!(status_after.engine_loaded);
    }

    #[tokio::test]
    async fn force_rebuild_reflects_vocabulary_changes() {
        let (corpora, name) = manager_with_corpus("cat");
        let manager = SearchEngineManager::new(
            corpora.clone(),
            BloomConfig::default(),
            FuzzyConfig::default(),
            SemanticConfig { enabled: false, ..SemanticConfig::default() },
            HotReloadConfig::default(),
        );
        let first = manager.get_engine(&[name.clone()], None, false).await.unwrap();
        assert!(first.search_exact("dog").is_none());

        let corpus = corpora.get_by_name(&name).unwrap();
        corpora
            .update_corpus(corpus.corpus_uuid, Some(vec!["cat".into(), "dog".into()]))
            .unwrap();

        let rebuilt = manager.get_engine(&[name], None, true).await.unwrap();
        assert!(rebuilt.search_exact("dog").is_some());
    }

    #[tokio::test]
    async fn reset_forces_rebuild_on_next_call() {
        let (corpora, name) = manager_with_corpus("cat");
        let manager = SearchEngineManager::new(
            corpora,
            BloomConfig::default(),
            FuzzyConfig::default(),
            SemanticConfig { enabled: false, ..SemanticConfig::default() },
            HotReloadConfig::default(),
        );
        manager.get_engine(&[name.clone()], None, false).await.unwrap();
        manager.reset().await;
        let status = manager.get_status().await;
        assert!(!status.engine_loaded);
        manager.get_engine(&[name], None, false).await.unwrap();
        let status = manager.get_status().await;
        assert!(status.engine_loaded);
    }
}
