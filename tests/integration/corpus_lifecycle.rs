//! Build a parent/child corpus tree, aggregate it into a searchable engine
//! via the hot-reload controller, mutate a child, and confirm the engine
//! picks the change up on a forced rebuild but not before.

use std::sync::Arc;

use lexivault::{
    config::{BloomConfig, FuzzyConfig, HotReloadConfig, SemanticConfig, VersioningConfig},
    corpus::CorpusTreeManager,
    hot_reload::SearchEngineManager,
    types::CorpusType,
    version::{store::InMemoryStore, VersionChainManager},
};

fn wired_corpora() -> Arc<CorpusTreeManager> {
    let versions = Arc::new(VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default()));
    Arc::new(CorpusTreeManager::new(versions))
}

#[tokio::test]
async fn master_corpus_aggregation_feeds_the_search_engine() {
    let corpora = wired_corpora();

    let master = corpora
        .save_corpus("french".into(), CorpusType::Language, "fr".into(), None, true, vec![])
        .unwrap();
    corpora
        .save_corpus(
            "french-common".into(),
            CorpusType::Lexicon,
            "fr".into(),
            Some(master.corpus_uuid),
            false,
            vec!["bonjour".into(), "ennui".into()],
        )
        .unwrap();
    corpora
        .save_corpus(
            "french-rare".into(),
            CorpusType::Lexicon,
            "fr".into(),
            Some(master.corpus_uuid),
            false,
            vec!["en coulisse".into()],
        )
        .unwrap();

    corpora.aggregate_vocabularies(master.corpus_uuid, true).unwrap();

    let manager = SearchEngineManager::new(
        corpora.clone(),
        BloomConfig::default(),
        FuzzyConfig::default(),
        SemanticConfig { enabled: false, ..SemanticConfig::default() },
        HotReloadConfig::default(),
    );

    let engine = manager.get_engine(&["french".to_string()], None, false).await.unwrap();
    assert!(engine.search_exact("bonjour").is_some());
    assert!(engine.search_exact("en coulisse").is_some());
    assert!(engine.search_exact("nonexistentword").is_none());

    // Grow the rare child's vocabulary, re-aggregate, force the engine to
    // notice. Without `force_rebuild: true` the stale engine is returned —
    // the fingerprint check only fires after `check_interval` has elapsed.
    let rare = corpora.get_by_name("french-rare").unwrap();
    corpora
        .update_corpus(rare.corpus_uuid, Some(vec!["en coulisse".into(), "malaise".into()]))
        .unwrap();
    corpora.aggregate_vocabularies(master.corpus_uuid, true).unwrap();

    let stale = manager.get_engine(&["french".to_string()], None, false).await.unwrap();
    assert!(stale.search_exact("malaise").is_none());

    let rebuilt = manager.get_engine(&["french".to_string()], None, true).await.unwrap();
    assert!(rebuilt.search_exact("malaise").is_some());
}

#[tokio::test]
async fn cascade_delete_orphans_children_and_drops_derived_indices() {
    let corpora = wired_corpora();

    let master = corpora
        .save_corpus("spanish".into(), CorpusType::Language, "es".into(), None, true, vec![])
        .unwrap();
    let child = corpora
        .save_corpus(
            "spanish-core".into(),
            CorpusType::Lexicon,
            "es".into(),
            Some(master.corpus_uuid),
            false,
            vec!["hola".into()],
        )
        .unwrap();

    let deleted = corpora.delete_corpus(master.corpus_uuid).await.unwrap();
    assert!(deleted);
    assert!(corpora.get_by_uuid(master.corpus_uuid).is_none());
    assert!(corpora.get_by_name("spanish").is_none());

    let surviving_child = corpora.get_by_uuid(child.corpus_uuid).unwrap();
    assert_eq!(surviving_child.parent_uuid, None, "child must survive as an orphan, not be cascade-deleted");
}
