//! Wire a search engine and a lookup pipeline to the same version chain and
//! confirm a word that's both indexed and already synthesized is served from
//! the engine-aware fast path without touching providers a second time.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use serde_json::{json, Value};

use lexivault::{
    config::{BloomConfig, FuzzyConfig, PipelineConfig, SemanticConfig, VersioningConfig},
    error::Result,
    pipeline::{DictionaryProvider, LiteratureProvider, LookupOutcome, LookupPipeline, Synthesizer},
    search::{Engine, SearchMode},
    version::{store::InMemoryStore, VersionChainManager},
};

struct StaticDictionaryProvider {
    response: Value,
}

#[async_trait]
impl DictionaryProvider for StaticDictionaryProvider {
    fn name(&self) -> &str {
        "static"
    }
    async fn fetch(&self, _word: &str) -> Result<Option<Value>> {
        Ok(Some(self.response.clone()))
    }
}

struct EmptyLiteratureProvider;

#[async_trait]
impl LiteratureProvider for EmptyLiteratureProvider {
    fn name(&self) -> &str {
        "empty"
    }
    async fn fetch(&self, _word: &str) -> Result<Option<Value>> {
        Ok(None)
    }
}

struct CountingSynthesizer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn synthesize(&self, word: &str, dictionary_hits: Vec<Value>, _literature_hits: Vec<Value>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"word": word, "sources": dictionary_hits}))
    }
}

#[tokio::test]
async fn indexed_word_with_an_existing_entry_skips_provider_roundtrip() {
    let calls = Arc::new(AtomicUsize::new(0));
    let versions = Arc::new(VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default()));
    let pipeline = LookupPipeline::new(
        versions,
        vec![Arc::new(StaticDictionaryProvider { response: json!({"definition": "a feline"}) })],
        vec![Arc::new(EmptyLiteratureProvider)],
        Arc::new(CountingSynthesizer { calls: calls.clone() }),
        PipelineConfig::default(),
    );

    // First lookup: nothing indexed, nothing synthesized yet -> provider path.
    let first = pipeline.lookup("cat", None).await.unwrap();
    assert!(matches!(first, LookupOutcome::Synthesized(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Build an engine over a corpus containing "cat"; the exact hit plus the
    // already-synthesized entry should resolve without another synth call.
    let engine = Engine::build(
        vec![("cat", "cat")],
        BloomConfig::default(),
        FuzzyConfig::default(),
        SemanticConfig::default(),
    );
    assert!(!engine.search(
        "cat",
        SearchMode::Smart,
        None,
        1,
        1.0,
    ).is_empty());

    let second = pipeline.lookup("cat", Some(&engine)).await.unwrap();
    assert!(matches!(second, LookupOutcome::Found(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second lookup must not re-synthesize");
}
