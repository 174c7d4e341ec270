// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The lookup pipeline: normalize -> search -> provider fallback ->
//! synthesize -> version, with in-flight coalescing so a burst of identical
//! lookups only does the work once.
//!
//! `DictionaryProvider`, `LiteratureProvider`, and `Synthesizer` are trait
//! seams; this crate ships no HTTP client, no AI synthesis, and no provider
//! scraping implementation behind them — a collaborator crate supplies
//! those.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, StoreError};
use crate::search::{Engine, SearchMode};
use crate::types::{synthesis_resource_id, Namespace, ResourceType};
use crate::util::normalize;
use crate::version::{SaveConfig, VersionChainManager};

/// Looks a word up in one external dictionary source.
#[async_trait]
pub trait DictionaryProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, word: &str) -> Result<Option<Value>>;
}

/// Looks a word up in one external literature/corpus source.
#[async_trait]
pub trait LiteratureProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, word: &str) -> Result<Option<Value>>;
}

/// Combines whatever providers returned into the final stored entry.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, word: &str, dictionary_hits: Vec<Value>, literature_hits: Vec<Value>) -> Result<Value>;
}

/// Outcome of a single lookup, distinguishing a cache/index hit from a
/// freshly-synthesized entry (callers use this to decide whether to stream
/// provider-fetch progress).
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The word already existed as a versioned dictionary entry.
    Found(Value),
    /// No existing entry; providers were queried and a new entry synthesized.
    Synthesized(Value),
}

/// Exponential backoff with a hard ceiling, used around each provider call.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

/// Orchestrates search-first, provider-fallback lookups, with per-word
/// in-flight request coalescing.
pub struct LookupPipeline {
    version_manager: Arc<VersionChainManager>,
    dictionary_providers: Vec<Arc<dyn DictionaryProvider>>,
    literature_providers: Vec<Arc<dyn LiteratureProvider>>,
    synthesizer: Arc<dyn Synthesizer>,
    config: PipelineConfig,
    backoff: BackoffPolicy,
    in_flight: DashMap<String, watch::Receiver<Option<LookupOutcome>>>,
}

impl LookupPipeline {
    pub fn new(
        version_manager: Arc<VersionChainManager>,
        dictionary_providers: Vec<Arc<dyn DictionaryProvider>>,
        literature_providers: Vec<Arc<dyn LiteratureProvider>>,
        synthesizer: Arc<dyn Synthesizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            version_manager,
            dictionary_providers,
            literature_providers,
            synthesizer,
            config,
            backoff: BackoffPolicy::default(),
            in_flight: DashMap::new(),
        }
    }

    /// Full lookup: search the engine first; on a sufficiently strong exact
    /// hit, materialize the existing entry. Otherwise fall through to
    /// providers and synthesis, coalescing concurrent lookups for the same
    /// word.
    pub async fn lookup(&self, word: &str, engine: Option<&Engine>) -> Result<LookupOutcome> {
        let normalized = normalize(word);

        if let Some(engine) = engine {
            let hits = engine.search(&normalized, SearchMode::Smart, None, 1, self.config.exact_threshold);
            if let Some(top) = hits.first() {
                if top.score >= self.config.exact_threshold {
                    if let Some(resource) = self
                        .version_manager
                        .get_latest(&synthesis_resource_id(&normalized), ResourceType::Dictionary, true)
                        .await?
                    {
                        if let Some(content) = resource.content_value() {
                            return Ok(LookupOutcome::Found(content.clone()));
                        }
                    }
                }
            }
        }

        if let Some(resource) = self
            .version_manager
            .get_latest(&synthesis_resource_id(&normalized), ResourceType::Dictionary, true)
            .await?
        {
            if let Some(content) = resource.content_value() {
                return Ok(LookupOutcome::Found(content.clone()));
            }
        }

        self.lookup_with_coalescing(normalized).await
    }

    /// If a lookup for `word` is already in flight, wait on its result
    /// instead of issuing a second round of provider calls; otherwise become
    /// the leader for this word until `resolve_via_providers` finishes.
    async fn lookup_with_coalescing(&self, word: String) -> Result<LookupOutcome> {
        let tx = match self.in_flight.entry(word.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let mut receiver = existing.get().clone();
                drop(existing);
                return self.await_shared(&mut receiver).await;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                tx
            }
        };

        let result = self.resolve_via_providers(&word).await;
        if let Ok(outcome) = &result {
            let _ = tx.send(Some(outcome.clone()));
        }
        self.in_flight.remove(&word);
        result
    }

    async fn await_shared(&self, receiver: &mut watch::Receiver<Option<LookupOutcome>>) -> Result<LookupOutcome> {
        if let Some(outcome) = receiver.borrow().clone() {
            return Ok(outcome);
        }
        tokio::time::timeout(self.config.dedup_wait_time, receiver.changed())
            .await
            .map_err(|_| StoreError::Other(format!("timed out waiting for in-flight lookup after {:?}", self.config.dedup_wait_time)))?
            .map_err(|_| StoreError::Other("in-flight lookup sender dropped".to_string()))?;
        receiver
            .borrow()
            .clone()
            .ok_or_else(|| StoreError::Other("in-flight lookup resolved with no outcome".to_string()))
    }

    async fn resolve_via_providers(&self, word: &str) -> Result<LookupOutcome> {
        let mut dictionary_hits = Vec::new();
        for provider in &self.dictionary_providers {
            match self.call_with_backoff(provider.name(), || provider.fetch(word)).await {
                Ok(Some(hit)) => dictionary_hits.push(hit),
                Ok(None) => {}
                Err(e) => warn!(provider = provider.name(), error = %e, "dictionary provider failed"),
            }
        }

        let mut literature_hits = Vec::new();
        for provider in &self.literature_providers {
            match self.call_with_backoff(provider.name(), || provider.fetch(word)).await {
                Ok(Some(hit)) => literature_hits.push(hit),
                Ok(None) => {}
                Err(e) => warn!(provider = provider.name(), error = %e, "literature provider failed"),
            }
        }

        let synthesized = self.synthesizer.synthesize(word, dictionary_hits, literature_hits).await?;

        let resource = self
            .version_manager
            .save(
                &synthesis_resource_id(word),
                ResourceType::Dictionary,
                Namespace::Dictionary,
                synthesized.clone(),
                SaveConfig::default(),
            )
            .await?;

        info!(word, version = %resource.version_info.version, "synthesized new dictionary entry");
        Ok(LookupOutcome::Synthesized(synthesized))
    }

    /// Retry `call` with exponential backoff, wrapping each attempt in the
    /// per-provider timeout.
    async fn call_with_backoff<F, Fut>(&self, provider_name: &str, mut call: F) -> Result<Option<Value>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Option<Value>>>,
    {
        let mut last_err = None;
        for attempt in 0..self.backoff.max_attempts {
            match tokio::time::timeout(self.config.provider_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => last_err = Some(e),
                Err(_) => {
                    last_err = Some(StoreError::ProviderTimeout {
                        provider: provider_name.to_string(),
                        timeout_ms: self.config.provider_timeout.as_millis() as u64,
                    })
                }
            }
            if attempt + 1 < self.backoff.max_attempts {
                tokio::time::sleep(self.backoff.delay_for(attempt)).await;
            }
        }
        Err(last_err.unwrap_or_else(|| StoreError::Other("provider call failed with no error".to_string())))
    }
}
