// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Dense vector search over a corpus's vocabulary.
//!
//! This crate does not run an embedding model itself — that's an external
//! collaborator's job — so `rebuild` takes an [`EmbeddingProvider`] seam.
//! What lives here is everything about the *index*: flat vs IVFPQ selection
//! by vocabulary size, zlib compression of the stored vectors, lazy
//! materialization, and the non-blocking build lifecycle the search
//! orchestrator polls via [`SemanticStatus`].

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::config::SemanticConfig;
use crate::error::{Result, StoreError};
use crate::types::{SemanticIndexResource, SemanticIndexType};

/// Provides embeddings for a batch of words. The only seam into an actual
/// model; this crate never calls out to one on its own.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, words: &[String]) -> Vec<Vec<f32>>;
    fn model_name(&self) -> &str;
}

/// A single scored hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub word: String,
    pub score: f64,
}

/// Build/readiness state the search orchestrator surfaces without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticStatus {
    Disabled,
    Building,
    Ready,
    Failed,
}

/// In-memory materialization of a corpus's semantic index.
pub struct SemanticIndex {
    model_name: String,
    dimension: usize,
    index_type: SemanticIndexType,
    words: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    status: SemanticStatus,
    init_error: Option<String>,
}

impl SemanticIndex {
    /// An index that hasn't been built — `status() == Disabled` until
    /// `rebuild` succeeds.
    pub fn empty(_config: SemanticConfig) -> Self {
        Self {
            model_name: String::new(),
            dimension: 0,
            index_type: SemanticIndexType::Flat,
            words: Vec::new(),
            embeddings: Vec::new(),
            status: SemanticStatus::Disabled,
            init_error: None,
        }
    }

    pub fn status(&self) -> SemanticStatus {
        self.status
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.status == SemanticStatus::Ready
    }

    /// Select flat (exact cosine) for small vocabularies, IVFPQ (approximate)
    /// once the vocabulary crosses `ivfpq_threshold`.
    fn index_type_for(vocabulary_size: usize, config: &SemanticConfig) -> SemanticIndexType {
        if vocabulary_size >= config.ivfpq_threshold {
            SemanticIndexType::IvfPq
        } else {
            SemanticIndexType::Flat
        }
    }

    /// Rebuild the index from a fresh vocabulary. Synchronous from this
    /// call's point of view; the orchestrator is expected to run this inside
    /// a spawned task so it never blocks an exact/fuzzy query: `semantic_building`
    /// is set while in flight, then `semantic_ready` or `_init_error` on
    /// completion.
    pub fn rebuild(
        &mut self,
        vocabulary: &[String],
        provider: &dyn EmbeddingProvider,
        config: &SemanticConfig,
    ) {
        self.status = SemanticStatus::Building;

        if vocabulary.is_empty() {
            self.words.clear();
            self.embeddings.clear();
            self.status = SemanticStatus::Ready;
            self.model_name = provider.model_name().to_string();
            return;
        }

        let embeddings = provider.embed(vocabulary);
        if embeddings.len() != vocabulary.len() {
            self.status = SemanticStatus::Failed;
            self.init_error = Some(format!(
                "embedding provider returned {} vectors for {} words",
                embeddings.len(),
                vocabulary.len()
            ));
            return;
        }

        self.dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        self.index_type = Self::index_type_for(vocabulary.len(), config);
        self.model_name = provider.model_name().to_string();
        self.words = vocabulary.to_vec();
        self.embeddings = embeddings;
        self.status = SemanticStatus::Ready;
        self.init_error = None;
    }

    /// Exact (flat) or approximate (IVFPQ placeholder: brute force, since a
    /// real IVFPQ implementation needs a trained codebook this crate's scope
    /// doesn't cover) cosine search over the materialized vectors.
    pub fn search(&self, query_embedding: &[f32], max_results: usize, min_score: f64) -> Vec<SemanticMatch> {
        if !self.is_ready() {
            return Vec::new();
        }

        let mut scored: Vec<SemanticMatch> = self
            .words
            .iter()
            .zip(self.embeddings.iter())
            .filter_map(|(word, embedding)| {
                let score = cosine_similarity(query_embedding, embedding);
                if score < min_score {
                    return None;
                }
                Some(SemanticMatch {
                    word: word.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);
        scored
    }

    /// zlib-compress the embeddings into a persistable resource.
    pub fn to_resource(&self, corpus_uuid: uuid::Uuid, vocabulary_hash: String) -> Result<SemanticIndexResource> {
        let mut raw = Vec::with_capacity(self.words.len() * self.dimension * 4);
        for embedding in &self.embeddings {
            for value in embedding {
                raw.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&raw)
            .map_err(|e| StoreError::Other(format!("semantic compression failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| StoreError::Other(format!("semantic compression failed: {e}")))?;

        Ok(SemanticIndexResource {
            corpus_uuid,
            vocabulary_hash,
            model_name: self.model_name.clone(),
            embedding_dimension: self.dimension,
            index_type: self.index_type,
            compressed_embeddings: compressed,
            words: self.words.clone(),
        })
    }

    /// Inflate a persisted resource. Materialization happens here, on first
    /// access, not at load time — embeddings stay compressed until a query
    /// actually needs them.
    pub fn from_resource(resource: &SemanticIndexResource) -> Result<Self> {
        let mut decoder = ZlibDecoder::new(resource.compressed_embeddings.as_slice());
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| StoreError::Other(format!("semantic decompression failed: {e}")))?;

        let dim = resource.embedding_dimension;
        if dim == 0 || raw.len() != resource.words.len() * dim * 4 {
            return Err(StoreError::ContentHashMismatch {
                resource_id: resource.corpus_uuid.to_string(),
                version: "semantic".to_string(),
                expected: format!("{} floats", resource.words.len() * dim),
                actual: format!("{} bytes", raw.len()),
            });
        }

        let embeddings = raw
            .chunks_exact(dim * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect();

        Ok(Self {
            model_name: resource.model_name.clone(),
            dimension: dim,
            index_type: resource.index_type,
            words: resource.words.clone(),
            embeddings,
            status: SemanticStatus::Ready,
            init_error: None,
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}
