// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Two-tier cache: an in-memory LRU in front of a filesystem-backed store.
//!
//! Namespace isolation is enforced at the API — every key is implicitly
//! `(namespace, key)`, so a cross-namespace read can't happen by
//! construction. Values are stored as structured content; serialization only
//! happens at the filesystem boundary.

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::error::{Result, StoreError};
use crate::types::Namespace;

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// Namespace-scoped in-memory LRU with an optional filesystem tier for
/// overflow and durability across process restarts.
///
/// Each namespace gets its own `Mutex<LruCache<...>>` behind a `DashMap`, so
/// a `Dictionary` read never contends with a `Corpus` write on the same
/// shard.
pub struct Cache {
    memory: DashMap<Namespace, Mutex<LruCache<String, Entry>>>,
    capacity: NonZeroUsize,
    fs_root: Option<PathBuf>,
    default_ttl: Option<Duration>,
}

impl Cache {
    pub fn new(config: CacheConfig, fs_root: Option<PathBuf>) -> Self {
        Self {
            memory: DashMap::new(),
            capacity: NonZeroUsize::new(config.in_memory_capacity.max(1)).unwrap(),
            fs_root,
            default_ttl: config.default_ttl,
        }
    }

    fn shard(&self, namespace: Namespace) -> dashmap::mapref::one::RefMut<'_, Namespace, Mutex<LruCache<String, Entry>>> {
        self.memory
            .entry(namespace)
            .or_insert_with(|| Mutex::new(LruCache::new(self.capacity)))
    }

    /// Read a value, checking the in-memory tier first, then the filesystem
    /// tier (promoting a filesystem hit back into memory).
    pub async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        {
            let shard = self.shard(namespace);
            let mut lru = shard.lock();
            if let Some(entry) = lru.get(key) {
                if !is_expired(entry) {
                    return Ok(Some(entry.value.clone()));
                }
            }
            lru.pop(key);
        }

        let Some(value) = self.read_fs(namespace, key).await? else {
            return Ok(None);
        };
        self.shard(namespace).lock().put(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: self.default_ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(Some(value))
    }

    /// Write to both tiers. `ttl` overrides the cache's default when given.
    pub async fn set(&self, namespace: Namespace, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        self.shard(namespace).lock().put(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at,
            },
        );
        self.write_fs(namespace, key, &value).await
    }

    pub async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        self.shard(namespace).lock().pop(key);
        self.delete_fs(namespace, key).await
    }

    /// Invalidate the keys a version-manager write touches:
    /// `(namespace, resource_id)` and `(namespace, resource_id:version)`.
    pub async fn invalidate_resource(&self, namespace: Namespace, resource_id: &str, version: Option<&str>) -> Result<()> {
        self.delete(namespace, resource_id).await?;
        if let Some(version) = version {
            self.delete(namespace, &format!("{resource_id}:{version}")).await?;
        }
        Ok(())
    }

    /// Invalidate the additional keys a corpus delete touches:
    /// `corpus_name`, `corpus_uuid`, and derived stats.
    pub async fn invalidate_corpus(&self, namespace: Namespace, corpus_name: &str, corpus_uuid: &str) -> Result<()> {
        self.delete(namespace, corpus_name).await?;
        self.delete(namespace, corpus_uuid).await?;
        self.delete(namespace, &format!("{corpus_uuid}:stats")).await
    }

    fn fs_path(&self, namespace: Namespace, key: &str) -> Option<PathBuf> {
        self.fs_root.as_ref().map(|root| {
            root.join(namespace.as_str())
                .join(key.replace(['/', '\\'], "_"))
        })
    }

    async fn read_fs(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        let Some(path) = self.fs_path(namespace, key) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Other(format!("corrupt cache entry at {}: {e}", path.display())))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Other(format!("failed to read cache entry: {e}"))),
        }
    }

    async fn write_fs(&self, namespace: Namespace, key: &str, value: &Value) -> Result<()> {
        let Some(path) = self.fs_path(namespace, key) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Other(format!("failed to create cache dir: {e}")))?;
        }
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Other(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::Other(format!("failed to write cache entry: {e}")))
    }

    async fn delete_fs(&self, namespace: Namespace, key: &str) -> Result<()> {
        let Some(path) = self.fs_path(namespace, key) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Other(format!("failed to delete cache entry: {e}"))),
        }
    }
}

fn is_expired(entry: &Entry) -> bool {
    entry.expires_at.is_some_and(|at| Instant::now() >= at)
}
