// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The version chain manager: every resource's save/get/rollback/delete path.
//!
//! One async lock per `(resource_type, resource_id)`, in the global lock
//! order `hot_reload > corpus > version > cache`, held only long enough to
//! read the latest version, decide the next one, and persist — never across
//! a provider call or a search.

pub mod delta;
pub mod store;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::Cache;
use crate::config::{VersionLevel, VersioningConfig};
use crate::error::{Result, StoreError};
use crate::types::{ContentRef, Namespace, Resource, ResourceType, StorageMode, VersionInfo};
use crate::util::content_hash;
use delta::{compute_delta, reconstruct_version, should_keep_as_snapshot, Delta};
use store::ResourceStore;

/// Per-save override of the version-chain manager's defaults.
#[derive(Debug, Clone, Default)]
pub struct SaveConfig {
    pub version: Option<semver::Version>,
    pub level: Option<VersionLevel>,
    pub force_snapshot: bool,
    pub force_rebuild: bool,
}

fn resource_key(resource_type: ResourceType, resource_id: &str) -> String {
    format!("{}/{}", resource_type.as_str(), resource_id)
}

/// Owns the per-resource lock table and dispatches to a `ResourceStore`.
pub struct VersionChainManager {
    store: Arc<dyn ResourceStore>,
    config: VersioningConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
    cache: Option<Arc<Cache>>,
}

impl VersionChainManager {
    pub fn new(store: Arc<dyn ResourceStore>, config: VersioningConfig) -> Self {
        Self {
            store,
            config,
            locks: DashMap::new(),
            cache: None,
        }
    }

    /// Same as `new`, but reads go through `cache` first and writes
    /// invalidate it.
    pub fn with_cache(store: Arc<dyn ResourceStore>, config: VersioningConfig, cache: Arc<Cache>) -> Self {
        Self {
            store,
            config,
            locks: DashMap::new(),
            cache: Some(cache),
        }
    }

    fn lock_for(&self, resource_type: ResourceType, resource_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(resource_key(resource_type, resource_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Save new content for `resource_id`. Deduplicates on unchanged content
    /// hash; otherwise bumps the version, decides snapshot vs. delta, and
    /// links the chain.
    pub async fn save(
        &self,
        resource_id: &str,
        resource_type: ResourceType,
        namespace: Namespace,
        content: serde_json::Value,
        save_config: SaveConfig,
    ) -> Result<Resource> {
        let lock = self.lock_for(resource_type, resource_id);
        let _guard = lock.lock().await;

        let new_hash = content_hash(&content).map_err(|e| StoreError::Other(e.to_string()))?;
        let existing_versions = self.store.list(resource_type, resource_id).await?;
        let latest = existing_versions
            .iter()
            .find(|r| r.version_info.is_latest)
            .cloned();

        if let Some(latest) = &latest {
            if latest.content_hash == new_hash && !save_config.force_rebuild {
                return Ok(latest.clone());
            }
        }

        let next_version = match save_config.version.clone() {
            Some(v) => v,
            None => match &latest {
                Some(latest) => bump_version(
                    &latest.version_info.version,
                    save_config.level.unwrap_or(self.config.default_level),
                ),
                None => semver::Version::new(1, 0, 0),
            },
        };

        let chain_length = existing_versions.len();
        let is_delta_eligible = resource_type.is_delta_eligible();
        let content_size = serde_json::to_vec(&content).map(|b| b.len()).unwrap_or(usize::MAX);

        let storage_mode = if latest.is_none()
            || save_config.force_snapshot
            || !is_delta_eligible
            || should_keep_as_snapshot(chain_length, self.config.snapshot_interval, false)
            || content_size < self.config.inline_threshold_bytes
        {
            StorageMode::Snapshot
        } else {
            StorageMode::Delta
        };

        let (stored_content, delta_base_version) = match storage_mode {
            StorageMode::Snapshot => (ContentRef::Inline(content.clone()), None),
            StorageMode::Delta => {
                let base = nearest_snapshot(&existing_versions)?;
                let base_content = self.materialize(&base, &existing_versions)?;
                let delta = compute_delta(&base_content, &content)?;
                (
                    ContentRef::Inline(serde_json::to_value(&delta).map_err(|e| StoreError::Other(e.to_string()))?),
                    Some(base.version_info.version.clone()),
                )
            }
        };

        let now = current_timestamp();
        let mut new_resource = Resource {
            resource_id: resource_id.to_string(),
            resource_type,
            namespace,
            version_info: VersionInfo {
                version: next_version.clone(),
                is_latest: true,
                previous_version: latest.as_ref().map(|r| r.version_info.version.clone()),
                next_version: None,
                storage_mode,
                delta_base_version,
                data_hash: new_hash.clone(),
                created_at: now,
            },
            content_hash: new_hash,
            content: stored_content,
            metadata: Default::default(),
            tags: Default::default(),
        };

        if let Some(mut prior) = latest {
            prior.version_info.is_latest = false;
            prior.version_info.next_version = Some(next_version.clone());
            self.store.put(prior).await?;
        }

        new_resource.version_info.is_latest = true;
        self.store.put(new_resource.clone()).await?;

        if let Some(cache) = &self.cache {
            cache
                .invalidate_resource(namespace, resource_id, Some(&next_version.to_string()))
                .await?;
        }

        Ok(new_resource)
    }

    /// Latest version's materialized content. `use_cache=false` bypasses the
    /// in-process/filesystem cache and always re-reads the store.
    pub async fn get_latest(&self, resource_id: &str, resource_type: ResourceType, use_cache: bool) -> Result<Option<Resource>> {
        let namespace = resource_type.default_namespace();

        if use_cache {
            if let Some(cache) = &self.cache {
                if let Some(cached) = cache.get(namespace, resource_id).await? {
                    if let Ok(resource) = serde_json::from_value::<Resource>(cached) {
                        return Ok(Some(resource));
                    }
                }
            }
        }

        let versions = self.store.list(resource_type, resource_id).await?;
        let Some(latest) = versions.iter().find(|r| r.version_info.is_latest) else {
            return Ok(None);
        };
        let resolved = self.materialize_and_wrap(latest, &versions)?;

        if use_cache {
            if let Some(cache) = &self.cache {
                let encoded = serde_json::to_value(&resolved).map_err(|e| StoreError::Other(e.to_string()))?;
                cache.set(namespace, resource_id, encoded, None).await?;
            }
        }

        Ok(Some(resolved))
    }

    /// A specific version's materialized content, reconstructing through
    /// deltas back to the nearest snapshot if needed. Per-version content is
    /// immutable once written, so this is always safe to cache, keyed by
    /// `resource_id:version`.
    pub async fn get_by_version(
        &self,
        resource_id: &str,
        resource_type: ResourceType,
        version: &semver::Version,
    ) -> Result<Option<Resource>> {
        let namespace = resource_type.default_namespace();
        let cache_key = format!("{resource_id}:{version}");

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(namespace, &cache_key).await? {
                if let Ok(resource) = serde_json::from_value::<Resource>(cached) {
                    return Ok(Some(resource));
                }
            }
        }

        let versions = self.store.list(resource_type, resource_id).await?;
        let Some(target) = versions.iter().find(|r| &r.version_info.version == version) else {
            return Ok(None);
        };
        let resolved = self.materialize_and_wrap(target, &versions)?;

        if let Some(cache) = &self.cache {
            let encoded = serde_json::to_value(&resolved).map_err(|e| StoreError::Other(e.to_string()))?;
            cache.set(namespace, &cache_key, encoded, None).await?;
        }

        Ok(Some(resolved))
    }

    /// All versions, newest first.
    pub async fn list_versions(&self, resource_id: &str, resource_type: ResourceType) -> Result<Vec<VersionInfo>> {
        let mut versions = self.store.list(resource_type, resource_id).await?;
        versions.sort_by(|a, b| b.version_info.version.cmp(&a.version_info.version));
        Ok(versions.into_iter().map(|r| r.version_info).collect())
    }

    /// Remove a version and repair the chain around it.
    pub async fn delete_version(
        &self,
        resource_id: &str,
        resource_type: ResourceType,
        version: &semver::Version,
    ) -> Result<()> {
        let lock = self.lock_for(resource_type, resource_id);
        let _guard = lock.lock().await;

        let mut versions = self.store.list(resource_type, resource_id).await?;
        let Some(pos) = versions.iter().position(|r| &r.version_info.version == version) else {
            return Err(StoreError::VersionNotFound {
                resource_id: resource_id.to_string(),
                resource_type: resource_type.as_str().to_string(),
                version: version.to_string(),
            });
        };

        let target = versions.remove(pos);
        let prev_version = target.version_info.previous_version.clone();
        let next_version = target.version_info.next_version.clone();

        if let Some(prev_v) = &prev_version {
            if let Some(mut prev) = versions.iter().find(|r| &r.version_info.version == prev_v).cloned() {
                prev.version_info.next_version = next_version.clone();
                if target.version_info.is_latest {
                    prev.version_info.is_latest = true;
                }
                self.store.put(prev).await?;
            }
        }

        if let Some(next_v) = &next_version {
            if let Some(mut next) = versions.iter().find(|r| &r.version_info.version == next_v).cloned() {
                next.version_info.previous_version = prev_version.clone();
                self.store.put(next).await?;
            }
        }

        self.store.delete(resource_type, resource_id, version).await
    }

    /// Create a new latest version whose content equals `target_version`'s.
    pub async fn rollback(
        &self,
        resource_id: &str,
        resource_type: ResourceType,
        target_version: &semver::Version,
    ) -> Result<Resource> {
        let target = self
            .get_by_version(resource_id, resource_type, target_version)
            .await?
            .ok_or_else(|| StoreError::VersionNotFound {
                resource_id: resource_id.to_string(),
                resource_type: resource_type.as_str().to_string(),
                version: target_version.to_string(),
            })?;

        let content = target.content_value().cloned().ok_or_else(|| {
            StoreError::Other("rollback target content unexpectedly unresolved".to_string())
        })?;

        self.save(
            resource_id,
            resource_type,
            target.namespace,
            content,
            SaveConfig::default(),
        )
        .await
    }

    fn materialize_and_wrap(&self, target: &Resource, all_versions: &[Resource]) -> Result<Resource> {
        let content = self.materialize(target, all_versions)?;
        let mut resolved = target.clone();
        resolved.content = ContentRef::Inline(content);
        Ok(resolved)
    }

    /// Resolve a resource's logical content, walking back through deltas to
    /// its snapshot base when necessary.
    fn materialize(&self, target: &Resource, all_versions: &[Resource]) -> Result<serde_json::Value> {
        if target.version_info.storage_mode == StorageMode::Snapshot {
            return target
                .content_value()
                .cloned()
                .ok_or_else(|| StoreError::Other("snapshot content unexpectedly unresolved".to_string()));
        }

        let base_version = target.version_info.delta_base_version.clone().ok_or_else(|| {
            StoreError::DeltaApplyFailure {
                resource_id: target.resource_id.clone(),
                version: target.version_info.version.to_string(),
                reason: "delta node missing delta_base_version".to_string(),
            }
        })?;

        let base = all_versions
            .iter()
            .find(|r| r.version_info.version == base_version)
            .ok_or_else(|| StoreError::DeltaApplyFailure {
                resource_id: target.resource_id.clone(),
                version: target.version_info.version.to_string(),
                reason: format!("delta base {base_version} not found in chain"),
            })?;

        let base_content = base.content_value().cloned().ok_or_else(|| {
            StoreError::Other("snapshot base content unexpectedly unresolved".to_string())
        })?;

        // `save` stores each delta node base-relative (diffed straight against
        // the nearest snapshot, not against its chain predecessor), so
        // reconstructing a target applies only its own delta onto the base —
        // not every intermediate node's delta in sequence, which would
        // double-apply unrelated changes from sibling versions.
        let delta_value = target.content_value().cloned().ok_or_else(|| {
            StoreError::Other("delta content unexpectedly unresolved".to_string())
        })?;
        let delta: Delta = serde_json::from_value(delta_value).map_err(|e| StoreError::DeltaApplyFailure {
            resource_id: target.resource_id.clone(),
            version: target.version_info.version.to_string(),
            reason: format!("malformed delta: {e}"),
        })?;

        reconstruct_version(base_content, std::slice::from_ref(&delta))
    }
}

fn nearest_snapshot(versions: &[Resource]) -> Result<Resource> {
    versions
        .iter()
        .filter(|r| r.version_info.storage_mode == StorageMode::Snapshot)
        .max_by(|a, b| a.version_info.version.cmp(&b.version_info.version))
        .cloned()
        .ok_or_else(|| StoreError::InvariantViolation("no snapshot found in chain".to_string()))
}

fn bump_version(version: &semver::Version, level: VersionLevel) -> semver::Version {
    match level {
        VersionLevel::Major => semver::Version::new(version.major + 1, 0, 0),
        VersionLevel::Minor => semver::Version::new(version.major, version.minor + 1, 0),
        VersionLevel::Patch => semver::Version::new(version.major, version.minor, version.patch + 1),
    }
}

fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    fn manager() -> VersionChainManager {
        VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default())
    }

    #[tokio::test]
    async fn save_dedups_identical_content() {
        let manager = manager();
        let content = serde_json::json!({"word": "test", "def": "v1"});
        let first = manager
            .save("test:synthesis", ResourceType::Dictionary, Namespace::Dictionary, content.clone(), SaveConfig::default())
            .await
            .unwrap();
        let second = manager
            .save("test:synthesis", ResourceType::Dictionary, Namespace::Dictionary, content, SaveConfig::default())
            .await
            .unwrap();
        assert_eq!(first.version_info.version, second.version_info.version);
    }

    #[tokio::test]
    async fn save_bumps_patch_on_content_change() {
        let manager = manager();
        manager
            .save(
                "test:synthesis",
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"word": "test", "def": "v1"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();
        let second = manager
            .save(
                "test:synthesis",
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"word": "test", "def": "v2"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(second.version_info.version, semver::Version::new(1, 0, 1));
    }

    #[tokio::test]
    async fn rollback_creates_new_latest_with_old_content() {
        let manager = manager();
        manager
            .save(
                "test:synthesis",
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"word": "test", "def": "v1"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();
        manager
            .save(
                "test:synthesis",
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"word": "test", "def": "v2"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();

        let rolled_back = manager
            .rollback("test:synthesis", ResourceType::Dictionary, &semver::Version::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(rolled_back.version_info.version, semver::Version::new(1, 0, 2));
        assert_eq!(rolled_back.content_value().unwrap()["def"], "v1");

        let versions = manager
            .list_versions("test:synthesis", ResourceType::Dictionary)
            .await
            .unwrap();
        let ordered: Vec<String> = versions.iter().map(|v| v.version.to_string()).collect();
        assert_eq!(ordered, vec!["1.0.2", "1.0.1", "1.0.0"]);
    }

    #[tokio::test]
    async fn delete_latest_promotes_previous() {
        let manager = manager();
        manager
            .save(
                "test:synthesis",
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"word": "test", "def": "v1"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();
        manager
            .save(
                "test:synthesis",
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"word": "test", "def": "v2"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();

        manager
            .delete_version("test:synthesis", ResourceType::Dictionary, &semver::Version::new(1, 0, 1))
            .await
            .unwrap();

        let latest = manager
            .get_latest("test:synthesis", ResourceType::Dictionary, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version_info.version, semver::Version::new(1, 0, 0));
        assert!(latest.version_info.is_latest);
    }

    /// Deltas are stored base-relative (each one diffed against the nearest
    /// snapshot, not against its chain predecessor). A version whose content
    /// happens to equal the base again must still reconstruct to exactly
    /// that content, not to the base plus an unrelated sibling's changes.
    #[tokio::test]
    async fn reconstructing_a_delta_version_applies_only_its_own_delta() {
        let config = VersioningConfig {
            default_level: VersionLevel::Patch,
            snapshot_interval: 10,
            inline_threshold_bytes: 0,
        };
        let manager = VersionChainManager::new(Arc::new(InMemoryStore::new()), config);
        let resource_id = "word:synthesis";
        let base = serde_json::json!({"a": 1, "b": 2});

        let v0 = manager
            .save(resource_id, ResourceType::Dictionary, Namespace::Dictionary, base.clone(), SaveConfig::default())
            .await
            .unwrap();
        assert_eq!(v0.version_info.storage_mode, StorageMode::Snapshot);

        let v1 = manager
            .save(
                resource_id,
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"a": 1, "b": 2, "temp": 99}),
                SaveConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(v1.version_info.storage_mode, StorageMode::Delta);

        let v2 = manager
            .save(resource_id, ResourceType::Dictionary, Namespace::Dictionary, base.clone(), SaveConfig::default())
            .await
            .unwrap();
        assert_eq!(v2.version_info.storage_mode, StorageMode::Delta);

        let reconstructed = manager
            .get_by_version(resource_id, ResourceType::Dictionary, &v2.version_info.version)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reconstructed.content_value(), Some(&base));
        assert_eq!(
            content_hash(reconstructed.content_value().unwrap()).unwrap(),
            v2.content_hash
        );
    }

    #[tokio::test]
    async fn save_invalidates_and_get_latest_repopulates_the_cache() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(Cache::new(crate::config::CacheConfig::default(), None));
        let manager = VersionChainManager::with_cache(store, VersioningConfig::default(), cache.clone());
        let resource_id = "cached:synthesis";

        manager
            .save(
                resource_id,
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"def": "v1"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();

        // Not cached yet: `save` invalidates, it doesn't pre-warm.
        assert!(cache.get(Namespace::Dictionary, resource_id).await.unwrap().is_none());

        let first_read = manager.get_latest(resource_id, ResourceType::Dictionary, true).await.unwrap().unwrap();
        assert!(cache.get(Namespace::Dictionary, resource_id).await.unwrap().is_some());

        manager
            .save(
                resource_id,
                ResourceType::Dictionary,
                Namespace::Dictionary,
                serde_json::json!({"def": "v2"}),
                SaveConfig::default(),
            )
            .await
            .unwrap();

        // The write must invalidate the stale cache entry from `first_read`.
        assert!(cache.get(Namespace::Dictionary, resource_id).await.unwrap().is_none());

        let second_read = manager.get_latest(resource_id, ResourceType::Dictionary, true).await.unwrap().unwrap();
        assert_ne!(first_read.content_value(), second_read.content_value());
        assert_eq!(second_read.content_value().unwrap()["def"], "v2");
    }
}
