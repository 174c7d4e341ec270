// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Physical storage backends for resources, behind one trait.
//!
//! The version chain manager never touches a filesystem or a `HashMap`
//! directly — it calls `ResourceStore`. Tests and the in-process pipeline
//! use `InMemoryStore`; a real deployment uses `FsStore`. Both store
//! `Resource`s keyed by `(resource_type, resource_id, version)`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::types::{Resource, ResourceType};

fn store_key(resource_type: ResourceType, resource_id: &str, version: &semver::Version) -> String {
    format!("{}/{}/{}", resource_type.as_str(), resource_id, version)
}

/// Backend abstraction for persisting resource versions.
///
/// Every method operates on a single, fully-materialized `Resource` — chain
/// traversal and delta reconstruction happen one layer up, in
/// `VersionChainManager`.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn put(&self, resource: Resource) -> Result<()>;
    async fn get(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version: &semver::Version,
    ) -> Result<Option<Resource>>;
    async fn delete(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version: &semver::Version,
    ) -> Result<()>;
    /// All versions of a resource, in no particular order — callers sort.
    async fn list(&self, resource_type: ResourceType, resource_id: &str) -> Result<Vec<Resource>>;
}

/// `DashMap`-backed store, keyed by `(resource_type, resource_id, version)`.
/// The dependency-injected default for tests and in-process use.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    resources: DashMap<String, Resource>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn put(&self, resource: Resource) -> Result<()> {
        let key = store_key(
            resource.resource_type,
            &resource.resource_id,
            &resource.version_info.version,
        );
        self.resources.insert(key, resource);
        Ok(())
    }

    async fn get(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version: &semver::Version,
    ) -> Result<Option<Resource>> {
        let key = store_key(resource_type, resource_id, version);
        Ok(self.resources.get(&key).map(|entry| entry.value().clone()))
    }

    async fn delete(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version: &semver::Version,
    ) -> Result<()> {
        let key = store_key(resource_type, resource_id, version);
        self.resources.remove(&key);
        Ok(())
    }

    async fn list(&self, resource_type: ResourceType, resource_id: &str) -> Result<Vec<Resource>> {
        let prefix = format!("{}/{}/", resource_type.as_str(), resource_id);
        Ok(self
            .resources
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// JSON-file-per-version store rooted at `base_dir`.
pub struct FsStore {
    base_dir: PathBuf,
}

impl FsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, resource_type: ResourceType, resource_id: &str, version: &semver::Version) -> PathBuf {
        self.dir_for(resource_type, resource_id).join(format!("{version}.json"))
    }

    fn dir_for(&self, resource_type: ResourceType, resource_id: &str) -> PathBuf {
        self.base_dir
            .join(resource_type.as_str())
            .join(sanitize_id(resource_id))
    }
}

/// Resource ids can contain `:` (e.g. `word:synthesis`); replace path
/// separators so they stay within a single directory entry.
fn sanitize_id(id: &str) -> String {
    id.replace(['/', '\\'], "_")
}

#[async_trait]
impl ResourceStore for FsStore {
    async fn put(&self, resource: Resource) -> Result<()> {
        let dir = self.dir_for(resource.resource_type, &resource.resource_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Other(format!("failed to create {}: {e}", dir.display())))?;

        let path = self.path_for(
            resource.resource_type,
            &resource.resource_id,
            &resource.version_info.version,
        );
        let bytes = serde_json::to_vec_pretty(&resource)
            .map_err(|e| StoreError::Other(format!("failed to serialize resource: {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::Other(format!("failed to write {}: {e}", path.display())))
    }

    async fn get(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version: &semver::Version,
    ) -> Result<Option<Resource>> {
        let path = self.path_for(resource_type, resource_id, version);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let resource = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Other(format!("corrupt resource at {}: {e}", path.display())))?;
                Ok(Some(resource))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Other(format!("failed to read {}: {e}", path.display()))),
        }
    }

    async fn delete(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        version: &semver::Version,
    ) -> Result<()> {
        let path = self.path_for(resource_type, resource_id, version);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Other(format!("failed to delete {}: {e}", path.display()))),
        }
    }

    async fn list(&self, resource_type: ResourceType, resource_id: &str) -> Result<Vec<Resource>> {
        let dir = self.dir_for(resource_type, resource_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Other(format!("failed to list {}: {e}", dir.display()))),
        };

        let mut resources = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Other(format!("failed to iterate {}: {e}", dir.display())))?
        {
            let path: PathBuf = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| StoreError::Other(format!("failed to read {}: {e}", path.display())))?;
            let resource = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Other(format!("corrupt resource at {}: {e}", path.display())))?;
            resources.push(resource);
        }
        Ok(resources)
    }
}

impl FsStore {
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
