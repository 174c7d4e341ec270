//! Save several versions of a dictionary entry, roll back, and confirm the
//! cache is invalidated in lockstep so a stale read never survives a write.

use std::sync::Arc;

use serde_json::json;

use lexivault::{
    cache::Cache,
    config::{CacheConfig, VersioningConfig},
    types::{Namespace, ResourceType},
    version::{store::InMemoryStore, SaveConfig, VersionChainManager},
};

#[tokio::test]
async fn rollback_produces_new_latest_and_invalidates_the_cache() {
    let versions = Arc::new(VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default()));
    let cache = Cache::new(CacheConfig::default(), None);

    let resource_id = "cat:synthesis";

    let v1 = versions
        .save(
            resource_id,
            ResourceType::Dictionary,
            Namespace::Dictionary,
            json!({"definition": "a small domesticated feline"}),
            SaveConfig::default(),
        )
        .await
        .unwrap();
    assert_eq!(v1.version_info.version, semver::Version::new(1, 0, 0));

    cache.set(Namespace::Dictionary, resource_id, v1.content_value().unwrap().clone(), None).await.unwrap();
    assert!(cache.get(Namespace::Dictionary, resource_id).await.unwrap().is_some());

    let v2 = versions
        .save(
            resource_id,
            ResourceType::Dictionary,
            Namespace::Dictionary,
            json!({"definition": "a small domesticated feline", "plural": "cats"}),
            SaveConfig::default(),
        )
        .await
        .unwrap();
    assert_eq!(v2.version_info.version, semver::Version::new(1, 0, 1));
    cache.invalidate_resource(Namespace::Dictionary, resource_id, Some(&v1.version_info.version.to_string())).await.unwrap();
    assert!(cache.get(Namespace::Dictionary, resource_id).await.unwrap().is_none());

    let v3 = versions
        .save(
            resource_id,
            ResourceType::Dictionary,
            Namespace::Dictionary,
            json!({"definition": "a small domesticated feline", "plural": "cats", "family": "Felidae"}),
            SaveConfig::default(),
        )
        .await
        .unwrap();
    assert_eq!(v3.version_info.version, semver::Version::new(1, 0, 2));

    let rolled_back = versions
        .rollback(resource_id, ResourceType::Dictionary, &semver::Version::new(1, 0, 0))
        .await
        .unwrap();
    assert_eq!(rolled_back.version_info.version, semver::Version::new(1, 0, 3));
    assert_eq!(rolled_back.content_value(), v1.content_value());

    let latest = versions.get_latest(resource_id, ResourceType::Dictionary, true).await.unwrap().unwrap();
    assert_eq!(latest.version_info.version, semver::Version::new(1, 0, 3));

    let history = versions.list_versions(resource_id, ResourceType::Dictionary).await.unwrap();
    assert_eq!(history.len(), 4);
    assert!(history[0].is_latest);
}

#[tokio::test]
async fn deleting_the_latest_version_promotes_the_previous_one() {
    let versions = Arc::new(VersionChainManager::new(Arc::new(InMemoryStore::new()), VersioningConfig::default()));
    let resource_id = "dog:synthesis";

    versions
        .save(resource_id, ResourceType::Dictionary, Namespace::Dictionary, json!({"definition": "a canine"}), SaveConfig::default())
        .await
        .unwrap();
    let second = versions
        .save(
            resource_id,
            ResourceType::Dictionary,
            Namespace::Dictionary,
            json!({"definition": "a canine", "plural": "dogs"}),
            SaveConfig::default(),
        )
        .await
        .unwrap();

    versions
        .delete_version(resource_id, ResourceType::Dictionary, &second.version_info.version)
        .await
        .unwrap();

    let latest = versions.get_latest(resource_id, ResourceType::Dictionary, true).await.unwrap().unwrap();
    assert_eq!(latest.version_info.version, semver::Version::new(1, 0, 0));
    assert!(latest.version_info.is_latest);
}
