//! Metadata store for containers and blobs.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{BlobModel, ContainerModel};

/// Trait for metadata storage operations.
///
/// Documents are cloned in and out; callers own the values they load and
/// persist whole documents back.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // Container operations
    async fn create_container(&self, container: ContainerModel) -> StorageResult<()>;
    async fn get_container(&self, account: &str, name: &str) -> StorageResult<ContainerModel>;
    async fn update_container(&self, container: ContainerModel) -> StorageResult<()>;
    /// Deletes a container together with all of its blobs.
    async fn delete_container(&self, account: &str, name: &str) -> StorageResult<()>;
    async fn container_exists(&self, account: &str, name: &str) -> bool;

    // Blob operations
    /// Inserts or replaces a blob.
    async fn put_blob(&self, blob: BlobModel) -> StorageResult<()>;
    async fn get_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
        snapshot: &str,
    ) -> StorageResult<BlobModel>;
    async fn delete_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
        snapshot: &str,
    ) -> StorageResult<()>;
    /// Base blobs of one container, or of every container in the account,
    /// ordered by container then name.
    async fn list_blobs(
        &self,
        account: &str,
        container: Option<&str>,
    ) -> StorageResult<Vec<BlobModel>>;
}

/// Key type for containers - uses Arc<str> to avoid allocations.
type ContainerKey = (Arc<str>, Arc<str>);

/// Key type for blobs - uses Arc<str> to avoid allocations.
type BlobKey = (Arc<str>, Arc<str>, Arc<str>, Arc<str>);

/// In-memory implementation of the metadata store.
pub struct MemoryMetadataStore {
    /// Containers indexed by (account, name).
    containers: DashMap<ContainerKey, ContainerModel>,

    /// Blobs indexed by (account, container, name, snapshot).
    blobs: DashMap<BlobKey, BlobModel>,

    /// Secondary index: account+container -> sorted (name, snapshot) pairs.
    blob_index: DashMap<ContainerKey, BTreeSet<(Arc<str>, Arc<str>)>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            containers: DashMap::new(),
            blobs: DashMap::new(),
            blob_index: DashMap::new(),
        }
    }

    /// Create an Arc<str> key from a string slice.
    #[inline]
    fn arc_str(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    /// Create a container key.
    #[inline]
    fn container_key(account: &str, name: &str) -> ContainerKey {
        (Self::arc_str(account), Self::arc_str(name))
    }

    /// Create a blob key.
    #[inline]
    fn blob_key(account: &str, container: &str, name: &str, snapshot: &str) -> BlobKey {
        (
            Self::arc_str(account),
            Self::arc_str(container),
            Self::arc_str(name),
            Self::arc_str(snapshot),
        )
    }

    fn require_container(&self, account: &str, container: &str) -> StorageResult<()> {
        if !self.containers.contains_key(&Self::container_key(account, container)) {
            return Err(StorageError::new(ErrorCode::ContainerNotFound));
        }
        Ok(())
    }

    fn container_blobs(&self, account: &str, container: &str) -> Vec<BlobModel> {
        let Some(index) = self.blob_index.get(&Self::container_key(account, container)) else {
            return Vec::new();
        };
        index
            .iter()
            .filter(|(_, snapshot)| snapshot.is_empty())
            .filter_map(|(name, snapshot)| {
                let key = (
                    Self::arc_str(account),
                    Self::arc_str(container),
                    name.clone(),
                    snapshot.clone(),
                );
                self.blobs.get(&key).map(|b| b.value().clone())
            })
            .collect()
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_container(&self, container: ContainerModel) -> StorageResult<()> {
        let key = Self::container_key(&container.account, &container.name);
        if self.containers.contains_key(&key) {
            return Err(StorageError::new(ErrorCode::ContainerAlreadyExists));
        }
        self.containers.insert(key, container);
        Ok(())
    }

    async fn get_container(&self, account: &str, name: &str) -> StorageResult<ContainerModel> {
        let key = Self::container_key(account, name);
        self.containers
            .get(&key)
            .map(|c| c.value().clone())
            .ok_or_else(|| StorageError::new(ErrorCode::ContainerNotFound))
    }

    async fn update_container(&self, container: ContainerModel) -> StorageResult<()> {
        let key = Self::container_key(&container.account, &container.name);
        if !self.containers.contains_key(&key) {
            return Err(StorageError::new(ErrorCode::ContainerNotFound));
        }
        self.containers.insert(key, container);
        Ok(())
    }

    async fn delete_container(&self, account: &str, name: &str) -> StorageResult<()> {
        let key = Self::container_key(account, name);
        self.containers
            .remove(&key)
            .ok_or_else(|| StorageError::new(ErrorCode::ContainerNotFound))?;

        if let Some((_, index)) = self.blob_index.remove(&key) {
            for (blob, snapshot) in index {
                self.blobs
                    .remove(&(key.0.clone(), key.1.clone(), blob, snapshot));
            }
        }
        Ok(())
    }

    async fn container_exists(&self, account: &str, name: &str) -> bool {
        self.containers
            .contains_key(&Self::container_key(account, name))
    }

    async fn put_blob(&self, blob: BlobModel) -> StorageResult<()> {
        self.require_container(&blob.account, &blob.container)?;

        let key = Self::blob_key(&blob.account, &blob.container, &blob.name, &blob.snapshot);

        // Update the secondary index
        self.blob_index
            .entry((key.0.clone(), key.1.clone()))
            .or_default()
            .insert((key.2.clone(), key.3.clone()));

        self.blobs.insert(key, blob);
        Ok(())
    }

    async fn get_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
        snapshot: &str,
    ) -> StorageResult<BlobModel> {
        self.require_container(account, container)?;

        let key = Self::blob_key(account, container, name, snapshot);
        self.blobs
            .get(&key)
            .map(|b| b.value().clone())
            .ok_or_else(|| StorageError::new(ErrorCode::BlobNotFound))
    }

    async fn delete_blob(
        &self,
        account: &str,
        container: &str,
        name: &str,
        snapshot: &str,
    ) -> StorageResult<()> {
        self.require_container(account, container)?;

        let key = Self::blob_key(account, container, name, snapshot);
        let removed = self.blobs.remove(&key);

        if let Some(mut entry) = self.blob_index.get_mut(&(key.0.clone(), key.1.clone())) {
            entry.remove(&(key.2.clone(), key.3.clone()));
        }

        removed
            .map(|_| ())
            .ok_or_else(|| StorageError::new(ErrorCode::BlobNotFound))
    }

    async fn list_blobs(
        &self,
        account: &str,
        container: Option<&str>,
    ) -> StorageResult<Vec<BlobModel>> {
        if let Some(container) = container {
            self.require_container(account, container)?;
            return Ok(self.container_blobs(account, container));
        }

        let mut containers: Vec<Arc<str>> = self
            .containers
            .iter()
            .filter(|entry| entry.key().0.as_ref() == account)
            .map(|entry| entry.key().1.clone())
            .collect();
        containers.sort();

        Ok(containers
            .iter()
            .flat_map(|container| self.container_blobs(account, container))
            .collect())
    }
}
