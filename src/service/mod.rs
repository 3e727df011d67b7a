//! Blob service operations.
//!
//! Each operation loads the documents it needs, resolves their lease at the
//! request timestamp, validates lease access and conditional headers, then
//! persists the updated document. Mutating operations hold the document's
//! lock across that whole sequence so no other operation's write lands
//! between the load and the save. Locks are striped: documents whose keys
//! hash alike share one, and no operation holds two at once.

mod blob;
mod container;
mod page_blob;

pub use blob::{validate_tags, FilteredBlob};
pub use page_blob::BlobDownload;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{StorageError, StorageResult};
use crate::lease::{Lease, LeaseAction};
use crate::models::{BlobModel, ContainerModel, PageRange};
use crate::storage::{ExtentStore, MemoryExtentStore, MemoryMetadataStore, MetadataStore};

/// Result of a lease operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseResponse {
    /// Lease id after the operation; absent after release and break.
    pub lease_id: Option<String>,
    /// Seconds until a break takes effect; only set by break.
    pub lease_time: Option<u64>,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

/// Number of document lock stripes.
const NUM_LOCK_STRIPES: usize = 64;

/// Blob service over a metadata store and an extent store.
pub struct BlobService {
    config: Config,
    metadata: Arc<dyn MetadataStore>,
    extents: Arc<dyn ExtentStore>,
    /// Document locks, picked by the hash of account/container[/blob].
    locks: Vec<Arc<Mutex<()>>>,
}

impl BlobService {
    /// Creates a service backed by in-memory stores.
    pub fn new(config: Config) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(MemoryExtentStore::new()),
        )
    }

    pub fn with_stores(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        extents: Arc<dyn ExtentStore>,
    ) -> Self {
        info!(
            account = %config.account,
            max_download_size = config.max_download_size,
            "Starting blob service"
        );
        let locks = (0..NUM_LOCK_STRIPES)
            .map(|_| Arc::new(Mutex::new(())))
            .collect();
        Self {
            config,
            metadata,
            extents,
            locks,
        }
    }

    /// Lock stripe guarding the document at `key`.
    fn stripe(&self, key: &str) -> &Arc<Mutex<()>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.locks[hasher.finish() as usize % NUM_LOCK_STRIPES]
    }

    /// Locks one document for the rest of an operation.
    async fn lock(&self, key: String) -> OwnedMutexGuard<()> {
        self.stripe(&key).clone().lock_owned().await
    }

    async fn lock_container(
        &self,
        ctx: &RequestContext,
        container: &str,
    ) -> OwnedMutexGuard<()> {
        self.lock(format!("{}/{}", ctx.account, container)).await
    }

    async fn lock_blob(
        &self,
        ctx: &RequestContext,
        container: &str,
        blob: &str,
    ) -> OwnedMutexGuard<()> {
        self.lock(format!("{}/{}/{}", ctx.account, container, blob)).await
    }

    // Containers

    pub async fn create_container(&self, ctx: &RequestContext) -> StorageResult<ContainerModel> {
        let result = container::create_container(self, ctx).await;
        finish(ctx, "CreateContainer", result)
    }

    pub async fn get_container_properties(
        &self,
        ctx: &RequestContext,
    ) -> StorageResult<ContainerModel> {
        let result = container::get_container_properties(self, ctx).await;
        finish(ctx, "GetContainerProperties", result)
    }

    pub async fn delete_container(&self, ctx: &RequestContext) -> StorageResult<()> {
        let result = container::delete_container(self, ctx).await;
        finish(ctx, "DeleteContainer", result)
    }

    pub async fn container_lease(&self, ctx: &RequestContext) -> StorageResult<LeaseResponse> {
        let result = container::container_lease(self, ctx).await;
        finish(ctx, "LeaseContainer", result)
    }

    // Blobs

    pub async fn get_blob_properties(&self, ctx: &RequestContext) -> StorageResult<BlobModel> {
        let result = blob::get_blob_properties(self, ctx).await;
        finish(ctx, "GetBlobProperties", result)
    }

    pub async fn delete_blob(&self, ctx: &RequestContext) -> StorageResult<()> {
        let result = blob::delete_blob(self, ctx).await;
        finish(ctx, "DeleteBlob", result)
    }

    pub async fn blob_lease(&self, ctx: &RequestContext) -> StorageResult<LeaseResponse> {
        let result = blob::blob_lease(self, ctx).await;
        finish(ctx, "LeaseBlob", result)
    }

    pub async fn set_blob_tags(
        &self,
        ctx: &RequestContext,
        tags: HashMap<String, String>,
    ) -> StorageResult<()> {
        let result = blob::set_blob_tags(self, ctx, tags).await;
        finish(ctx, "SetBlobTags", result)
    }

    pub async fn get_blob_tags(
        &self,
        ctx: &RequestContext,
    ) -> StorageResult<HashMap<String, String>> {
        let result = blob::get_blob_tags(self, ctx).await;
        finish(ctx, "GetBlobTags", result)
    }

    pub async fn create_snapshot(&self, ctx: &RequestContext) -> StorageResult<BlobModel> {
        let result = blob::create_snapshot(self, ctx).await;
        finish(ctx, "CreateSnapshot", result)
    }

    pub async fn filter_blobs(&self, ctx: &RequestContext) -> StorageResult<Vec<FilteredBlob>> {
        let result = blob::filter_blobs(self, ctx).await;
        finish(ctx, "FilterBlobs", result)
    }

    // Page blobs

    pub async fn create_page_blob(&self, ctx: &RequestContext) -> StorageResult<BlobModel> {
        let result = page_blob::create_page_blob(self, ctx).await;
        finish(ctx, "CreatePageBlob", result)
    }

    pub async fn upload_pages(
        &self,
        ctx: &RequestContext,
        body: Bytes,
    ) -> StorageResult<BlobModel> {
        let result = page_blob::upload_pages(self, ctx, body).await;
        finish(ctx, "UploadPages", result)
    }

    pub async fn clear_pages(&self, ctx: &RequestContext) -> StorageResult<BlobModel> {
        let result = page_blob::clear_pages(self, ctx).await;
        finish(ctx, "ClearPages", result)
    }

    pub async fn resize_page_blob(&self, ctx: &RequestContext) -> StorageResult<BlobModel> {
        let result = page_blob::resize_page_blob(self, ctx).await;
        finish(ctx, "ResizePageBlob", result)
    }

    pub async fn update_sequence_number(&self, ctx: &RequestContext) -> StorageResult<BlobModel> {
        let result = page_blob::update_sequence_number(self, ctx).await;
        finish(ctx, "UpdateSequenceNumber", result)
    }

    pub async fn get_page_ranges(&self, ctx: &RequestContext) -> StorageResult<Vec<PageRange>> {
        let result = page_blob::get_page_ranges(self, ctx).await;
        finish(ctx, "GetPageRanges", result)
    }

    pub async fn download_blob(&self, ctx: &RequestContext) -> StorageResult<BlobDownload> {
        let result = page_blob::download_blob(self, ctx).await;
        finish(ctx, "DownloadBlob", result)
    }
}

/// Stamps the request id on a failed operation and logs the rejection.
fn finish<T>(
    ctx: &RequestContext,
    operation: &str,
    result: StorageResult<T>,
) -> StorageResult<T> {
    result.map_err(|e| {
        warn!(
            request_id = %ctx.request_id,
            operation,
            code = e.code.as_str(),
            "{}",
            e.message
        );
        e.with_request_id(&ctx.request_id)
    })
}

/// Applies the request's `x-ms-lease-action` to a resolved lease.
///
/// Returns the next lease, the lease id to report and the break time.
fn apply_lease_action(
    ctx: &RequestContext,
    lease: &Lease,
) -> StorageResult<(Lease, Option<String>, Option<u64>)> {
    let now = ctx.timestamp;
    let action = ctx.lease_action()?;

    let (next, lease_time) = match action {
        LeaseAction::Acquire => {
            let duration = ctx.lease_duration()?;
            (lease.acquire(now, duration, ctx.proposed_lease_id())?, None)
        }
        LeaseAction::Renew => (lease.renew(now, ctx.required_header("x-ms-lease-id")?)?, None),
        LeaseAction::Change => {
            let lease_id = ctx.required_header("x-ms-lease-id")?;
            let proposed = ctx.required_header("x-ms-proposed-lease-id")?;
            (lease.change(now, lease_id, proposed)?, None)
        }
        LeaseAction::Release => (lease.release(now, ctx.required_header("x-ms-lease-id")?)?, None),
        LeaseAction::Break => {
            let (next, seconds) = lease.break_lease(now, ctx.lease_break_period()?)?;
            (next, Some(seconds))
        }
    };

    debug!(
        action = action.as_str(),
        from = lease.state.as_str(),
        to = next.state.as_str(),
        "Lease transition"
    );

    let lease_id = match action {
        LeaseAction::Release | LeaseAction::Break => None,
        _ => next.id.clone(),
    };
    Ok((next, lease_id, lease_time))
}

/// Maps a blob lookup to `None` when only the blob is missing.
fn found<T>(result: StorageResult<T>) -> StorageResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.code == crate::error::ErrorCode::BlobNotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn blob_not_found() -> StorageError {
    StorageError::new(crate::error::ErrorCode::BlobNotFound)
}
