//! Blob operations shared by all blob types.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

use super::{apply_lease_action, blob_not_found, found, BlobService, LeaseResponse};
use crate::conditions::{
    validate_read_conditions, validate_write_conditions, ConditionalHeaders, ResourceSnapshot,
};
use crate::context::RequestContext;
use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::lease::{validate_lease_access, LeaseAccess, LeaseDocument};
use crate::models::BlobModel;
use crate::query::{parse_predicate, TagBindings};

/// Maximum number of tags on a blob.
pub const MAX_TAGS: usize = 10;
const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;

/// A blob matched by a tag filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredBlob {
    pub container: String,
    pub name: String,
    pub tags: HashMap<String, String>,
}

fn tag_pattern() -> StorageResult<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let pattern = Regex::new(r"^[a-zA-Z0-9 +\-./:=_]*$")
        .map_err(|e| StorageError::with_message(ErrorCode::InternalError, e.to_string()))?;
    Ok(PATTERN.get_or_init(|| pattern))
}

fn invalid_tag(message: String) -> StorageError {
    StorageError::with_message(ErrorCode::InvalidTag, message)
}

/// Validates a blob tag set.
pub fn validate_tags(tags: &HashMap<String, String>) -> StorageResult<()> {
    if tags.len() > MAX_TAGS {
        return Err(invalid_tag(format!(
            "A blob can have at most {} tags, got {}.",
            MAX_TAGS,
            tags.len()
        )));
    }

    let pattern = tag_pattern()?;
    for (key, value) in tags {
        let key_len = key.chars().count();
        if key_len == 0 || key_len > MAX_TAG_KEY_LEN {
            return Err(invalid_tag(format!(
                "Tag key '{}' must be between 1 and {} characters.",
                key, MAX_TAG_KEY_LEN
            )));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(invalid_tag(format!(
                "Tag value for '{}' must be at most {} characters.",
                key, MAX_TAG_VALUE_LEN
            )));
        }
        if !pattern.is_match(key) || !pattern.is_match(value) {
            return Err(invalid_tag(format!(
                "Tag '{}' contains characters outside letters, digits, space and + - . / : = _.",
                key
            )));
        }
    }
    Ok(())
}

/// Loads the addressed blob (or snapshot); `None` if it does not exist.
pub(super) async fn load_blob(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<Option<BlobModel>> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let snapshot = ctx.snapshot().unwrap_or("");
    found(service.metadata.get_blob(&ctx.account, container, name, snapshot).await)
}

/// Loads the base blob, ignoring any snapshot parameter.
pub(super) async fn load_base_blob(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<Option<BlobModel>> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    found(service.metadata.get_blob(&ctx.account, container, name, "").await)
}

/// HEAD /{container}/{blob} - Get blob properties.
pub(super) async fn get_blob_properties(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let blob = load_blob(service, ctx).await?;
    validate_read_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(blob.as_ref()).as_ref(),
    )?;
    let blob = blob.ok_or_else(blob_not_found)?;

    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobRead)?;

    Ok(if blob.snapshot.is_empty() {
        blob.with_lease(&lease)
    } else {
        blob
    })
}

/// DELETE /{container}/{blob} - Delete blob or snapshot.
pub(super) async fn delete_blob(service: &BlobService, ctx: &RequestContext) -> StorageResult<()> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_blob(service, ctx).await?;
    validate_write_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(blob.as_ref()).as_ref(),
    )?;
    let blob = blob.ok_or_else(blob_not_found)?;

    // The lease lives on the base blob; deleting a snapshot needs no lease id.
    if blob.snapshot.is_empty() {
        let lease = blob.to_lease()?.resolve(ctx.timestamp);
        validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobWrite)?;
    }

    service
        .metadata
        .delete_blob(&ctx.account, container, name, &blob.snapshot)
        .await?;
    info!(container, blob = name, snapshot = %blob.snapshot, "Deleted blob");
    Ok(())
}

/// PUT /{container}/{blob}?comp=lease - Lease blob.
pub(super) async fn blob_lease(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<LeaseResponse> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_base_blob(service, ctx).await?;
    validate_write_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(blob.as_ref()).as_ref(),
    )?;
    let blob = blob
        .filter(|b| b.is_committed)
        .ok_or_else(blob_not_found)?;

    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    let (next, lease_id, lease_time) = apply_lease_action(ctx, &lease)?;

    let blob = blob.with_lease(&next);
    service.metadata.put_blob(blob.clone()).await?;

    Ok(LeaseResponse {
        lease_id,
        lease_time,
        etag: blob.properties.etag,
        last_modified: blob.properties.last_modified,
    })
}

/// PUT /{container}/{blob}?comp=tags - Set blob tags.
///
/// Only `x-ms-if-tags` applies. A supplied lease id must name the active
/// lease, but a leased blob accepts tags without one.
pub(super) async fn set_blob_tags(
    service: &BlobService,
    ctx: &RequestContext,
    tags: HashMap<String, String>,
) -> StorageResult<()> {
    validate_tags(&tags)?;

    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_blob(service, ctx).await?;
    let headers = ConditionalHeaders {
        if_tags: ctx.conditional_headers().if_tags,
        ..Default::default()
    };
    validate_write_conditions(&headers, ResourceSnapshot::of_blob(blob.as_ref()).as_ref())?;
    let mut blob = blob.ok_or_else(blob_not_found)?;

    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobRead)?;

    debug!(container, blob = name, count = tags.len(), "Setting blob tags");
    blob.tags = tags;
    service.metadata.put_blob(blob).await
}

/// GET /{container}/{blob}?comp=tags - Get blob tags.
pub(super) async fn get_blob_tags(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<HashMap<String, String>> {
    let blob = load_blob(service, ctx).await?;
    let headers = ConditionalHeaders {
        if_tags: ctx.conditional_headers().if_tags,
        ..Default::default()
    };
    validate_read_conditions(&headers, ResourceSnapshot::of_blob(blob.as_ref()).as_ref())?;
    let blob = blob.ok_or_else(blob_not_found)?;

    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobRead)?;

    Ok(blob.tags)
}

/// PUT /{container}/{blob}?comp=snapshot - Create snapshot.
pub(super) async fn create_snapshot(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_base_blob(service, ctx).await?;
    validate_write_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(blob.as_ref()).as_ref(),
    )?;
    let blob = blob.filter(|b| b.is_committed).ok_or_else(blob_not_found)?;

    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobRead)?;

    let mut snapshot = blob.create_snapshot(ctx.timestamp);
    let metadata = ctx.metadata();
    if !metadata.is_empty() {
        snapshot.metadata = metadata;
    }

    service.metadata.put_blob(snapshot.clone()).await?;
    info!(container, blob = name, snapshot = %snapshot.snapshot, "Created snapshot");
    Ok(snapshot)
}

/// GET /?comp=blobs or /{container}?restype=container&comp=blobs - Find blobs by tags.
///
/// The `where` expression may reference `@container`.
pub(super) async fn filter_blobs(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<Vec<FilteredBlob>> {
    let filter = ctx.query_param("where").ok_or_else(|| {
        StorageError::with_message(
            ErrorCode::InvalidQueryParameterValue,
            "The query parameter where is required.",
        )
    })?;
    let expr = parse_predicate(filter).map_err(|e| e.into_query_error("where"))?;

    let max_results = match ctx.query_param("maxresults") {
        Some(value) => Some(value.parse::<usize>().map_err(|_| {
            StorageError::with_message(
                ErrorCode::InvalidQueryParameterValue,
                format!("The value for query parameter maxresults is invalid: {}", value),
            )
        })?),
        None => None,
    };

    let blobs = service
        .metadata
        .list_blobs(&ctx.account, ctx.container.as_deref())
        .await?;

    let matches: Vec<FilteredBlob> = blobs
        .into_iter()
        .filter(|b| b.is_committed)
        .filter(|b| expr.evaluate(&TagBindings::new(&b.tags, Some(b.container.as_str()))))
        .take(max_results.unwrap_or(usize::MAX))
        .map(|b| FilteredBlob {
            container: b.container,
            name: b.name,
            tags: b.tags,
        })
        .collect();

    debug!(filter, matched = matches.len(), "Filtered blobs by tags");
    Ok(matches)
}
