//! Page blob operations.

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use super::blob::{load_base_blob, load_blob};
use super::{blob_not_found, BlobService};
use crate::conditions::{validate_read_conditions, validate_write_conditions, ResourceSnapshot};
use crate::context::RequestContext;
use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::lease::{validate_lease_access, LeaseAccess, LeaseDocument};
use crate::models::{
    BlobModel, BlobType, PageRange, SequenceNumberAction, MAX_PAGE_BLOB_SIZE, MAX_PAGE_RANGE_SIZE,
    PAGE_SIZE,
};
use crate::ranges::{clear_range, cut_ranges, fill_zero_ranges, merge_range, RangeError};

/// Content of a blob download.
#[derive(Debug, Clone)]
pub struct BlobDownload {
    pub blob: BlobModel,
    /// Inclusive byte range returned, when the request asked for one.
    pub content_range: Option<(u64, u64)>,
    pub data: Bytes,
}

fn invalid_page_range(err: RangeError) -> StorageError {
    StorageError::with_message(ErrorCode::InvalidPageRange, err.to_string())
}

fn require_page_blob(blob: &BlobModel) -> StorageResult<()> {
    if blob.properties.blob_type != BlobType::PageBlob {
        return Err(StorageError::new(ErrorCode::InvalidBlobType));
    }
    Ok(())
}

/// Validates a blob size for a page blob.
fn check_blob_size(size: u64) -> StorageResult<()> {
    if size % PAGE_SIZE != 0 {
        return Err(StorageError::invalid_header(
            "x-ms-blob-content-length",
            format!("{} is not a multiple of {}", size, PAGE_SIZE),
        ));
    }
    if size > MAX_PAGE_BLOB_SIZE {
        return Err(StorageError::with_message(
            ErrorCode::OutOfRangeInput,
            format!("Page blob size {} exceeds the maximum of {}.", size, MAX_PAGE_BLOB_SIZE),
        ));
    }
    Ok(())
}

/// Reads the page-aligned `x-ms-range` of a page write or clear.
fn page_range(ctx: &RequestContext) -> StorageResult<(u64, u64)> {
    let (start, end) = match ctx.range()? {
        Some((start, Some(end))) if start <= end => (start, end),
        Some(_) => {
            return Err(StorageError::with_message(
                ErrorCode::InvalidPageRange,
                "The page range must have an explicit end at or after its start.",
            ))
        }
        None => {
            return Err(StorageError::with_message(
                ErrorCode::MissingRequiredHeader,
                "The x-ms-range header is required for page operations.",
            ))
        }
    };

    if start % PAGE_SIZE != 0 || end % PAGE_SIZE != PAGE_SIZE - 1 {
        return Err(StorageError::with_message(
            ErrorCode::InvalidPageRange,
            format!("Range {}-{} is not aligned to {} byte pages.", start, end, PAGE_SIZE),
        ));
    }
    Ok((start, end))
}

/// Byte count of the inclusive range `[start, end]`, if it fits in a u64.
fn range_length(start: u64, end: u64) -> Option<u64> {
    end.checked_sub(start)?.checked_add(1)
}

/// Loads a committed page blob for a page write and checks its write preconditions.
async fn load_for_page_write(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let blob = load_base_blob(service, ctx).await?;
    validate_write_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(blob.as_ref()).as_ref(),
    )?;
    let blob = blob.filter(|b| b.is_committed).ok_or_else(blob_not_found)?;
    require_page_blob(&blob)?;
    Ok(blob)
}

/// Resolves the lease of a blob about to be written and stores it back.
fn write_lease(ctx: &RequestContext, blob: BlobModel) -> StorageResult<BlobModel> {
    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobWrite)?;
    Ok(blob.with_write_lease(&lease))
}

/// PUT /{container}/{blob} with x-ms-blob-type: PageBlob - Create page blob.
pub(super) async fn create_page_blob(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;

    let size = ctx.blob_content_length()?.ok_or_else(|| {
        StorageError::with_message(
            ErrorCode::MissingRequiredHeader,
            "The x-ms-blob-content-length header is required for page blobs.",
        )
    })?;
    check_blob_size(size)?;
    let sequence_number = ctx.blob_sequence_number()?.unwrap_or(0);

    if !service.metadata.container_exists(&ctx.account, container).await {
        return Err(StorageError::new(ErrorCode::ContainerNotFound));
    }

    let _guard = service.lock_blob(ctx, container, name).await;

    let existing = load_base_blob(service, ctx).await?;
    validate_write_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(existing.as_ref()).as_ref(),
    )?;

    let mut blob = BlobModel::new(
        ctx.account.clone(),
        container.to_string(),
        name.to_string(),
        BlobType::PageBlob,
        size,
        ctx.timestamp,
    );
    if let Some(existing) = existing {
        let lease = existing.to_lease()?.resolve(ctx.timestamp);
        validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobWrite)?;
        blob = blob.with_write_lease(&lease);
    }

    blob.properties.sequence_number = Some(sequence_number);
    if let Some(content_type) = ctx.content_type() {
        blob.properties.content_type = Some(content_type.to_string());
    }
    blob.metadata = ctx.metadata();

    service.metadata.put_blob(blob.clone()).await?;
    info!(container, blob = name, size, "Created page blob");
    Ok(blob)
}

/// PUT /{container}/{blob}?comp=page with x-ms-page-write: update - Upload pages.
pub(super) async fn upload_pages(
    service: &BlobService,
    ctx: &RequestContext,
    body: Bytes,
) -> StorageResult<BlobModel> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let (start, end) = page_range(ctx)?;

    let length = range_length(start, end)
        .filter(|&length| length <= MAX_PAGE_RANGE_SIZE)
        .ok_or_else(|| {
            StorageError::with_message(
                ErrorCode::InvalidPageRange,
                format!("A page write is limited to {} bytes.", MAX_PAGE_RANGE_SIZE),
            )
        })?;
    if body.len() as u64 != length {
        return Err(StorageError::with_message(
            ErrorCode::InvalidHeaderValue,
            format!("Body is {} bytes but the range covers {}.", body.len(), length),
        ));
    }

    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_for_page_write(service, ctx).await?;
    if end >= blob.properties.content_length {
        return Err(StorageError::new(ErrorCode::InvalidPageRange));
    }
    let mut blob = write_lease(ctx, blob)?;
    ctx.sequence_number_conditions()?
        .validate(blob.properties.sequence_number.unwrap_or(0))?;

    let chunk = service.extents.write(body).await?;
    merge_range(&mut blob.page_ranges, PageRange::new(start, end, chunk))
        .map_err(invalid_page_range)?;
    blob.properties.update_etag(ctx.timestamp);

    service.metadata.put_blob(blob.clone()).await?;
    debug!(container, blob = name, start, end, "Uploaded pages");
    Ok(blob)
}

/// PUT /{container}/{blob}?comp=page with x-ms-page-write: clear - Clear pages.
pub(super) async fn clear_pages(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let (start, end) = page_range(ctx)?;

    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_for_page_write(service, ctx).await?;
    if end >= blob.properties.content_length {
        return Err(StorageError::new(ErrorCode::InvalidPageRange));
    }
    let mut blob = write_lease(ctx, blob)?;
    ctx.sequence_number_conditions()?
        .validate(blob.properties.sequence_number.unwrap_or(0))?;

    clear_range(&mut blob.page_ranges, start, end).map_err(invalid_page_range)?;
    blob.properties.update_etag(ctx.timestamp);

    service.metadata.put_blob(blob.clone()).await?;
    debug!(container, blob = name, start, end, "Cleared pages");
    Ok(blob)
}

/// PUT /{container}/{blob}?comp=properties with x-ms-blob-content-length - Resize.
///
/// Shrinking drops every written range past the new size.
pub(super) async fn resize_page_blob(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let size = ctx.blob_content_length()?.ok_or_else(|| {
        StorageError::with_message(
            ErrorCode::MissingRequiredHeader,
            "The x-ms-blob-content-length header is required to resize a page blob.",
        )
    })?;
    check_blob_size(size)?;

    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_for_page_write(service, ctx).await?;
    let mut blob = write_lease(ctx, blob)?;

    let old_size = blob.properties.content_length;
    if size < old_size {
        clear_range(&mut blob.page_ranges, size, old_size - 1).map_err(invalid_page_range)?;
    }
    blob.properties.content_length = size;
    blob.properties.update_etag(ctx.timestamp);

    service.metadata.put_blob(blob.clone()).await?;
    info!(container, blob = name, old_size, size, "Resized page blob");
    Ok(blob)
}

/// PUT /{container}/{blob}?comp=properties with x-ms-sequence-number-action.
pub(super) async fn update_sequence_number(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobModel> {
    let container = ctx.container_name()?;
    let name = ctx.blob_name()?;
    let action = ctx.sequence_number_action()?;
    let requested = ctx.blob_sequence_number()?;

    let _guard = service.lock_blob(ctx, container, name).await;

    let blob = load_for_page_write(service, ctx).await?;
    let mut blob = write_lease(ctx, blob)?;
    let current = blob.properties.sequence_number.unwrap_or(0);

    let next = match (action, requested) {
        (SequenceNumberAction::Increment, Some(_)) => {
            return Err(StorageError::invalid_header(
                "x-ms-blob-sequence-number",
                "must not be set when the action is increment",
            ))
        }
        (SequenceNumberAction::Increment, None) => current.checked_add(1).ok_or_else(|| {
            StorageError::with_message(
                ErrorCode::OutOfRangeInput,
                "The sequence number overflowed.",
            )
        })?,
        (_, None) => {
            return Err(StorageError::with_message(
                ErrorCode::MissingRequiredHeader,
                "The x-ms-blob-sequence-number header is required for max and update.",
            ))
        }
        (SequenceNumberAction::Max, Some(requested)) => current.max(requested),
        (SequenceNumberAction::Update, Some(requested)) => requested,
    };

    blob.properties.sequence_number = Some(next);
    blob.properties.update_etag(ctx.timestamp);

    service.metadata.put_blob(blob.clone()).await?;
    debug!(container, blob = name, from = current, to = next, "Updated sequence number");
    Ok(blob)
}

/// Loads a readable page blob or page blob snapshot.
async fn load_for_read(service: &BlobService, ctx: &RequestContext) -> StorageResult<BlobModel> {
    let blob = load_blob(service, ctx).await?;
    validate_read_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_blob(blob.as_ref()).as_ref(),
    )?;
    let blob = blob.filter(|b| b.is_committed).ok_or_else(blob_not_found)?;

    let lease = blob.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::BlobRead)?;
    require_page_blob(&blob)?;
    Ok(blob)
}

/// GET /{container}/{blob}?comp=pagelist - Get page ranges.
pub(super) async fn get_page_ranges(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<Vec<PageRange>> {
    let blob = load_for_read(service, ctx).await?;

    match ctx.range()? {
        None => Ok(blob.page_ranges),
        Some((start, end)) => {
            let end = end.unwrap_or(u64::MAX);
            if start > end {
                return Err(StorageError::new(ErrorCode::InvalidRange));
            }
            cut_ranges(&blob.page_ranges, start, end).map_err(invalid_page_range)
        }
    }
}

/// GET /{container}/{blob} - Download a page blob.
///
/// Unwritten pages read as zeros. A single response carries at most
/// `Config::max_download_size` bytes.
pub(super) async fn download_blob(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<BlobDownload> {
    let blob = load_for_read(service, ctx).await?;
    let size = blob.properties.content_length;

    let requested = ctx.range()?;
    let (start, end) = match requested {
        Some((start, end)) => {
            if start >= size || end.is_some_and(|end| end < start) {
                return Err(StorageError::with_message(
                    ErrorCode::InvalidRange,
                    format!(
                        "The range starting at {} is not satisfiable for {} bytes.",
                        start, size
                    ),
                ));
            }
            (start, end.map_or(size - 1, |end| end.min(size - 1)))
        }
        None if size == 0 => {
            return Ok(BlobDownload {
                blob,
                content_range: None,
                data: Bytes::new(),
            })
        }
        None => (0, size - 1),
    };

    let limit = service.config.max_download_size;
    let length = range_length(start, end)
        .filter(|&length| length <= limit)
        .and_then(|length| usize::try_from(length).ok())
        .ok_or_else(|| {
            StorageError::with_message(
                ErrorCode::OutOfRangeInput,
                format!(
                    "Range {}-{} exceeds the download limit of {} bytes; request a smaller range.",
                    start, end, limit
                ),
            )
        })?;

    let parts = fill_zero_ranges(&blob.page_ranges, start, end).map_err(invalid_page_range)?;
    let mut data = BytesMut::with_capacity(length);
    for part in &parts {
        data.extend_from_slice(&service.extents.read(&part.persistency).await?);
    }

    debug!(start, end, parts = parts.len(), "Downloaded page blob");
    Ok(BlobDownload {
        blob,
        content_range: requested.map(|_| (start, end)),
        data: data.freeze(),
    })
}
