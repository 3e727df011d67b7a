//! Container operations.

use tracing::info;

use super::{apply_lease_action, BlobService, LeaseResponse};
use crate::conditions::{
    validate_read_conditions, validate_write_conditions, ConditionalHeaders, ResourceSnapshot,
};
use crate::context::RequestContext;
use crate::error::StorageResult;
use crate::lease::{validate_lease_access, LeaseAccess, LeaseDocument};
use crate::models::ContainerModel;

/// PUT /{container}?restype=container - Create container.
pub(super) async fn create_container(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<ContainerModel> {
    let name = ctx.container_name()?;

    let mut container = ContainerModel::new(ctx.account.clone(), name.to_string(), ctx.timestamp);
    container.metadata = ctx.metadata();

    service.metadata.create_container(container.clone()).await?;
    info!(account = %ctx.account, container = name, "Created container");
    Ok(container)
}

/// GET /{container}?restype=container - Get container properties.
///
/// The returned document carries the lease as resolved at the request time.
pub(super) async fn get_container_properties(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<ContainerModel> {
    let name = ctx.container_name()?;
    let container = service.metadata.get_container(&ctx.account, name).await?;

    let lease = container.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::ContainerRead)?;
    validate_read_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_container(Some(&container)).as_ref(),
    )?;

    Ok(container.with_lease(&lease))
}

/// DELETE /{container}?restype=container - Delete container.
pub(super) async fn delete_container(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<()> {
    let name = ctx.container_name()?;
    let _guard = service.lock_container(ctx, name).await;

    let container = service.metadata.get_container(&ctx.account, name).await?;
    let lease = container.to_lease()?.resolve(ctx.timestamp);
    validate_lease_access(&lease, ctx.lease_id(), LeaseAccess::ContainerWrite)?;
    validate_write_conditions(
        &ctx.conditional_headers(),
        ResourceSnapshot::of_container(Some(&container)).as_ref(),
    )?;

    service.metadata.delete_container(&ctx.account, name).await?;
    info!(account = %ctx.account, container = name, "Deleted container");
    Ok(())
}

/// PUT /{container}?comp=lease&restype=container - Lease container.
///
/// Only the date conditions apply to container leases.
pub(super) async fn container_lease(
    service: &BlobService,
    ctx: &RequestContext,
) -> StorageResult<LeaseResponse> {
    let name = ctx.container_name()?;
    let _guard = service.lock_container(ctx, name).await;

    let container = service.metadata.get_container(&ctx.account, name).await?;
    let lease = container.to_lease()?.resolve(ctx.timestamp);

    let all = ctx.conditional_headers();
    let headers = ConditionalHeaders {
        if_modified_since: all.if_modified_since,
        if_unmodified_since: all.if_unmodified_since,
        ..Default::default()
    };
    validate_write_conditions(&headers, ResourceSnapshot::of_container(Some(&container)).as_ref())?;

    let (next, lease_id, lease_time) = apply_lease_action(ctx, &lease)?;
    let container = container.with_lease(&next);
    service.metadata.update_container(container.clone()).await?;

    Ok(LeaseResponse {
        lease_id,
        lease_time,
        etag: container.properties.etag,
        last_modified: container.properties.last_modified,
    })
}
