use tracing::debug;

use super::{ConditionalHeaders, ResourceSnapshot, WILDCARD};
use crate::error::{ErrorCode, StorageError, StorageResult};

fn multiple(message: &str) -> StorageError {
    StorageError::with_message(ErrorCode::MultipleConditionHeadersNotSupported, message)
}

/// Rejects header combinations writes do not support.
fn check_combination(headers: &ConditionalHeaders) -> StorageResult<()> {
    for etags in [&headers.if_match, &headers.if_none_match].into_iter().flatten() {
        if etags.len() > 1 {
            return Err(multiple("Multiple etags in a condition header are not supported."));
        }
    }

    let present = [
        headers.if_match.is_some(),
        headers.if_none_match.is_some(),
        headers.if_modified_since.is_some(),
        headers.if_unmodified_since.is_some(),
    ]
    .iter()
    .filter(|&&p| p)
    .count();

    if present > 2 {
        return Err(multiple("At most two condition headers are supported."));
    }
    if present == 2 && headers.if_none_match.is_some() && headers.if_modified_since.is_some() {
        return Err(multiple(
            "If-None-Match and If-Modified-Since cannot be combined.",
        ));
    }
    Ok(())
}

/// Validates conditional headers for a write.
///
/// A missing resource may always be created under `If-None-Match`, and only
/// under a wildcard `If-Match`. On an existing resource every present header
/// is checked in order: `If-None-Match`, `If-Match`, `If-Modified-Since`,
/// `If-Unmodified-Since`, `x-ms-if-tags`. A wildcard `If-None-Match` passes.
pub fn validate_write_conditions(
    headers: &ConditionalHeaders,
    resource: Option<&ResourceSnapshot>,
) -> StorageResult<()> {
    check_combination(headers)?;

    let resource = match resource {
        Some(resource) => resource,
        None => {
            if headers.if_none_match.is_some() {
                return Ok(());
            }
            if let Some(etags) = &headers.if_match {
                if !etags.iter().any(|e| e == WILDCARD) {
                    return Err(headers.not_met());
                }
            }
            return Ok(());
        }
    };

    if let Some(etags) = &headers.if_none_match {
        if etags.iter().any(|e| e != WILDCARD && *e == resource.etag) {
            debug!(etag = %resource.etag, "If-None-Match matched current etag");
            return Err(headers.not_met());
        }
    }

    if let Some(etags) = &headers.if_match {
        if !etags.iter().any(|e| e == WILDCARD) && !resource.etag_in(etags) {
            debug!(etag = %resource.etag, "If-Match did not match current etag");
            return Err(headers.not_met());
        }
    }

    if let Some(since) = headers.if_modified_since {
        if resource.last_modified <= since {
            debug!(last_modified = %resource.last_modified, "Resource not modified since");
            return Err(headers.not_met());
        }
    }

    if let Some(since) = headers.if_unmodified_since {
        if resource.last_modified > since {
            debug!(last_modified = %resource.last_modified, "Resource modified since");
            return Err(headers.not_met());
        }
    }

    headers.check_tags(resource)
}
