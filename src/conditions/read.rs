use tracing::debug;

use super::{ConditionalHeaders, ResourceSnapshot, WILDCARD};
use crate::error::{ErrorCode, StorageError, StorageResult};

/// Validates conditional headers for a read.
///
/// On an existing resource each header passes or fails on its own. A failed
/// `If-Match` or `If-Unmodified-Since` is a failed precondition; a failed
/// `If-None-Match` or `If-Modified-Since` is "not modified" unless the other
/// of the pair explicitly passed. `x-ms-if-tags` is checked last.
pub fn validate_read_conditions(
    headers: &ConditionalHeaders,
    resource: Option<&ResourceSnapshot>,
) -> StorageResult<()> {
    let resource = match resource {
        Some(resource) => resource,
        None => {
            if headers.if_match.as_ref().is_some_and(|etags| !etags.is_empty()) {
                return Err(headers.not_met());
            }
            if headers
                .if_none_match
                .as_ref()
                .is_some_and(|etags| etags.iter().any(|e| e == WILDCARD))
            {
                return Err(StorageError::new(ErrorCode::UnsatisfiableCondition));
            }
            return Ok(());
        }
    };

    let if_match = headers
        .if_match
        .as_ref()
        .map(|etags| etags.iter().any(|e| e == WILDCARD) || resource.etag_in(etags));
    let if_unmodified_since = headers
        .if_unmodified_since
        .map(|since| resource.last_modified <= since);
    let if_none_match = headers
        .if_none_match
        .as_ref()
        .map(|etags| !etags.iter().any(|e| e == WILDCARD) && !resource.etag_in(etags));
    let if_modified_since = headers
        .if_modified_since
        .map(|since| since < resource.last_modified);

    debug!(
        ?if_match,
        ?if_unmodified_since,
        ?if_none_match,
        ?if_modified_since,
        "Evaluated read conditions"
    );

    if if_match == Some(false) || if_unmodified_since == Some(false) {
        return Err(headers.not_met());
    }

    if (if_none_match == Some(false) && if_modified_since != Some(true))
        || (if_modified_since == Some(false) && if_none_match != Some(true))
    {
        return Err(if headers.is_source {
            headers.not_met()
        } else {
            StorageError::new(ErrorCode::NotModified)
        });
    }

    headers.check_tags(resource)
}
