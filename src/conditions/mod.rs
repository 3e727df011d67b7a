//! HTTP conditional request evaluation.
//!
//! Both validators take the request's [`ConditionalHeaders`] and an optional
//! [`ResourceSnapshot`]; `None` means the resource does not exist. Reads and
//! writes disagree on several points, so they live in separate modules.

mod read;
mod sequence;
mod write;

pub use read::validate_read_conditions;
pub use sequence::*;
pub use write::validate_write_conditions;

use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;

use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{BlobModel, ContainerModel};
use crate::query::parse_predicate;

/// Etag wildcard.
pub const WILDCARD: &str = "*";

pub const IF_TAGS: &str = "x-ms-if-tags";
pub const SOURCE_IF_TAGS: &str = "x-ms-source-if-tags";

/// Strips whitespace and surrounding quotes from an etag.
pub fn unquote_etag(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}

/// Splits a comma-separated etag header into unquoted etags.
pub fn split_etags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(unquote_etag)
        .filter(|etag| !etag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Conditional headers of one request, already parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_match: Option<Vec<String>>,
    pub if_none_match: Option<Vec<String>>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
    pub if_tags: Option<String>,
    /// Set when these are the `x-ms-source-if-*` headers of a copy source.
    pub is_source: bool,
}

impl ConditionalHeaders {
    fn tags_header(&self) -> &'static str {
        if self.is_source {
            SOURCE_IF_TAGS
        } else {
            IF_TAGS
        }
    }

    /// The failed-precondition error for this header set.
    fn not_met(&self) -> StorageError {
        if self.is_source {
            StorageError::new(ErrorCode::SourceConditionNotMet)
        } else {
            StorageError::new(ErrorCode::ConditionNotMet)
        }
    }

    /// Evaluates `if_tags`, if any, against the resource tags.
    fn check_tags(&self, resource: &ResourceSnapshot) -> StorageResult<()> {
        let predicate = match &self.if_tags {
            Some(predicate) => predicate,
            None => return Ok(()),
        };
        let expr = parse_predicate(predicate).map_err(|e| e.into_header_error(self.tags_header()))?;
        if !expr.evaluate(&resource.tags) {
            return Err(self.not_met());
        }
        Ok(())
    }
}

/// The parts of an existing resource that conditions compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSnapshot {
    /// Unquoted etag.
    pub etag: String,
    /// Truncated to whole seconds, like HTTP dates.
    pub last_modified: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}

impl ResourceSnapshot {
    pub fn new(etag: &str, last_modified: DateTime<Utc>, tags: HashMap<String, String>) -> Self {
        Self {
            etag: unquote_etag(etag).to_string(),
            last_modified: truncate_to_seconds(last_modified),
            tags,
        }
    }

    /// Snapshot of a blob; uncommitted blobs count as missing.
    pub fn of_blob(blob: Option<&BlobModel>) -> Option<Self> {
        blob.filter(|b| b.is_committed).map(|b| {
            Self::new(&b.properties.etag, b.properties.last_modified, b.tags.clone())
        })
    }

    pub fn of_container(container: Option<&ContainerModel>) -> Option<Self> {
        container.map(|c| {
            Self::new(&c.properties.etag, c.properties.last_modified, HashMap::new())
        })
    }

    fn etag_in(&self, etags: &[String]) -> bool {
        etags.iter().any(|etag| etag == &self.etag)
    }
}

/// Drops sub-second precision.
pub fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(0).unwrap_or(time)
}
