//! Request context handed to the blob service.
//!
//! The protocol layer builds one [`RequestContext`] per request. Its
//! `timestamp` is the single "now" of the operation: lease resolution and
//! lease transitions all read it instead of the clock.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use std::collections::HashMap;
use uuid::Uuid;

use crate::conditions::{
    split_etags, truncate_to_seconds, ConditionalHeaders, SequenceNumberConditions,
};
use crate::config::DEFAULT_ACCOUNT;
use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::lease::LeaseAction;
use crate::models::SequenceNumberAction;

/// Extracted request context containing all relevant information.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request ID.
    pub request_id: String,
    /// Account name extracted from path.
    pub account: String,
    /// Container name (if present).
    pub container: Option<String>,
    /// Blob name (if present).
    pub blob: Option<String>,
    /// Query parameters.
    pub query_params: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context from path and query parameters.
    pub fn new(
        headers: HeaderMap,
        path_params: HashMap<String, String>,
        query_params: HashMap<String, String>,
    ) -> Self {
        let account = path_params
            .get("account")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

        Self {
            request_id: Uuid::new_v4().to_string(),
            account,
            container: path_params.get("container").cloned(),
            blob: path_params.get("blob").cloned(),
            query_params,
            headers,
            timestamp: Utc::now(),
        }
    }

    /// Context for a blob in the given account.
    pub fn for_blob(account: &str, container: &str, blob: &str) -> Self {
        let path_params = HashMap::from([
            ("account".to_string(), account.to_string()),
            ("container".to_string(), container.to_string()),
            ("blob".to_string(), blob.to_string()),
        ]);
        Self::new(HeaderMap::new(), path_params, HashMap::new())
    }

    /// Context for a container in the given account.
    pub fn for_container(account: &str, container: &str) -> Self {
        let path_params = HashMap::from([
            ("account".to_string(), account.to_string()),
            ("container".to_string(), container.to_string()),
        ]);
        Self::new(HeaderMap::new(), path_params, HashMap::new())
    }

    /// Replaces the operation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query_params.insert(name.to_string(), value.to_string());
        self
    }

    /// Returns the value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Returns the value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a header that must be present.
    pub fn required_header(&self, name: &str) -> StorageResult<&str> {
        self.header(name).ok_or_else(|| {
            StorageError::with_message(
                ErrorCode::MissingRequiredHeader,
                format!(
                    "An HTTP header that's mandatory for this request is not specified: {}",
                    name
                ),
            )
        })
    }

    fn integer_header<T: std::str::FromStr>(&self, name: &str) -> StorageResult<Option<T>> {
        match self.header(name) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| {
                    StorageError::invalid_header(name, format!("'{}' is not an integer", value))
                }),
            None => Ok(None),
        }
    }

    /// Container name, or an error if the request has none.
    pub fn container_name(&self) -> StorageResult<&str> {
        self.container
            .as_deref()
            .ok_or_else(|| StorageError::new(ErrorCode::ContainerNotFound))
    }

    /// Blob name, or an error if the request has none.
    pub fn blob_name(&self) -> StorageResult<&str> {
        self.blob
            .as_deref()
            .ok_or_else(|| StorageError::new(ErrorCode::BlobNotFound))
    }

    /// Returns the Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns the requested byte range, preferring `x-ms-range`.
    pub fn range(&self) -> StorageResult<Option<(u64, Option<u64>)>> {
        let (name, value) = match (self.header("x-ms-range"), self.header("range")) {
            (Some(value), _) => ("x-ms-range", value),
            (None, Some(value)) => ("range", value),
            (None, None) => return Ok(None),
        };
        parse_range_header(value)
            .map(Some)
            .ok_or_else(|| {
                StorageError::invalid_header(name, format!("'{}' is not a byte range", value))
            })
    }

    /// Returns the x-ms-lease-id header value.
    pub fn lease_id(&self) -> Option<&str> {
        self.header("x-ms-lease-id")
    }

    /// Returns the x-ms-lease-action header value.
    pub fn lease_action(&self) -> StorageResult<LeaseAction> {
        let value = self.required_header("x-ms-lease-action")?;
        LeaseAction::parse(value).ok_or_else(|| {
            StorageError::invalid_header("x-ms-lease-action", format!("unknown action '{}'", value))
        })
    }

    /// Returns x-ms-lease-duration; `None` when absent.
    pub fn lease_duration(&self) -> StorageResult<Option<i64>> {
        self.integer_header("x-ms-lease-duration")
    }

    /// Returns x-ms-lease-break-period; `None` when absent.
    pub fn lease_break_period(&self) -> StorageResult<Option<i64>> {
        self.integer_header("x-ms-lease-break-period")
    }

    /// Returns the x-ms-proposed-lease-id header value.
    pub fn proposed_lease_id(&self) -> Option<&str> {
        self.header("x-ms-proposed-lease-id")
    }

    /// Returns the x-ms-blob-content-length header value.
    pub fn blob_content_length(&self) -> StorageResult<Option<u64>> {
        self.integer_header("x-ms-blob-content-length")
    }

    /// Returns the x-ms-blob-sequence-number header value.
    pub fn blob_sequence_number(&self) -> StorageResult<Option<u64>> {
        self.integer_header("x-ms-blob-sequence-number")
    }

    /// Returns the x-ms-sequence-number-action header value.
    pub fn sequence_number_action(&self) -> StorageResult<SequenceNumberAction> {
        let value = self.required_header("x-ms-sequence-number-action")?;
        SequenceNumberAction::parse(value).ok_or_else(|| {
            StorageError::invalid_header(
                "x-ms-sequence-number-action",
                format!("unknown action '{}'", value),
            )
        })
    }

    /// Returns the page write sequence number conditions.
    pub fn sequence_number_conditions(&self) -> StorageResult<SequenceNumberConditions> {
        Ok(SequenceNumberConditions {
            less_than_or_equal_to: self.integer_header("x-ms-if-sequence-number-le")?,
            less_than: self.integer_header("x-ms-if-sequence-number-lt")?,
            equal_to: self.integer_header("x-ms-if-sequence-number-eq")?,
        })
    }

    /// Returns the If-* and x-ms-if-tags conditions of the request.
    pub fn conditional_headers(&self) -> ConditionalHeaders {
        ConditionalHeaders {
            if_match: self.header("if-match").map(split_etags),
            if_none_match: self.header("if-none-match").map(split_etags),
            if_modified_since: self.header("if-modified-since").and_then(parse_http_date),
            if_unmodified_since: self.header("if-unmodified-since").and_then(parse_http_date),
            if_tags: self.header("x-ms-if-tags").map(String::from),
            is_source: false,
        }
    }

    /// Returns the x-ms-source-if-* conditions of a copy.
    pub fn source_conditional_headers(&self) -> ConditionalHeaders {
        ConditionalHeaders {
            if_match: self.header("x-ms-source-if-match").map(split_etags),
            if_none_match: self.header("x-ms-source-if-none-match").map(split_etags),
            if_modified_since: self
                .header("x-ms-source-if-modified-since")
                .and_then(parse_http_date),
            if_unmodified_since: self
                .header("x-ms-source-if-unmodified-since")
                .and_then(parse_http_date),
            if_tags: self.header("x-ms-source-if-tags").map(String::from),
            is_source: true,
        }
    }

    /// Returns user-defined metadata from x-ms-meta-* headers.
    pub fn metadata(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                let name_str = name.as_str();
                if let Some(key) = name_str.strip_prefix("x-ms-meta-") {
                    value.to_str().ok().map(|v| (key.to_string(), v.to_string()))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Returns the snapshot query parameter.
    pub fn snapshot(&self) -> Option<&str> {
        self.query_param("snapshot")
    }
}

/// Parses a Range header value like "bytes=0-1023" or "bytes=0-".
fn parse_range_header(value: &str) -> Option<(u64, Option<u64>)> {
    let value = value.trim().strip_prefix("bytes=")?;
    let (start, end) = value.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: Option<u64> = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}

/// Parses an HTTP date in RFC 1123 format, truncated to whole seconds.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .map(truncate_to_seconds)
}

/// Formats a DateTime as RFC 1123 format for HTTP headers.
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-511"), Some((0, Some(511))));
        assert_eq!(parse_range_header("bytes=512-"), Some((512, None)));
        assert_eq!(parse_range_header("0-511"), None);
        assert_eq!(parse_range_header("bytes=a-b"), None);
    }

    #[test]
    fn test_http_date_round_trip() {
        let date = Utc.with_ymd_and_hms(2019, 1, 1, 8, 30, 0).unwrap();
        let text = format_http_date(&date);
        assert_eq!(text, "Tue, 01 Jan 2019 08:30:00 GMT");
        assert_eq!(parse_http_date(&text), Some(date));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn test_conditional_headers() {
        let ctx = RequestContext::for_blob("acct", "c", "b")
            .with_header("if-match", "\"0x1\"")
            .with_header("if-unmodified-since", "Tue, 01 Jan 2019 08:30:00 GMT")
            .with_header("x-ms-if-tags", "a = 'b'")
            .with_header("x-ms-source-if-none-match", "*");

        let headers = ctx.conditional_headers();
        assert_eq!(headers.if_match, Some(vec!["0x1".to_string()]));
        assert!(headers.if_unmodified_since.is_some());
        assert_eq!(headers.if_tags.as_deref(), Some("a = 'b'"));
        assert!(!headers.is_source);

        let source = ctx.source_conditional_headers();
        assert_eq!(source.if_none_match, Some(vec!["*".to_string()]));
        assert!(source.is_source);
    }

    #[test]
    fn test_lease_parameters() {
        let ctx = RequestContext::for_blob("acct", "c", "b")
            .with_header("x-ms-lease-action", "Acquire")
            .with_header("x-ms-lease-duration", "-1");
        assert_eq!(ctx.lease_action().unwrap(), LeaseAction::Acquire);
        assert_eq!(ctx.lease_duration().unwrap(), Some(-1));
        assert_eq!(ctx.lease_break_period().unwrap(), None);

        let bad = ctx.with_header("x-ms-lease-break-period", "soon");
        let err = bad.lease_break_period().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidHeaderValue);

        let missing = RequestContext::for_blob("acct", "c", "b");
        assert_eq!(
            missing.lease_action().unwrap_err().code,
            ErrorCode::MissingRequiredHeader
        );
    }

    #[test]
    fn test_sequence_number_conditions() {
        let ctx = RequestContext::for_blob("acct", "c", "b")
            .with_header("x-ms-if-sequence-number-lt", "5");
        let conditions = ctx.sequence_number_conditions().unwrap();
        assert_eq!(conditions.less_than, Some(5));
        assert_eq!(conditions.equal_to, None);
    }
}
