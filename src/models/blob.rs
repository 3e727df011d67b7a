//! Blob data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::page::PageRange;
use crate::lease::{LeaseDuration, LeaseState, LeaseStatus};

/// Blob types supported by Azure Blob Storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobType {
    BlockBlob,
    PageBlob,
    AppendBlob,
}

impl BlobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::BlockBlob => "BlockBlob",
            BlobType::PageBlob => "PageBlob",
            BlobType::AppendBlob => "AppendBlob",
        }
    }
}

/// Generates a fresh quoted etag.
pub(crate) fn new_etag() -> String {
    format!("\"0x{}\"", uuid::Uuid::new_v4().simple().to_string().to_uppercase())
}

/// Blob properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobProperties {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub blob_type: BlobType,
    /// Lease fields as persisted. A missing state reads as available.
    pub lease_state: Option<LeaseState>,
    pub lease_status: Option<LeaseStatus>,
    pub lease_duration: Option<LeaseDuration>,
    pub lease_duration_seconds: Option<u32>,
    pub lease_id: Option<String>,
    pub lease_expiry: Option<DateTime<Utc>>,
    pub lease_break_time: Option<DateTime<Utc>>,
    /// Sequence number for page blobs.
    pub sequence_number: Option<u64>,
}

impl BlobProperties {
    /// Creates new blob properties for the given blob type.
    pub fn new(blob_type: BlobType, content_length: u64, now: DateTime<Utc>) -> Self {
        Self {
            content_length,
            content_type: Some("application/octet-stream".to_string()),
            etag: new_etag(),
            last_modified: now,
            created_on: now,
            blob_type,
            lease_state: None,
            lease_status: None,
            lease_duration: None,
            lease_duration_seconds: None,
            lease_id: None,
            lease_expiry: None,
            lease_break_time: None,
            sequence_number: match blob_type {
                BlobType::PageBlob => Some(0),
                _ => None,
            },
        }
    }

    /// Updates the ETag and last modified time.
    pub fn update_etag(&mut self, now: DateTime<Utc>) {
        self.etag = new_etag();
        self.last_modified = now;
    }
}

/// Complete blob model stored in metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobModel {
    /// Account name.
    pub account: String,
    /// Container name.
    pub container: String,
    /// Blob name (full path).
    pub name: String,
    /// Snapshot timestamp (empty for base blob).
    pub snapshot: String,
    /// Blob properties.
    pub properties: BlobProperties,
    /// User-defined metadata.
    pub metadata: HashMap<String, String>,
    /// Tags for blob indexing.
    pub tags: HashMap<String, String>,
    /// Written ranges of a page blob, sorted by start and non-overlapping.
    pub page_ranges: Vec<PageRange>,
    /// False while a blob has only uncommitted content.
    pub is_committed: bool,
}

impl BlobModel {
    /// Creates a new blob model.
    pub fn new(
        account: String,
        container: String,
        name: String,
        blob_type: BlobType,
        content_length: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account,
            container,
            name,
            snapshot: String::new(),
            properties: BlobProperties::new(blob_type, content_length, now),
            metadata: HashMap::new(),
            tags: HashMap::new(),
            page_ranges: Vec::new(),
            is_committed: true,
        }
    }

    /// Creates a snapshot of this blob.
    ///
    /// The snapshot owns a copy of the range list; later writes to the base
    /// blob splice their own list and leave this one untouched.
    pub fn create_snapshot(&self, now: DateTime<Utc>) -> Self {
        let mut snapshot = self.clone();
        // Azure snapshot format: 2024-01-27T12:34:56.1234567Z (7 decimal places)
        snapshot.snapshot = format!(
            "{}.{:07}Z",
            now.format("%Y-%m-%dT%H:%M:%S"),
            now.timestamp_subsec_nanos() / 100
        );
        snapshot.properties.lease_state = None;
        snapshot.properties.lease_status = None;
        snapshot.properties.lease_duration = None;
        snapshot.properties.lease_duration_seconds = None;
        snapshot.properties.lease_id = None;
        snapshot.properties.lease_expiry = None;
        snapshot.properties.lease_break_time = None;
        snapshot
    }
}
