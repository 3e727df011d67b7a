//! Container data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::blob::new_etag;
use crate::lease::{LeaseDuration, LeaseState, LeaseStatus};

/// Container properties.
///
/// Unlike blobs, a container document always carries a lease state and
/// status; documents missing them are rejected when the lease is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerProperties {
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub lease_state: Option<LeaseState>,
    pub lease_status: Option<LeaseStatus>,
    pub lease_duration: Option<LeaseDuration>,
    pub lease_duration_seconds: Option<u32>,
    pub lease_id: Option<String>,
    pub lease_expiry: Option<DateTime<Utc>>,
    pub lease_break_time: Option<DateTime<Utc>>,
}

impl ContainerProperties {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            etag: new_etag(),
            last_modified: now,
            lease_state: Some(LeaseState::Available),
            lease_status: Some(LeaseStatus::Unlocked),
            lease_duration: None,
            lease_duration_seconds: None,
            lease_id: None,
            lease_expiry: None,
            lease_break_time: None,
        }
    }

    /// Updates the ETag and last modified time.
    pub fn update_etag(&mut self, now: DateTime<Utc>) {
        self.etag = new_etag();
        self.last_modified = now;
    }
}

/// Complete container model stored in metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerModel {
    /// Account name.
    pub account: String,
    /// Container name.
    pub name: String,
    /// Container properties.
    pub properties: ContainerProperties,
    /// User-defined metadata.
    pub metadata: HashMap<String, String>,
}

impl ContainerModel {
    /// Creates a new container model.
    pub fn new(account: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            account,
            name,
            properties: ContainerProperties::new(now),
            metadata: HashMap::new(),
        }
    }
}
