//! Page blob data models.

use serde::{Deserialize, Serialize};

/// Extent id of the virtual all-zero extent. Real extent ids are UUIDs, so the
/// `*` characters keep this from ever colliding with one.
pub const ZERO_EXTENT_ID: &str = "*ZERO*";

/// Page blob constants.
pub const PAGE_SIZE: u64 = 512;
pub const MAX_PAGE_BLOB_SIZE: u64 = 8 * 1024 * 1024 * 1024 * 1024; // 8 TiB
pub const MAX_PAGE_RANGE_SIZE: u64 = 4 * 1024 * 1024; // 4 MiB per write operation

/// How `x-ms-sequence-number-action` updates a page blob's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceNumberAction {
    /// Keep the larger of the current and requested number.
    Max,
    /// Set the requested number.
    Update,
    /// Add one; the request must not carry a number.
    Increment,
}

impl SequenceNumberAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "max" => Some(SequenceNumberAction::Max),
            "update" => Some(SequenceNumberAction::Update),
            "increment" => Some(SequenceNumberAction::Increment),
            _ => None,
        }
    }
}

/// Reference to data stored in an extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistencyChunk {
    /// Id of the extent containing this data.
    pub id: String,
    /// Byte offset within the extent.
    pub offset: u64,
    /// Number of bytes.
    pub count: u64,
}

impl PersistencyChunk {
    pub fn new(id: impl Into<String>, offset: u64, count: u64) -> Self {
        Self {
            id: id.into(),
            offset,
            count,
        }
    }

    /// A chunk of `count` virtual zero bytes.
    pub fn zero(count: u64) -> Self {
        Self::new(ZERO_EXTENT_ID, 0, count)
    }

    pub fn is_zero(&self) -> bool {
        self.id == ZERO_EXTENT_ID
    }
}

/// A written range of a page blob and where its bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (inclusive).
    pub end: u64,
    pub persistency: PersistencyChunk,
}

impl PageRange {
    pub fn new(start: u64, end: u64, persistency: PersistencyChunk) -> Self {
        Self {
            start,
            end,
            persistency,
        }
    }

    /// Returns the length of this page range.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}
