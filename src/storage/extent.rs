//! Extent store for page blob data.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::PersistencyChunk;

/// Trait for extent (blob data) storage operations.
#[async_trait]
pub trait ExtentStore: Send + Sync {
    /// Writes data to a new extent and returns a chunk covering all of it.
    async fn write(&self, data: Bytes) -> StorageResult<PersistencyChunk>;

    /// Reads the bytes a chunk points at. Zero chunks read as zeros.
    async fn read(&self, chunk: &PersistencyChunk) -> StorageResult<Bytes>;
}

/// Number of shards for the extent store (must be power of 2).
const NUM_SHARDS: usize = 64;

/// Sharded in-memory implementation of the extent store.
pub struct MemoryExtentStore {
    /// Sharded extents - each shard handles a subset of extent IDs.
    shards: Vec<DashMap<Arc<str>, Bytes>>,
}

impl MemoryExtentStore {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| DashMap::new()).collect();
        Self { shards }
    }

    /// Get the shard for a given extent ID.
    #[inline]
    fn get_shard(&self, extent_id: &str) -> &DashMap<Arc<str>, Bytes> {
        let hash = extent_id
            .bytes()
            .take(8)
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        &self.shards[hash % NUM_SHARDS]
    }
}

impl Default for MemoryExtentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtentStore for MemoryExtentStore {
    async fn write(&self, data: Bytes) -> StorageResult<PersistencyChunk> {
        let size = data.len() as u64;
        let extent_id = Uuid::new_v4().to_string();

        self.get_shard(&extent_id)
            .insert(Arc::from(extent_id.as_str()), data);

        Ok(PersistencyChunk::new(extent_id, 0, size))
    }

    async fn read(&self, chunk: &PersistencyChunk) -> StorageResult<Bytes> {
        let out_of_bounds = |len: usize| {
            StorageError::with_message(
                ErrorCode::InternalError,
                format!(
                    "Chunk {}+{} is out of bounds for extent {} of {} bytes.",
                    chunk.offset, chunk.count, chunk.id, len
                ),
            )
        };

        if chunk.is_zero() {
            let count = usize::try_from(chunk.count).map_err(|_| out_of_bounds(0))?;
            return Ok(BytesMut::zeroed(count).freeze());
        }

        let extent = self
            .get_shard(&chunk.id)
            .get(chunk.id.as_str())
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                StorageError::with_message(
                    ErrorCode::InternalError,
                    format!("Extent {} does not exist.", chunk.id),
                )
            })?;

        let bounds = chunk
            .offset
            .checked_add(chunk.count)
            .filter(|&end| end <= extent.len() as u64)
            .map(|end| (chunk.offset as usize, end as usize));
        let (start, end) = bounds.ok_or_else(|| out_of_bounds(extent.len()))?;

        Ok(extent.slice(start..end))
    }
}
