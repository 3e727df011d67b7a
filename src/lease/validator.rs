//! Lease checks for ordinary (non-lease) operations.

use super::Lease;
use crate::error::{ErrorCode, StorageError, StorageResult};

/// The kind of operation a lease check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAccess {
    BlobRead,
    BlobWrite,
    ContainerRead,
    ContainerWrite,
}

/// Checks a caller-supplied lease id against a resolved lease.
///
/// Writes on a locked resource require the current id. Reads only fail when
/// an id is supplied and does not name the held lease. Supplying an id for an
/// unlocked resource fails either way.
pub fn validate_lease_access(
    lease: &Lease,
    lease_id: Option<&str>,
    access: LeaseAccess,
) -> StorageResult<()> {
    let (mismatch, not_present) = match access {
        LeaseAccess::BlobRead | LeaseAccess::BlobWrite => (
            ErrorCode::LeaseIdMismatchWithBlobOperation,
            ErrorCode::LeaseNotPresentWithBlobOperation,
        ),
        LeaseAccess::ContainerRead | LeaseAccess::ContainerWrite => (
            ErrorCode::LeaseIdMismatchWithContainerOperation,
            ErrorCode::LeaseNotPresentWithContainerOperation,
        ),
    };

    match (lease.is_locked(), lease_id) {
        (true, None) => match access {
            LeaseAccess::BlobWrite | LeaseAccess::ContainerWrite => {
                Err(StorageError::new(ErrorCode::LeaseIdMissing))
            }
            _ => Ok(()),
        },
        (true, Some(id)) if !lease.id_matches(id) => Err(StorageError::new(mismatch)),
        (true, Some(_)) => Ok(()),
        (false, Some(_)) => match access {
            LeaseAccess::BlobWrite => Err(StorageError::new(ErrorCode::LeaseLost)),
            _ => Err(StorageError::new(not_present)),
        },
        (false, None) => Ok(()),
    }
}
