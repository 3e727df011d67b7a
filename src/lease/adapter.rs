//! Conversions between stored documents and the uniform [`Lease`] view.

use super::{Lease, LeaseState};
use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{BlobModel, ContainerModel};

/// A stored resource that carries a lease.
pub trait LeaseDocument: Sized {
    /// Reads the persisted lease fields.
    fn to_lease(&self) -> StorageResult<Lease>;

    /// Writes `lease` back into the document's lease fields.
    fn with_lease(self, lease: &Lease) -> Self;

    /// Lease fields to persist after a successful write.
    ///
    /// A write on an expired or broken resource clears the leftover lease so
    /// the document reads as never leased.
    fn with_write_lease(self, lease: &Lease) -> Self {
        match lease.state {
            LeaseState::Expired | LeaseState::Broken => self.with_lease(&Lease::available()),
            _ => self.with_lease(lease),
        }
    }
}

impl LeaseDocument for BlobModel {
    fn to_lease(&self) -> StorageResult<Lease> {
        let props = &self.properties;
        Ok(Lease {
            id: props.lease_id.clone(),
            state: props.lease_state.unwrap_or_default(),
            status: props.lease_status.unwrap_or_default(),
            duration_type: props.lease_duration,
            duration_seconds: props.lease_duration_seconds,
            expire_time: props.lease_expiry,
            break_time: props.lease_break_time,
        })
    }

    fn with_lease(mut self, lease: &Lease) -> Self {
        let props = &mut self.properties;
        props.lease_id = lease.id.clone();
        props.lease_state = Some(lease.state);
        props.lease_status = Some(lease.status);
        props.lease_duration = lease.duration_type;
        props.lease_duration_seconds = lease.duration_seconds;
        props.lease_expiry = lease.expire_time;
        props.lease_break_time = lease.break_time;
        self
    }
}

impl LeaseDocument for ContainerModel {
    fn to_lease(&self) -> StorageResult<Lease> {
        let props = &self.properties;
        let (state, status) = match (props.lease_state, props.lease_status) {
            (Some(state), Some(status)) => (state, status),
            _ => {
                return Err(StorageError::with_message(
                    ErrorCode::InternalError,
                    format!("Container {} has no lease state or status.", self.name),
                ))
            }
        };
        Ok(Lease {
            id: props.lease_id.clone(),
            state,
            status,
            duration_type: props.lease_duration,
            duration_seconds: props.lease_duration_seconds,
            expire_time: props.lease_expiry,
            break_time: props.lease_break_time,
        })
    }

    fn with_lease(mut self, lease: &Lease) -> Self {
        let props = &mut self.properties;
        props.lease_id = lease.id.clone();
        props.lease_state = Some(lease.state);
        props.lease_status = Some(lease.status);
        props.lease_duration = lease.duration_type;
        props.lease_duration_seconds = lease.duration_seconds;
        props.lease_expiry = lease.expire_time;
        props.lease_break_time = lease.break_time;
        self
    }
}
