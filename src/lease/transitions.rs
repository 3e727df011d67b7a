//! Lease operations.
//!
//! Every transition takes the operation's `now` and returns the next lease
//! value or the error the protocol reports. The input lease is resolved at
//! `now` first, so a stale stored lease behaves like its effective state.

use chrono::{DateTime, Duration, Utc};

use super::{Lease, LeaseDuration, LeaseState, LeaseStatus};
use crate::error::{ErrorCode, StorageError, StorageResult};

/// Shortest fixed lease, in seconds.
pub const MIN_LEASE_DURATION: i64 = 15;
/// Longest fixed lease, in seconds.
pub const MAX_LEASE_DURATION: i64 = 60;
/// Longest break period, in seconds.
pub const MAX_BREAK_PERIOD: i64 = 60;

/// Requested lease length: `None` or `-1` means infinite.
fn parse_duration(duration: Option<i64>) -> StorageResult<(LeaseDuration, Option<u32>)> {
    match duration {
        None | Some(-1) => Ok((LeaseDuration::Infinite, None)),
        Some(secs) if (MIN_LEASE_DURATION..=MAX_LEASE_DURATION).contains(&secs) => {
            Ok((LeaseDuration::Fixed, Some(secs as u32)))
        }
        Some(secs) => Err(StorageError::with_message(
            ErrorCode::InvalidLeaseDuration,
            format!(
                "The value for x-ms-lease-duration must be -1 or between 15 and 60 seconds, got {}.",
                secs
            ),
        )),
    }
}

fn check_break_period(period: Option<i64>) -> StorageResult<()> {
    match period {
        Some(p) if !(0..=MAX_BREAK_PERIOD).contains(&p) => Err(StorageError::with_message(
            ErrorCode::InvalidLeaseBreakPeriod,
            format!(
                "The value for x-ms-lease-break-period must be between 0 and 60 seconds, got {}.",
                p
            ),
        )),
        _ => Ok(()),
    }
}

fn mismatch() -> StorageError {
    StorageError::new(ErrorCode::LeaseIdMismatchWithLeaseOperation)
}

fn not_present() -> StorageError {
    StorageError::new(ErrorCode::LeaseNotPresentWithLeaseOperation)
}

/// A held lease starting at `now`.
fn leased(
    id: String,
    duration_type: LeaseDuration,
    duration_seconds: Option<u32>,
    now: DateTime<Utc>,
) -> Lease {
    Lease {
        id: Some(id),
        state: LeaseState::Leased,
        status: LeaseStatus::Locked,
        duration_type: Some(duration_type),
        duration_seconds,
        expire_time: duration_seconds.map(|secs| now + Duration::seconds(secs as i64)),
        break_time: None,
    }
}

/// A broken lease keeps its id so a later release can still name it.
fn broken(id: Option<String>) -> Lease {
    Lease {
        id,
        state: LeaseState::Broken,
        status: LeaseStatus::Unlocked,
        ..Lease::default()
    }
}

/// Whole seconds from `now` until `at`, rounded up.
fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (at - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        ((millis + 999) / 1000) as u64
    }
}

impl Lease {
    /// Acquires a lease.
    ///
    /// On a held lease only a re-acquire with the exact current id succeeds;
    /// it restarts the lease with the new duration.
    pub fn acquire(
        &self,
        now: DateTime<Utc>,
        duration: Option<i64>,
        proposed_id: Option<&str>,
    ) -> StorageResult<Lease> {
        let (duration_type, duration_seconds) = parse_duration(duration)?;
        let current = self.resolve(now);

        if matches!(current.state, LeaseState::Leased | LeaseState::Breaking)
            && current.id.as_deref() != proposed_id
        {
            return Err(StorageError::new(ErrorCode::LeaseAlreadyPresent));
        }

        let id = proposed_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(leased(id, duration_type, duration_seconds, now))
    }

    /// Renews a held or expired lease, restarting its fixed duration at `now`.
    pub fn renew(&self, now: DateTime<Utc>, lease_id: &str) -> StorageResult<Lease> {
        let current = self.resolve(now);

        if !current.id_matches(lease_id) {
            return Err(mismatch());
        }

        match current.state {
            LeaseState::Leased => {
                let mut next = current;
                if next.duration_type == Some(LeaseDuration::Fixed) {
                    next.expire_time = next
                        .duration_seconds
                        .map(|secs| now + Duration::seconds(secs as i64));
                }
                Ok(next)
            }
            LeaseState::Expired => {
                let duration_type = match current.duration_seconds {
                    Some(_) => LeaseDuration::Fixed,
                    None => LeaseDuration::Infinite,
                };
                let id = current.id.unwrap_or_else(|| lease_id.to_string());
                Ok(leased(id, duration_type, current.duration_seconds, now))
            }
            LeaseState::Breaking | LeaseState::Broken => {
                Err(StorageError::new(ErrorCode::LeaseIsBrokenAndCannotBeRenewed))
            }
            LeaseState::Available => Err(mismatch()),
        }
    }

    /// Replaces the id of a held lease.
    ///
    /// Presenting the proposed id instead of the current one is accepted so a
    /// retried change is idempotent.
    pub fn change(
        &self,
        now: DateTime<Utc>,
        lease_id: &str,
        proposed_id: &str,
    ) -> StorageResult<Lease> {
        let current = self.resolve(now);

        match current.state {
            LeaseState::Leased => {
                if !current.id_matches(lease_id) && !current.id_matches(proposed_id) {
                    return Err(mismatch());
                }
                let mut next = current;
                next.id = Some(proposed_id.to_string());
                Ok(next)
            }
            LeaseState::Breaking => {
                if !current.id_matches(lease_id) {
                    return Err(mismatch());
                }
                Err(StorageError::new(ErrorCode::LeaseIsBreakingAndCannotBeChanged))
            }
            LeaseState::Available | LeaseState::Expired | LeaseState::Broken => {
                Err(not_present())
            }
        }
    }

    /// Releases the lease, leaving the resource available.
    pub fn release(&self, now: DateTime<Utc>, lease_id: &str) -> StorageResult<Lease> {
        let current = self.resolve(now);

        if current.state == LeaseState::Available || !current.id_matches(lease_id) {
            return Err(mismatch());
        }

        Ok(Lease::available())
    }

    /// Breaks the lease.
    ///
    /// Returns the next lease and the seconds remaining until it is broken.
    /// Without a period an infinite lease breaks at once and a fixed lease
    /// breaks when it would have expired. A period never extends a break
    /// already scheduled earlier.
    pub fn break_lease(
        &self,
        now: DateTime<Utc>,
        break_period: Option<i64>,
    ) -> StorageResult<(Lease, u64)> {
        check_break_period(break_period)?;
        let current = self.resolve(now);

        let break_at = match current.state {
            LeaseState::Available => return Err(not_present()),
            LeaseState::Expired | LeaseState::Broken => return Ok((broken(current.id), 0)),
            LeaseState::Leased => match break_period {
                Some(period) => {
                    let requested = now + Duration::seconds(period);
                    current
                        .expire_time
                        .map(|expiry| expiry.min(requested))
                        .unwrap_or(requested)
                }
                None => match current.expire_time {
                    Some(expiry) if current.duration_type == Some(LeaseDuration::Fixed) => expiry,
                    _ => now,
                },
            },
            LeaseState::Breaking => {
                let scheduled = current.break_time.unwrap_or(now);
                match break_period {
                    Some(period) => scheduled.min(now + Duration::seconds(period)),
                    None => scheduled,
                }
            }
        };

        if break_at <= now {
            return Ok((broken(current.id), 0));
        }

        let mut next = current;
        next.state = LeaseState::Breaking;
        next.status = LeaseStatus::Locked;
        next.break_time = Some(break_at);
        Ok((next, seconds_until(break_at, now)))
    }
}
