//! Lease state machine for containers and blobs.
//!
//! A [`Lease`] is a plain value. Its `state` is derived: every operation
//! first resolves it against the operation's timestamp (`Leased` past its
//! expiry reads as `Expired`, `Breaking` past its break time reads as
//! `Broken`). Nothing mutates a stored lease in the background; callers that
//! want a resolution persisted write the resolved value back through the
//! resource's [`LeaseDocument`] conversion.

mod adapter;
mod transitions;
mod validator;

pub use adapter::*;
pub use transitions::*;
pub use validator::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lease state for containers and blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LeaseState {
    #[default]
    Available,
    Leased,
    Expired,
    Breaking,
    Broken,
}

impl LeaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseState::Available => "available",
            LeaseState::Leased => "leased",
            LeaseState::Expired => "expired",
            LeaseState::Breaking => "breaking",
            LeaseState::Broken => "broken",
        }
    }
}

/// Lease status for containers and blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LeaseStatus {
    #[default]
    Unlocked,
    Locked,
}

impl LeaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseStatus::Unlocked => "unlocked",
            LeaseStatus::Locked => "locked",
        }
    }
}

/// Lease duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LeaseDuration {
    #[default]
    Infinite,
    Fixed,
}

impl LeaseDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseDuration::Infinite => "infinite",
            LeaseDuration::Fixed => "fixed",
        }
    }
}

/// Lease operation named by `x-ms-lease-action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    Acquire,
    Renew,
    Change,
    Release,
    Break,
}

impl LeaseAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "acquire" => Some(LeaseAction::Acquire),
            "renew" => Some(LeaseAction::Renew),
            "change" => Some(LeaseAction::Change),
            "release" => Some(LeaseAction::Release),
            "break" => Some(LeaseAction::Break),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseAction::Acquire => "acquire",
            LeaseAction::Renew => "renew",
            LeaseAction::Change => "change",
            LeaseAction::Release => "release",
            LeaseAction::Break => "break",
        }
    }
}

/// Uniform lease view over a container or blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Lease {
    pub id: Option<String>,
    pub state: LeaseState,
    pub status: LeaseStatus,
    pub duration_type: Option<LeaseDuration>,
    pub duration_seconds: Option<u32>,
    pub expire_time: Option<DateTime<Utc>>,
    pub break_time: Option<DateTime<Utc>>,
}

impl Lease {
    /// A lease slot with no lease and no history.
    pub fn available() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.status == LeaseStatus::Locked
    }

    /// Whether `id` names this lease. Lease ids compare case-insensitively.
    pub fn id_matches(&self, id: &str) -> bool {
        self.id
            .as_deref()
            .map(|current| current.eq_ignore_ascii_case(id))
            .unwrap_or(false)
    }

    /// Resolves the effective state at `now`.
    ///
    /// Idempotent for a given `now`; only `Leased` and `Breaking` leases whose
    /// deadline has passed change.
    pub fn resolve(&self, now: DateTime<Utc>) -> Lease {
        match self.state {
            LeaseState::Leased => match self.expire_time {
                Some(expiry)
                    if self.duration_type == Some(LeaseDuration::Fixed) && now >= expiry =>
                {
                    Lease {
                        id: self.id.clone(),
                        state: LeaseState::Expired,
                        status: LeaseStatus::Unlocked,
                        duration_type: None,
                        duration_seconds: self.duration_seconds,
                        expire_time: None,
                        break_time: None,
                    }
                }
                _ => self.clone(),
            },
            LeaseState::Breaking => match self.break_time {
                Some(break_time) if now >= break_time => Lease {
                    id: self.id.clone(),
                    state: LeaseState::Broken,
                    status: LeaseStatus::Unlocked,
                    duration_type: None,
                    duration_seconds: None,
                    expire_time: None,
                    break_time: None,
                },
                _ => self.clone(),
            },
            _ => self.clone(),
        }
    }
}
