//! Core lease types shared by the manager and the store contract.
//!
//! A lease is a named, time-bounded exclusive claim: [`Key`] identifies it,
//! [`Info`] records who holds it and until when, and [`LeaseRequest`] is
//! what a would-be holder asks the store for.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

/// Identity of a lease: namespace, model, and lease name.
///
/// All three components are non-empty printable identifiers (enforced by the
/// per-namespace [`Secretary`](crate::secretary::Secretary) before a key ever
/// reaches the dispatcher). Keys are compared by value and used as map keys;
/// the `Ord` impl gives expiration sweeps a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    /// Functional area the lease belongs to (e.g. "application-leadership").
    pub namespace: String,

    /// Model the lease is scoped to.
    pub model_uuid: String,

    /// The lease name itself.
    pub lease: String,
}

impl Key {
    /// Creates a key from its three components.
    pub fn new(
        namespace: impl Into<String>,
        model_uuid: impl Into<String>,
        lease: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            model_uuid: model_uuid.into(),
            lease: lease.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.namespace, self.model_uuid, self.lease)
    }
}

/// Per-key lease record as the manager sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// Identifier of the current holder.
    pub holder: String,

    /// Absolute instant after which the lease is no longer valid, unless
    /// pinned.
    pub expiry: Instant,

    /// Entities that have pinned the lease. Non-empty means the lease
    /// cannot expire.
    pub pinned: BTreeSet<String>,
}

impl Info {
    /// Creates an unpinned record.
    pub fn new(holder: impl Into<String>, expiry: Instant) -> Self {
        Self {
            holder: holder.into(),
            expiry,
            pinned: BTreeSet::new(),
        }
    }

    /// Returns true if the lease is held live at `now`: either pinned, or
    /// not yet past its expiry.
    pub fn alive_at(&self, now: Instant) -> bool {
        !self.pinned.is_empty() || self.expiry > now
    }

    /// Returns true if the lease is due for expiry at `now`: past its
    /// expiry with an empty pin set.
    pub fn due_at(&self, now: Instant) -> bool {
        self.pinned.is_empty() && self.expiry <= now
    }
}

/// What a claimant asks the store for.
///
/// The duration is a minimum; the store may grant longer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRequest {
    /// Identifier of the would-be holder.
    pub holder: String,

    /// Minimum duration the holder needs.
    pub duration: Duration,
}

impl LeaseRequest {
    /// Creates a request.
    pub fn new(holder: impl Into<String>, duration: Duration) -> Self {
        Self {
            holder: holder.into(),
            duration,
        }
    }
}
