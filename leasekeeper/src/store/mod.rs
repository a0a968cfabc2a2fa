//! Contract between the lease manager and its replicated store.
//!
//! The store is the authority on lease state. It applies claims, extensions,
//! and expirations atomically with optimistic concurrency: when the
//! manager's view is stale it answers [`StoreError::Invalid`], meaning
//! "refresh and decide again". The manager never retries an invalid
//! operation more than once per refresh.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   refresh / claim / extend / expire   ┌──────────────┐
//! │   Manager    │ ────────────────────────────────────► │    Store     │
//! │  (dispatcher)│ ◄──────────────────────────────────── │ (replicated) │
//! └──────────────┘        Snapshot / Info / Invalid      └──────────────┘
//! ```
//!
//! Implementations are shared-nothing from the manager's point of view: one
//! manager uses its store handle only from the dispatcher task.

use crate::lease::{Info, Key, LeaseRequest};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Full current lease table for the manager's namespaces.
pub type Snapshot = HashMap<Key, Info>;

/// Boxed future returned by store operations.
///
/// Keeps the trait object-safe so the manager can hold `Arc<dyn Store>`.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The caller's view of the lease table is stale. Refresh and decide
    /// again; the operation may no longer make sense.
    #[error("lease operation invalidated by stale view")]
    Invalid,

    /// Any other failure. Fatal on the expiration path; surfaced to the
    /// client on claim/extend/revoke paths.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Creates an [`StoreError::Other`] from a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns true for [`StoreError::Invalid`].
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }
}

/// Handle to a replicated lease table.
///
/// All operations are atomic on the store side. Claims and extensions return
/// the stored [`Info`] so the manager can cache the authoritative record,
/// including the granted expiry (which may be later than requested).
pub trait Store: Send + Sync + 'static {
    /// Whether the store drops expired records on its own schedule.
    ///
    /// When true the manager never calls [`Store::expire`]; it only
    /// refreshes and lets vacancies appear in the snapshot.
    fn auto_expire(&self) -> bool;

    /// Returns the full current lease table for this manager's namespaces.
    fn refresh(&self) -> StoreFuture<'_, Snapshot>;

    /// Claims an unheld lease for `request.holder`.
    fn claim(&self, key: Key, request: LeaseRequest) -> StoreFuture<'_, Info>;

    /// Extends a lease already held by `request.holder`.
    fn extend(&self, key: Key, request: LeaseRequest) -> StoreFuture<'_, Info>;

    /// Removes an expired or revoked lease.
    fn expire(&self, key: Key) -> StoreFuture<'_, ()>;

    /// Marks the lease non-expirable on behalf of `entity`. Idempotent per
    /// `(key, entity)`.
    fn pin(&self, key: Key, entity: String) -> StoreFuture<'_, ()>;

    /// Removes `entity` from the lease's pin set.
    fn unpin(&self, key: Key, entity: String) -> StoreFuture<'_, ()>;
}
