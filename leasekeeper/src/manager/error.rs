//! Client-visible outcomes of lease operations.

use crate::secretary::ValidationError;
use crate::store::StoreError;
use thiserror::Error;

/// What a client sees when a lease operation does not succeed.
///
/// The negative outcomes ([`Error::HeldByAnother`], [`Error::ClaimDenied`],
/// [`Error::NotHeld`]) are ordinary results of well-formed requests; the
/// dispatcher keeps running. [`Error::Store`] carries a store failure on the
/// caller's own operation, and is also what a dirty manager's run loop
/// returns when the expiration path hits a persistent store error.
#[derive(Debug, Error)]
pub enum Error {
    /// The lease is held, live, by a different holder.
    #[error("lease already held by {holder:?}")]
    HeldByAnother {
        /// Who holds it, per the manager's latest view.
        holder: String,
    },

    /// The claim lost a race and the winner is not yet visible.
    #[error("lease claim denied")]
    ClaimDenied,

    /// The caller does not hold the lease.
    #[error("lease not held")]
    NotHeld,

    /// The request was rejected before reaching the dispatcher.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The manager is shutting down (or has already stopped).
    #[error("lease manager stopping")]
    Stopping,

    /// The caller aborted before the reply arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The store failed the caller's operation.
    #[error(transparent)]
    Store(StoreError),
}

impl Error {
    /// Returns true for the negative-but-normal outcomes a well-behaved
    /// client retries or waits out.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::HeldByAnother { .. } | Self::ClaimDenied | Self::NotHeld
        )
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
