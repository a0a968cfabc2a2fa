//! Client-facing handles: [`ManagerHandle`] and the per-namespace façades.
//!
//! Façades are cheap clones holding the request sender. They validate input
//! with their namespace's secretary, send a typed message, and await the
//! reply. Dropping a façade future before the reply arrives abandons the
//! request: the dispatcher still applies its effect, but the reply goes
//! nowhere. A closed channel in either direction means the manager is gone
//! and surfaces as [`Error::Stopping`].

use super::error::Error;
use super::request::{Reply, Request};
use crate::lease::Key;
use crate::secretary::{Secretary, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Entry point for clients of a running [`Manager`](super::Manager).
///
/// Hands out façades scoped to one `(namespace, model_uuid)` pair.
#[derive(Clone)]
pub struct ManagerHandle {
    requests: mpsc::Sender<Request>,
    secretaries: Arc<HashMap<String, Arc<dyn Secretary>>>,
}

impl ManagerHandle {
    pub(crate) fn new(
        requests: mpsc::Sender<Request>,
        secretaries: HashMap<String, Arc<dyn Secretary>>,
    ) -> Self {
        Self {
            requests,
            secretaries: Arc::new(secretaries),
        }
    }

    /// Returns a [`Claimer`] for `namespace` leases in `model_uuid`.
    pub fn claimer(&self, namespace: &str, model_uuid: &str) -> Result<Claimer, Error> {
        Ok(Claimer {
            scope: self.scope(namespace, model_uuid)?,
        })
    }

    /// Returns a [`Checker`] for `namespace` leases in `model_uuid`.
    pub fn checker(&self, namespace: &str, model_uuid: &str) -> Result<Checker, Error> {
        Ok(Checker {
            scope: self.scope(namespace, model_uuid)?,
        })
    }

    /// Returns a [`Pinner`] for `namespace` leases in `model_uuid`.
    pub fn pinner(&self, namespace: &str, model_uuid: &str) -> Result<Pinner, Error> {
        Ok(Pinner {
            scope: self.scope(namespace, model_uuid)?,
        })
    }

    fn scope(&self, namespace: &str, model_uuid: &str) -> Result<Scope, Error> {
        let secretary = self
            .secretaries
            .get(namespace)
            .cloned()
            .ok_or_else(|| {
                Error::Validation(ValidationError::new(
                    "namespace",
                    namespace,
                    "no secretary configured",
                ))
            })?;
        if model_uuid.is_empty() {
            return Err(Error::Validation(ValidationError::new(
                "model uuid",
                model_uuid,
                "must not be empty",
            )));
        }
        Ok(Scope {
            requests: self.requests.clone(),
            secretary,
            namespace: namespace.to_string(),
            model_uuid: model_uuid.to_string(),
        })
    }
}

/// Shared façade plumbing: one namespace, one model, one secretary.
#[derive(Clone)]
struct Scope {
    requests: mpsc::Sender<Request>,
    secretary: Arc<dyn Secretary>,
    namespace: String,
    model_uuid: String,
}

impl Scope {
    fn key(&self, lease: &str) -> Key {
        Key::new(self.namespace.as_str(), self.model_uuid.as_str(), lease)
    }

    /// Sends a request and awaits its reply.
    async fn call(&self, build: impl FnOnce(Reply) -> Request) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(build(tx))
            .await
            .map_err(|_| Error::Stopping)?;
        rx.await.unwrap_or(Err(Error::Stopping))
    }
}

/// Claims, extends, revokes, and waits out leases.
#[derive(Clone)]
pub struct Claimer {
    scope: Scope,
}

impl Claimer {
    /// Claims `lease` for `holder`, for at least `duration`.
    ///
    /// A claim by the current holder extends instead. Negative outcomes:
    /// [`Error::HeldByAnother`] when the lease is live under someone else,
    /// [`Error::ClaimDenied`] when the claim lost a race.
    pub async fn claim(&self, lease: &str, holder: &str, duration: Duration) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(holder)?;
        self.scope.secretary.check_duration(duration)?;
        let key = self.scope.key(lease);
        self.scope
            .call(|reply| Request::Claim {
                key,
                holder: holder.to_string(),
                duration,
                reply,
            })
            .await
    }

    /// Extends `holder`'s lease by at least `duration` from now.
    pub async fn extend(&self, lease: &str, holder: &str, duration: Duration) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(holder)?;
        self.scope.secretary.check_duration(duration)?;
        let key = self.scope.key(lease);
        self.scope
            .call(|reply| Request::Extend {
                key,
                holder: holder.to_string(),
                duration,
                reply,
            })
            .await
    }

    /// Gives up `holder`'s lease. Idempotent: revoking a lease that is
    /// absent or held by someone else succeeds without effect.
    pub async fn revoke(&self, lease: &str, holder: &str) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(holder)?;
        let key = self.scope.key(lease);
        self.scope
            .call(|reply| Request::Revoke {
                key,
                holder: holder.to_string(),
                reply,
            })
            .await
    }

    /// Waits until `holder` no longer holds `lease`: it expired, was
    /// revoked, or changed hands. Returns immediately when the cache
    /// already shows the tenure over. Cancel via `cancel`.
    pub async fn wait_expired(
        &self,
        lease: &str,
        holder: &str,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(holder)?;
        let key = self.scope.key(lease);
        let (tx, rx) = oneshot::channel();
        self.scope
            .requests
            .send(Request::WaitExpired {
                key,
                holder: holder.to_string(),
                reply: tx,
                cancel: cancel.clone(),
            })
            .await
            .map_err(|_| Error::Stopping)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = rx => result.unwrap_or(Err(Error::Stopping)),
        }
    }
}

/// Answers "does this holder hold this lease right now" from the
/// dispatcher's cache. Never touches the store.
#[derive(Clone)]
pub struct Checker {
    scope: Scope,
}

impl Checker {
    /// Ok when `holder` holds `lease` live (unexpired or pinned);
    /// [`Error::NotHeld`] otherwise.
    pub async fn check(&self, lease: &str, holder: &str) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(holder)?;
        let key = self.scope.key(lease);
        self.scope
            .call(|reply| Request::Check {
                key,
                holder: holder.to_string(),
                reply,
            })
            .await
    }
}

/// Pins and unpins leases on behalf of entities.
#[derive(Clone)]
pub struct Pinner {
    scope: Scope,
}

impl Pinner {
    /// Marks `lease` non-expirable on behalf of `entity`. Idempotent per
    /// `(lease, entity)`.
    pub async fn pin(&self, lease: &str, entity: &str) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(entity)?;
        let key = self.scope.key(lease);
        self.scope
            .call(|reply| Request::Pin {
                key,
                entity: entity.to_string(),
                reply,
            })
            .await
    }

    /// Removes `entity` from the lease's pin set. Once the set empties,
    /// normal expiry behavior resumes.
    pub async fn unpin(&self, lease: &str, entity: &str) -> Result<(), Error> {
        self.scope.secretary.check_lease(lease)?;
        self.scope.secretary.check_holder(entity)?;
        let key = self.scope.key(lease);
        self.scope
            .call(|reply| Request::Unpin {
                key,
                entity: entity.to_string(),
                reply,
            })
            .await
    }
}
