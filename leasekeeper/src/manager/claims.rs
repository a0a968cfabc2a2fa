//! Client request handling.
//!
//! One request is fully handled, including its store calls, before the
//! dispatcher accepts the next. A store-reported stale view triggers one
//! refresh and at most one retry; after that the handler replies with
//! whatever the refreshed cache says.

use super::blocks::Block;
use super::core::Manager;
use super::error::Error;
use super::request::{Reply, Request};
use crate::lease::{Key, LeaseRequest};
use crate::store::StoreError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

impl Manager {
    pub(crate) async fn handle(&mut self, request: Request) {
        trace!(op = request.name(), "handling request");
        match request {
            Request::Claim {
                key,
                holder,
                duration,
                reply,
            } => {
                let result = self.handle_claim(&key, &holder, duration).await;
                let _ = reply.send(result);
            }
            Request::Extend {
                key,
                holder,
                duration,
                reply,
            } => {
                let result = self.handle_extend(&key, &holder, duration).await;
                let _ = reply.send(result);
            }
            Request::Revoke { key, holder, reply } => {
                let result = self.handle_revoke(&key, &holder).await;
                let _ = reply.send(result);
            }
            Request::Check { key, holder, reply } => {
                let _ = reply.send(self.handle_check(&key, &holder));
            }
            Request::WaitExpired {
                key,
                holder,
                reply,
                cancel,
            } => self.handle_wait_expired(key, holder, reply, cancel),
            Request::Pin { key, entity, reply } => {
                let result = self.handle_pin(&key, &entity).await;
                let _ = reply.send(result);
            }
            Request::Unpin { key, entity, reply } => {
                let result = self.handle_unpin(&key, &entity).await;
                let _ = reply.send(result);
            }
        }
    }

    async fn handle_claim(&mut self, key: &Key, holder: &str, duration: Duration) -> Result<(), Error> {
        let now = self.clock.now();
        if let Some(info) = self.leases.get(key) {
            if info.holder == holder {
                // Claim by the current holder is an extension.
                return self.do_extend(key, holder, duration).await;
            }
            if info.alive_at(now) {
                return Err(Error::HeldByAnother {
                    holder: info.holder.clone(),
                });
            }
        }
        self.do_claim(key, holder, duration).await
    }

    async fn do_claim(&mut self, key: &Key, holder: &str, duration: Duration) -> Result<(), Error> {
        for _ in 0..2 {
            let request = LeaseRequest::new(holder, duration);
            match self.store.claim(key.clone(), request).await {
                Ok(info) => {
                    let now = self.clock.now();
                    self.leases.insert(key.clone(), info);
                    self.set_probe(now + duration);
                    self.blocks.release_satisfied(&self.leases);
                    debug!(key = %key, holder, "lease claimed");
                    return Ok(());
                }
                Err(StoreError::Invalid) => {
                    self.refresh_from_request().await?;
                    let now = self.clock.now();
                    match self.leases.get(key) {
                        None => continue,
                        Some(info) if info.holder == holder => {
                            return self.do_extend(key, holder, duration).await;
                        }
                        Some(info) if info.alive_at(now) => {
                            return Err(Error::HeldByAnother {
                                holder: info.holder.clone(),
                            });
                        }
                        // Due but unswept; the store arbitrates the claim.
                        Some(_) => continue,
                    }
                }
                Err(err) => return Err(Error::Store(err)),
            }
        }
        Err(Error::ClaimDenied)
    }

    async fn handle_extend(&mut self, key: &Key, holder: &str, duration: Duration) -> Result<(), Error> {
        match self.leases.get(key) {
            Some(info) if info.holder == holder => {}
            _ => return Err(Error::NotHeld),
        }
        self.do_extend(key, holder, duration).await
    }

    async fn do_extend(&mut self, key: &Key, holder: &str, duration: Duration) -> Result<(), Error> {
        for _ in 0..2 {
            let request = LeaseRequest::new(holder, duration);
            match self.store.extend(key.clone(), request).await {
                Ok(info) => {
                    let now = self.clock.now();
                    self.leases.insert(key.clone(), info);
                    self.set_probe(now + duration);
                    debug!(key = %key, holder, "lease extended");
                    return Ok(());
                }
                Err(StoreError::Invalid) => {
                    self.refresh_from_request().await?;
                    match self.leases.get(key) {
                        Some(info) if info.holder == holder => continue,
                        _ => return Err(Error::NotHeld),
                    }
                }
                Err(err) => return Err(Error::Store(err)),
            }
        }
        Err(Error::NotHeld)
    }

    async fn handle_revoke(&mut self, key: &Key, holder: &str) -> Result<(), Error> {
        match self.leases.get(key) {
            Some(info) if info.holder == holder => {}
            // Nothing of the caller's to revoke.
            _ => return Ok(()),
        }
        for _ in 0..2 {
            match self.store.expire(key.clone()).await {
                Ok(()) => {
                    self.leases.remove(key);
                    self.blocks.release_satisfied(&self.leases);
                    debug!(key = %key, holder, "lease revoked");
                    return Ok(());
                }
                Err(StoreError::Invalid) => {
                    self.refresh_from_request().await?;
                    match self.leases.get(key) {
                        Some(info) if info.holder == holder => continue,
                        _ => return Ok(()),
                    }
                }
                Err(err) => return Err(Error::Store(err)),
            }
        }
        Err(Error::Store(StoreError::other(
            "lease revoke kept racing the store",
        )))
    }

    /// Pure cache read; never calls the store.
    fn handle_check(&self, key: &Key, holder: &str) -> Result<(), Error> {
        let now = self.clock.now();
        match self.leases.get(key) {
            Some(info) if info.holder == holder && info.alive_at(now) => Ok(()),
            _ => Err(Error::NotHeld),
        }
    }

    fn handle_wait_expired(
        &mut self,
        key: Key,
        holder: String,
        reply: Reply,
        cancel: CancellationToken,
    ) {
        match self.leases.get(&key) {
            Some(info) if info.holder == holder => {
                trace!(key = %key, holder = %holder, "waiter parked");
                self.blocks.register(
                    key,
                    Block {
                        holder,
                        reply,
                        cancel,
                    },
                );
            }
            // Absent, or held by someone else: the watched tenure is
            // already over.
            _ => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn handle_pin(&mut self, key: &Key, entity: &str) -> Result<(), Error> {
        self.store
            .pin(key.clone(), entity.to_string())
            .await
            .map_err(Error::Store)?;
        if let Some(info) = self.leases.get_mut(key) {
            info.pinned.insert(entity.to_string());
        }
        debug!(key = %key, entity, "lease pinned");
        Ok(())
    }

    async fn handle_unpin(&mut self, key: &Key, entity: &str) -> Result<(), Error> {
        self.store
            .unpin(key.clone(), entity.to_string())
            .await
            .map_err(Error::Store)?;
        let now = self.clock.now();
        let became_due = match self.leases.get_mut(key) {
            Some(info) => {
                info.pinned.remove(entity);
                info.due_at(now)
            }
            None => false,
        };
        if became_due {
            // The pin was the only thing keeping an overdue lease alive;
            // wake immediately rather than at the next scheduled expiry.
            self.set_probe(now);
        }
        debug!(key = %key, entity, "lease unpinned");
        Ok(())
    }
}
