//! LeaseKeeper - single-writer coordination of time-bounded named leases.
//!
//! This library implements the core of a distributed lease manager: a
//! single-owner dispatcher that grants, extends, and expires named leases
//! against a pluggable replicated store, with at-most-one-holder semantics
//! and careful handling of stale-view races and clock drift.
//!
//! # High-Level API
//!
//! Construct a [`manager::Manager`] from a [`manager::ManagerConfig`], spawn
//! its run loop, and hand out façades to clients:
//!
//! ```ignore
//! use leasekeeper::manager::{Manager, ManagerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let (manager, handle) = Manager::new(config)?;
//! let shutdown = CancellationToken::new();
//! tokio::spawn(manager.run(shutdown.clone()));
//!
//! let claimer = handle.claimer("application", model_uuid)?;
//! claimer.claim("redis", "redis/0", Duration::from_secs(60)).await?;
//! ```
//!
//! The store and clock are supplied by the embedder as trait objects; see
//! [`store::Store`] and [`clock::Clock`]. Tests drive time deterministically
//! with [`clock::fake::FakeClock`].

pub mod clock;
pub mod lease;
pub mod manager;
pub mod secretary;
pub mod store;

/// Version of the LeaseKeeper library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
