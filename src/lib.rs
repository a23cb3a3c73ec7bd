//! Trellis - cloud network reconciler for cluster infrastructure
//!
//! Trellis drives a cluster's networking topology (virtual network,
//! subnets, router, security groups and their rules, floating IPs,
//! ports, and port trunks) into convergence with a desired
//! specification by calling a remote cloud networking API.
//!
//! # Architecture
//!
//! The remote API offers no transactional guarantees and every call may
//! already have partially succeeded from a prior attempt, so the
//! reconciler is built around three ideas:
//!
//! - **Idempotent upsert**: every resource is located by a
//!   deterministic name (or a caller-supplied selector) before it is
//!   created, and "already exists" is reuse, not an error.
//! - **Convergent diffing**: security group rules are reconciled as the
//!   symmetric difference between desired and observed sets under
//!   semantic rule equality, so matching rules are never churned.
//! - **Bounded waits**: state transitions and deletions are polled
//!   under explicit backoff and timeout policies; "not found" on
//!   delete is success.
//!
//! All operations are synchronous, blocking calls with no internal
//! parallelism; the caller's [`spec::NetworkStatus`] record is the only
//! cross-call memory.
//!
//! # Modules
//!
//! - [`cloud`] - typed remote client seam and resource model
//! - [`spec`] - desired-state configuration and observed-status record
//! - [`reconcile`] - one reconcile function per resource kind
//! - [`locator`] - find-by-filter primitive
//! - [`waiter`] - state-transition and deletion waiters
//! - [`backoff`] - explicit backoff and polling policies
//! - [`events`] - lifecycle event recording
//! - [`error`] - error types for the reconciler

#![deny(missing_docs)]

pub mod backoff;
pub mod cloud;
pub mod error;
pub mod events;
pub mod locator;
pub mod reconcile;
pub mod spec;
pub mod waiter;

pub use error::Error;
pub use reconcile::NetworkingService;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
