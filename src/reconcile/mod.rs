//! Per-kind reconcile functions.
//!
//! [`NetworkingService`] bundles the remote client and the event sink;
//! each submodule contributes the reconcile and teardown operations for
//! one resource kind. Resource kinds are reconciled in a fixed
//! sequential dependency order matching their creation dependency:
//! network, subnets, router, security groups, then ports and floating
//! IPs. There is no internal parallelism and no state between calls;
//! convergence after a partial failure comes from re-invocation.

mod floating_ip;
mod network;
mod ports;
mod router;
mod security_groups;
mod subnet;
mod tags;

use crate::cloud::types::ResourceKind;
use crate::cloud::NetworkingApi;
use crate::error::Result;
use crate::events::EventRecorder;
use crate::spec::{ClusterNetworkSpec, NetworkStatus};

/// Reconciler over the remote networking API.
///
/// Holds no state of its own; the caller's [`NetworkStatus`] record is
/// the only cross-call memory.
pub struct NetworkingService<'a> {
    pub(crate) api: &'a dyn NetworkingApi,
    pub(crate) events: &'a dyn EventRecorder,
}

impl<'a> NetworkingService<'a> {
    /// Create a service over the given client and event sink
    pub fn new(api: &'a dyn NetworkingApi, events: &'a dyn EventRecorder) -> Self {
        Self { api, events }
    }

    /// Wrap a reconcile result with resource kind and name context and
    /// emit a warning event on failure, so operators can see which
    /// resource and which operation failed without reading logs.
    pub(crate) fn finish<T>(
        &self,
        kind: ResourceKind,
        name: &str,
        cluster: &str,
        result: Result<T>,
    ) -> Result<T> {
        result.map_err(|e| {
            self.events.failed(kind, name, &e.to_string());
            e.context(format!("reconciling {kind} {name} for cluster {cluster}"))
        })
    }

    /// Reconcile the cluster-level networking topology in dependency
    /// order: network, external network, subnets, router, security
    /// groups, API floating IP.
    ///
    /// Ports and trunks are per-machine resources; drive them with
    /// [`NetworkingService::reconcile_port`] and
    /// [`NetworkingService::delete_port`] from the machine's own loop.
    pub async fn reconcile(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        spec.validate()?;
        self.reconcile_network(spec, status).await?;
        self.reconcile_external_network(spec, status).await?;
        self.reconcile_subnets(spec, status).await?;
        self.reconcile_router(spec, status).await?;
        self.reconcile_security_groups(spec, status).await?;
        self.reconcile_floating_ip(spec, status).await?;
        Ok(())
    }

    /// Tear down the cluster-level topology in reverse dependency
    /// order. Externally-managed resources are left alone; resources
    /// already gone are skipped, so a double invocation is a no-op.
    pub async fn teardown(&self, status: &mut NetworkStatus) -> Result<()> {
        self.delete_floating_ip_record(status).await?;
        self.delete_security_groups(status).await?;
        self.delete_router(status).await?;
        self.delete_subnets(status).await?;
        self.delete_network(status).await?;
        Ok(())
    }
}
