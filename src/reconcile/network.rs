//! Cluster network and external network reconciliation.

use tracing::{debug, info};

use crate::cloud::types::{Filter, NetworkCreateSpec, ResourceKind};
use crate::error::Result;
use crate::locator::{at_most_one, exactly_one, require_filter};
use crate::spec::{ClusterNetworkSpec, NetworkStatus, ResourceStatus};

use super::NetworkingService;

impl NetworkingService<'_> {
    /// Ensure the cluster network exists and record it in the status.
    ///
    /// When the spec carries a network selector the matching
    /// pre-existing network is adopted and marked externally managed;
    /// otherwise the network is located by its deterministic name and
    /// created if absent.
    pub async fn reconcile_network(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let result = self.ensure_network(spec, status).await;
        self.finish(
            ResourceKind::Network,
            &spec.network_name(),
            &spec.cluster_name,
            result,
        )
    }

    async fn ensure_network(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        if let Some(selector) = &spec.network {
            let filter = selector.to_filter();
            require_filter(&filter)?;
            let networks = self.api.list_networks(&filter).await?;
            let network = exactly_one(ResourceKind::Network, &filter, networks)?;
            info!(network = %network.name, id = %network.id, "adopted pre-existing cluster network");
            status.network = Some(ResourceStatus::adopted(network.as_ref()));
            return Ok(());
        }

        let name = spec.network_name();
        let filter = Filter::by_name(&name);
        let networks = self.api.list_networks(&filter).await?;
        let network = match at_most_one(ResourceKind::Network, &filter, networks)? {
            Some(existing) => {
                self.events
                    .reused(ResourceKind::Network, &existing.name, &existing.id);
                existing
            }
            None => {
                let created = self
                    .api
                    .create_network(&NetworkCreateSpec {
                        name: name.clone(),
                        admin_state_up: true,
                        description: format!("cluster network for {}", spec.cluster_name),
                    })
                    .await?;
                self.events
                    .created(ResourceKind::Network, &created.name, &created.id);
                created
            }
        };

        let tags = self
            .reconcile_tags(ResourceKind::Network, &network.id, &spec.tags, &network.tags)
            .await?;
        status.network = Some(ResourceStatus::managed(crate::cloud::types::NetworkRef {
            id: network.id,
            name: network.name,
            tags,
        }));
        Ok(())
    }

    /// Locate the external (floating) network named by the spec's
    /// selector and record it. The external network is never created;
    /// without a selector this is a no-op.
    pub async fn reconcile_external_network(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let Some(selector) = &spec.external_network else {
            debug!("no external network selector, skipping");
            status.external_network = None;
            return Ok(());
        };

        let filter = selector.to_filter();
        let result = async {
            require_filter(&filter)?;
            let networks = self.api.list_networks(&filter).await?;
            let network = exactly_one(ResourceKind::Network, &filter, networks)?;
            info!(network = %network.name, id = %network.id, "using external network");
            status.external_network = Some(ResourceStatus::adopted(network.as_ref()));
            Ok(())
        }
        .await;
        self.finish(
            ResourceKind::Network,
            &filter.to_string(),
            &spec.cluster_name,
            result,
        )
    }

    /// Delete the cluster network recorded in the status.
    ///
    /// Adopted networks are left alone; a network already gone is a
    /// no-op.
    pub async fn delete_network(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(network) = status.network.clone() else {
            return Ok(());
        };
        if network.externally_managed {
            debug!(network = %network.name, "network is externally managed, leaving in place");
            status.network = None;
            return Ok(());
        }

        match self.api.delete_network(&network.id).await {
            Ok(()) => self.events.deleted(ResourceKind::Network, &network.name),
            Err(e) if e.is_not_found() => {
                debug!(network = %network.name, "network already gone");
            }
            Err(e) => {
                self.events
                    .failed(ResourceKind::Network, &network.name, &e.to_string());
                return Err(e.into());
            }
        }
        status.network = None;
        status.external_network = None;
        Ok(())
    }
}
