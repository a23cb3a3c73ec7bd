//! Router reconciliation: the router itself and one interface per
//! cluster subnet.

use tracing::{debug, info};

use crate::cloud::types::{Filter, ResourceKind, Router, RouterCreateSpec};
use crate::error::{Error, Result};
use crate::locator::{at_most_one, exactly_one, require_filter};
use crate::spec::{ClusterNetworkSpec, NetworkStatus, ResourceStatus};

use super::NetworkingService;

impl NetworkingService<'_> {
    /// Ensure the cluster router exists, carries the external gateway
    /// when one is known, and has exactly one interface per cluster
    /// subnet.
    ///
    /// Interface reconciliation is a strict superset-builder: an
    /// interface is added only when no current interface port carries a
    /// fixed IP on the subnet, and nothing is ever removed here.
    /// Removal happens only during full router teardown.
    pub async fn reconcile_router(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let result = self.ensure_router(spec, status).await;
        self.finish(
            ResourceKind::Router,
            &spec.router_name(),
            &spec.cluster_name,
            result,
        )
    }

    async fn ensure_router(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let router = if let Some(selector) = &spec.router {
            let filter = selector.to_filter();
            require_filter(&filter)?;
            let routers = self.api.list_routers(&filter).await?;
            let router = exactly_one(ResourceKind::Router, &filter, routers)?;
            info!(router = %router.name, id = %router.id, "adopted pre-existing router");
            status.router = Some(ResourceStatus::adopted(router_ref(&router)));
            router
        } else {
            let router = self.ensure_named_router(spec, status).await?;
            let tags = self
                .reconcile_tags(ResourceKind::Router, &router.id, &spec.tags, &router.tags)
                .await?;
            status.router = Some(ResourceStatus::managed(crate::cloud::types::NetworkRef {
                id: router.id.clone(),
                name: router.name.clone(),
                tags,
            }));
            router
        };

        self.ensure_router_interfaces(&router, status).await
    }

    async fn ensure_named_router(
        &self,
        spec: &ClusterNetworkSpec,
        status: &NetworkStatus,
    ) -> Result<Router> {
        let name = spec.router_name();
        let filter = Filter::by_name(&name);
        let routers = self.api.list_routers(&filter).await?;
        match at_most_one(ResourceKind::Router, &filter, routers)? {
            Some(existing) => {
                self.events
                    .reused(ResourceKind::Router, &existing.name, &existing.id);
                Ok(existing)
            }
            None => {
                let created = self
                    .api
                    .create_router(&RouterCreateSpec {
                        name: name.clone(),
                        external_network_id: status
                            .external_network
                            .as_ref()
                            .map(|n| n.id.clone()),
                        description: format!("cluster router for {}", spec.cluster_name),
                    })
                    .await?;
                self.events
                    .created(ResourceKind::Router, &created.name, &created.id);
                Ok(created)
            }
        }
    }

    async fn ensure_router_interfaces(
        &self,
        router: &Router,
        status: &NetworkStatus,
    ) -> Result<()> {
        if status.subnets.is_empty() {
            return Ok(());
        }
        let interface_ports = self.api.list_router_interface_ports(&router.id).await?;

        for subnet in &status.subnets {
            let attached = interface_ports.iter().any(|port| {
                port.fixed_ips
                    .iter()
                    .any(|fixed| fixed.subnet_id.as_deref() == Some(subnet.id.as_str()))
            });
            if attached {
                debug!(router = %router.name, subnet = %subnet.name, "interface already attached");
                continue;
            }
            match self.api.add_router_interface(&router.id, &subnet.id).await {
                Ok(()) => {
                    info!(router = %router.name, subnet = %subnet.name, "attached router interface");
                }
                // A concurrent reconcile may have attached it between the
                // scan and the call.
                Err(e) if e.is_conflict() => {
                    debug!(router = %router.name, subnet = %subnet.name, "interface attached concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Detach the router's interfaces for the recorded subnets and
    /// delete the router. Adopted routers keep their interfaces'
    /// removal but are not themselves deleted.
    pub async fn delete_router(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(router) = status.router.clone() else {
            return Ok(());
        };

        for subnet in &status.subnets {
            match self
                .api
                .remove_router_interface(&router.id, &subnet.id)
                .await
            {
                Ok(()) => {
                    debug!(router = %router.name, subnet = %subnet.name, "detached router interface");
                }
                Err(e) if e.is_not_found() => {
                    debug!(router = %router.name, subnet = %subnet.name, "interface already detached");
                }
                Err(e) => {
                    self.events
                        .failed(ResourceKind::Router, &router.name, &e.to_string());
                    return Err(Error::from(e)
                        .context(format!("detaching interfaces of router {}", router.name)));
                }
            }
        }

        if router.externally_managed {
            debug!(router = %router.name, "router is externally managed, leaving in place");
            status.router = None;
            return Ok(());
        }

        match self.api.delete_router(&router.id).await {
            Ok(()) => self.events.deleted(ResourceKind::Router, &router.name),
            Err(e) if e.is_not_found() => {
                debug!(router = %router.name, "router already gone");
            }
            Err(e) => {
                self.events
                    .failed(ResourceKind::Router, &router.name, &e.to_string());
                return Err(e.into());
            }
        }
        status.router = None;
        Ok(())
    }
}

fn router_ref(router: &Router) -> crate::cloud::types::NetworkRef {
    crate::cloud::types::NetworkRef {
        id: router.id.clone(),
        name: router.name.clone(),
        tags: router.tags.clone(),
    }
}
