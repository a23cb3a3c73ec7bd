//! Port reconciliation and trunk-aware teardown.
//!
//! Deleting a port that carries a trunk cascades in three phases:
//! detach all subports, delete each subport's underlying port, then
//! delete the trunk. The remote API refuses to delete a trunk or a
//! port that is still attached as a subport, so the order is load
//! bearing. Only then is the parent port itself deleted.

use tracing::debug;

use crate::backoff::DeletePollPolicy;
use crate::cloud::types::{Filter, Port, PortCreateSpec, ResourceKind, Trunk, TrunkCreateSpec};
use crate::error::{Error, Result};
use crate::locator::at_most_one;
use crate::spec::{ClusterNetworkSpec, NetworkStatus, PortSpec};
use crate::waiter::wait_for_deleted;

use super::NetworkingService;

impl NetworkingService<'_> {
    /// Ensure a port exists on the cluster network with the desired
    /// fixed-IP bindings and security groups, plus its trunk when the
    /// spec asks for one.
    pub async fn reconcile_port(
        &self,
        spec: &ClusterNetworkSpec,
        port_spec: &PortSpec,
        status: &NetworkStatus,
    ) -> Result<Port> {
        let result = self.ensure_port(spec, port_spec, status).await;
        self.finish(
            ResourceKind::Port,
            &port_spec.name,
            &spec.cluster_name,
            result,
        )
    }

    async fn ensure_port(
        &self,
        spec: &ClusterNetworkSpec,
        port_spec: &PortSpec,
        status: &NetworkStatus,
    ) -> Result<Port> {
        let network_id = status
            .network
            .as_ref()
            .map(|n| n.id.clone())
            .ok_or_else(|| Error::config("cluster network must be reconciled before ports"))?;

        let filter = Filter::by_name(&port_spec.name).on_network(&network_id);
        let ports = self.api.list_ports(&filter).await?;
        let port = match at_most_one(ResourceKind::Port, &filter, ports)? {
            Some(existing) => {
                self.events
                    .reused(ResourceKind::Port, &existing.name, &existing.id);
                existing
            }
            None => {
                let created = self
                    .api
                    .create_port(&PortCreateSpec {
                        name: port_spec.name.clone(),
                        network_id: network_id.clone(),
                        fixed_ips: port_spec.fixed_ips.clone(),
                        security_groups: port_spec.security_groups.clone(),
                        description: port_spec.description.clone(),
                    })
                    .await?;
                self.events
                    .created(ResourceKind::Port, &created.name, &created.id);
                created
            }
        };

        let mut tags = spec.tags.clone();
        tags.extend(port_spec.tags.iter().cloned());
        self.reconcile_tags(ResourceKind::Port, &port.id, &tags, &port.tags)
            .await?;

        if port_spec.trunk {
            self.ensure_trunk(&port, &tags).await?;
        }
        Ok(port)
    }

    /// Ensure the trunk whose parent is the given port.
    pub async fn ensure_trunk(&self, port: &Port, tags: &[String]) -> Result<Trunk> {
        let trunk = match self.api.find_trunk_by_port(&port.id).await? {
            Some(existing) => {
                self.events
                    .reused(ResourceKind::Trunk, &existing.name, &existing.id);
                existing
            }
            None => {
                let created = self
                    .api
                    .create_trunk(&TrunkCreateSpec {
                        name: format!("{}-trunk", port.name),
                        port_id: port.id.clone(),
                        description: String::new(),
                    })
                    .await?;
                self.events
                    .created(ResourceKind::Trunk, &created.name, &created.id);
                created
            }
        };
        self.reconcile_tags(ResourceKind::Trunk, &trunk.id, tags, &trunk.tags)
            .await?;
        Ok(trunk)
    }

    /// Delete a port, cascading through its trunk first when one is
    /// attached. A port already gone is a no-op.
    pub async fn delete_port(&self, port_id: &str) -> Result<()> {
        let port = match self.api.get_port(port_id).await {
            Ok(port) => port,
            Err(e) if e.is_not_found() => {
                debug!(port = %port_id, "port already gone");
                return Ok(());
            }
            Err(e) => return Err(Error::from(e).context(format!("fetching port {port_id}"))),
        };

        if let Some(trunk) = self.api.find_trunk_by_port(&port.id).await? {
            self.delete_trunk_cascade(&trunk).await?;
        }

        let api = self.api;
        wait_for_deleted(
            &format!("port {}", port.name),
            &DeletePollPolicy::port(),
            move || api.delete_port(port_id),
        )
        .await?;
        self.events.deleted(ResourceKind::Port, &port.name);
        Ok(())
    }

    /// Tear down a trunk: detach subports, delete their underlying
    /// ports, then delete the trunk, strictly in that order.
    async fn delete_trunk_cascade(&self, trunk: &Trunk) -> Result<()> {
        let api = self.api;
        let subports = self.api.list_subports(&trunk.id).await?;

        if !subports.is_empty() {
            debug!(trunk = %trunk.name, count = subports.len(), "removing subports");
            let trunk_id = trunk.id.as_str();
            let batch = subports.as_slice();
            wait_for_deleted(
                &format!("subports of trunk {}", trunk.name),
                &DeletePollPolicy::subport_removal(),
                move || api.remove_subports(trunk_id, batch),
            )
            .await?;

            for subport in &subports {
                let port_id = subport.port_id.as_str();
                wait_for_deleted(
                    &format!("subport port {}", subport.port_id),
                    &DeletePollPolicy::port(),
                    move || api.delete_port(port_id),
                )
                .await?;
            }
        }

        let trunk_id = trunk.id.as_str();
        wait_for_deleted(
            &format!("trunk {}", trunk.name),
            &DeletePollPolicy::trunk(),
            move || api.delete_trunk(trunk_id),
        )
        .await?;
        self.events.deleted(ResourceKind::Trunk, &trunk.name);
        Ok(())
    }
}
