//! Floating IP lifecycle: allocate-or-adopt, associate, disassociate,
//! delete. Each operation is independently callable and safe to
//! re-invoke after a prior partial failure at any step.

use tracing::{debug, info};

use crate::backoff::BackoffPolicy;
use crate::cloud::types::{FloatingIp, FloatingIpCreateSpec, FloatingIpState, ResourceKind};
use crate::error::{Error, Result};
use crate::spec::{ClusterNetworkSpec, FloatingIpRecord, NetworkStatus};
use crate::waiter::wait_for_status;

use super::NetworkingService;

impl NetworkingService<'_> {
    /// Ensure the API-server floating IP recorded in the status exists,
    /// allocating or adopting one as needed.
    ///
    /// Requires the external network to be reconciled first; without an
    /// external network the cluster has no floating IPs and this is a
    /// no-op unless the spec explicitly asks for an address.
    pub async fn reconcile_floating_ip(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let name = spec
            .floating_ip
            .clone()
            .unwrap_or_else(|| spec.base_name());
        let result = self.ensure_floating_ip(spec, status).await;
        self.finish(ResourceKind::FloatingIp, &name, &spec.cluster_name, result)
    }

    async fn ensure_floating_ip(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let Some(external) = status.external_network.clone() else {
            if spec.floating_ip.is_some() {
                return Err(Error::config(
                    "a floating IP was requested but no external network is configured",
                ));
            }
            debug!("no external network, skipping floating IP");
            return Ok(());
        };

        if let Some(record) = status.floating_ip.clone() {
            let still_wanted = spec
                .floating_ip
                .as_deref()
                .map_or(true, |wanted| wanted == record.address);
            if still_wanted {
                match self.api.get_floating_ip(&record.id).await {
                    Ok(existing) => {
                        debug!(address = %existing.address, "floating IP still present");
                        return Ok(());
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(address = %record.address, "recorded floating IP gone, reallocating");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let fip = self
            .get_or_create_floating_ip(&external.id, spec.floating_ip.as_deref())
            .await?;
        status.floating_ip = Some(FloatingIpRecord {
            id: fip.id,
            address: fip.address,
        });
        Ok(())
    }

    /// Return the floating IP with the requested address if one
    /// already exists, otherwise allocate one on the external network.
    ///
    /// Admin-supplied fixed addresses are assumed pre-provisioned, so
    /// an existing allocation is adopted rather than re-created.
    pub async fn get_or_create_floating_ip(
        &self,
        external_network_id: &str,
        address: Option<&str>,
    ) -> Result<FloatingIp> {
        if let Some(address) = address {
            if let Some(existing) = self.api.find_floating_ip(address).await? {
                self.events
                    .reused(ResourceKind::FloatingIp, &existing.address, &existing.id);
                return Ok(existing);
            }
        }

        let created = self
            .api
            .create_floating_ip(&FloatingIpCreateSpec {
                network_id: external_network_id.to_string(),
                address: address.map(str::to_string),
                description: String::new(),
            })
            .await?;
        self.events
            .created(ResourceKind::FloatingIp, &created.address, &created.id);
        Ok(created)
    }

    /// Bind the floating IP to the port and block until the remote
    /// side reports it ACTIVE. Already bound to this port is a no-op.
    pub async fn associate_floating_ip(
        &self,
        fip: &FloatingIp,
        port_id: &str,
        backoff: &BackoffPolicy,
    ) -> Result<()> {
        if fip.port_id.as_deref() == Some(port_id) {
            debug!(address = %fip.address, port = %port_id, "floating IP already associated");
            return Ok(());
        }

        info!(address = %fip.address, port = %port_id, "associating floating IP");
        self.api
            .update_floating_ip_port(&fip.id, Some(port_id))
            .await?;
        let api = self.api;
        let id = fip.id.as_str();
        wait_for_status(
            &format!("floating IP {}", fip.address),
            &FloatingIpState::Active,
            backoff,
            move || async move { api.get_floating_ip(id).await.map(|fip| fip.status) },
        )
        .await
    }

    /// Clear the floating IP's port binding and block until the remote
    /// side reports it DOWN. Not currently bound is a no-op.
    pub async fn disassociate_floating_ip(
        &self,
        fip: &FloatingIp,
        backoff: &BackoffPolicy,
    ) -> Result<()> {
        if fip.port_id.is_none() {
            debug!(address = %fip.address, "floating IP not associated");
            return Ok(());
        }

        info!(address = %fip.address, "disassociating floating IP");
        self.api.update_floating_ip_port(&fip.id, None).await?;
        let api = self.api;
        let id = fip.id.as_str();
        wait_for_status(
            &format!("floating IP {}", fip.address),
            &FloatingIpState::Down,
            backoff,
            move || async move { api.get_floating_ip(id).await.map(|fip| fip.status) },
        )
        .await
    }

    /// Release the floating IP with the given address. Locate first;
    /// an address that is already gone is a no-op.
    pub async fn delete_floating_ip(&self, address: &str) -> Result<()> {
        let Some(fip) = self.api.find_floating_ip(address).await? else {
            debug!(address = %address, "floating IP already gone");
            return Ok(());
        };
        match self.api.delete_floating_ip(&fip.id).await {
            Ok(()) => self.events.deleted(ResourceKind::FloatingIp, address),
            Err(e) if e.is_not_found() => {
                debug!(address = %address, "floating IP already gone");
            }
            Err(e) => {
                self.events
                    .failed(ResourceKind::FloatingIp, address, &e.to_string());
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Release the floating IP recorded in the status, if any.
    pub async fn delete_floating_ip_record(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(record) = status.floating_ip.clone() else {
            return Ok(());
        };
        match self.api.delete_floating_ip(&record.id).await {
            Ok(()) => self.events.deleted(ResourceKind::FloatingIp, &record.address),
            Err(e) if e.is_not_found() => {
                debug!(address = %record.address, "floating IP already gone");
            }
            Err(e) => {
                self.events
                    .failed(ResourceKind::FloatingIp, &record.address, &e.to_string());
                return Err(e.into());
            }
        }
        status.floating_ip = None;
        Ok(())
    }
}
