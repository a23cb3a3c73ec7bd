//! Subnet reconciliation on the cluster network.

use tracing::debug;

use crate::cloud::types::{Filter, ResourceKind, Subnet, SubnetCreateSpec};
use crate::error::{Error, Result};
use crate::locator::at_most_one;
use crate::spec::{ClusterNetworkSpec, NetworkStatus, SubnetStatus};

use super::NetworkingService;

impl NetworkingService<'_> {
    /// Ensure every desired subnet exists on the cluster network and
    /// record the observed set in the status.
    pub async fn reconcile_subnets(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let result = self.ensure_subnets(spec, status).await;
        self.finish(
            ResourceKind::Subnet,
            &spec.base_name(),
            &spec.cluster_name,
            result,
        )
    }

    async fn ensure_subnets(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let network_id = status
            .network
            .as_ref()
            .map(|n| n.id.clone())
            .ok_or_else(|| Error::config("cluster network must be reconciled before subnets"))?;

        let mut observed = Vec::with_capacity(spec.subnets.len());
        for (index, subnet_spec) in spec.subnets.iter().enumerate() {
            let cidr = subnet_spec.parse_cidr()?;
            let name = spec.subnet_name(subnet_spec, index);
            let subnet = self
                .ensure_subnet(spec, &network_id, &name, &cidr.to_string())
                .await?;
            observed.push(SubnetStatus {
                id: subnet.id.clone(),
                name: subnet.name.clone(),
                cidr: subnet.cidr.clone(),
            });
        }
        status.subnets = observed;
        Ok(())
    }

    async fn ensure_subnet(
        &self,
        spec: &ClusterNetworkSpec,
        network_id: &str,
        name: &str,
        cidr: &str,
    ) -> Result<Subnet> {
        let filter = Filter::by_name(name).on_network(network_id);
        let subnets = self.api.list_subnets(&filter).await?;
        let subnet = match at_most_one(ResourceKind::Subnet, &filter, subnets)? {
            Some(existing) => {
                if existing.cidr != cidr {
                    return Err(Error::config(format!(
                        "subnet {name} exists with CIDR {} but {cidr} was requested; \
                         subnet CIDRs cannot be changed in place",
                        existing.cidr
                    )));
                }
                self.events
                    .reused(ResourceKind::Subnet, &existing.name, &existing.id);
                existing
            }
            None => {
                let created = self
                    .api
                    .create_subnet(&SubnetCreateSpec {
                        name: name.to_string(),
                        network_id: network_id.to_string(),
                        cidr: cidr.to_string(),
                        dns_nameservers: spec.dns_nameservers.clone(),
                        description: format!("cluster subnet for {}", spec.cluster_name),
                    })
                    .await?;
                self.events
                    .created(ResourceKind::Subnet, &created.name, &created.id);
                created
            }
        };

        self.reconcile_tags(ResourceKind::Subnet, &subnet.id, &spec.tags, &subnet.tags)
            .await?;
        Ok(subnet)
    }

    /// Delete the subnets recorded in the status. Subnets already gone
    /// are skipped.
    pub async fn delete_subnets(&self, status: &mut NetworkStatus) -> Result<()> {
        let mut pending = std::mem::take(&mut status.subnets).into_iter();
        while let Some(subnet) = pending.next() {
            match self.api.delete_subnet(&subnet.id).await {
                Ok(()) => self.events.deleted(ResourceKind::Subnet, &subnet.name),
                Err(e) if e.is_not_found() => {
                    debug!(subnet = %subnet.name, "subnet already gone");
                }
                Err(e) => {
                    self.events
                        .failed(ResourceKind::Subnet, &subnet.name, &e.to_string());
                    // Put the unfinished work back so a re-invocation retries it.
                    status.subnets.push(subnet);
                    status.subnets.extend(pending);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}
