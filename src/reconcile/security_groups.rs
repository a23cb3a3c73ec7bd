//! Security group reconciliation.
//!
//! Groups are ensured in two phases: every group is created-if-absent
//! *before* any rule is computed, because rule specifications for one
//! group reference another group's id as a remote selector. Rule
//! reconciliation is a symmetric-difference diff under semantic rule
//! equality, so re-invocation after an interrupted run leaves matching
//! rules untouched and converges without churn.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cloud::types::{
    Direction, EtherType, Filter, ResourceKind, SecurityGroup, SecurityGroupCreateSpec,
    SecurityGroupRule, SecurityGroupRuleSpec,
};
use crate::error::{Error, Result};
use crate::locator::at_most_one;
use crate::spec::{
    ClusterNetworkSpec, NetworkStatus, RemoteRef, RuleSpec, SecurityGroupRole,
    SecurityGroupStatus,
};

use super::NetworkingService;

/// Kubernetes API server port
const API_SERVER_PORT: u16 = 6443;
/// etcd client and peer ports
const ETCD_PORT_MIN: u16 = 2379;
/// Upper bound of the etcd port range
const ETCD_PORT_MAX: u16 = 2380;
/// Kubelet API port
const KUBELET_PORT: u16 = 10250;
/// SSH port, opened via the bastion only
const SSH_PORT: u16 = 22;
/// Any IPv4 source
const ANYWHERE_V4: &str = "0.0.0.0/0";

impl NetworkingService<'_> {
    /// Ensure the managed security groups exist with exactly the
    /// desired rule sets, and record them in the status.
    pub async fn reconcile_security_groups(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        if !spec.managed_security_groups {
            debug!("security group management disabled, skipping");
            return Ok(());
        }
        let result = self.ensure_security_groups(spec, status).await;
        self.finish(
            ResourceKind::SecurityGroup,
            &spec.base_name(),
            &spec.cluster_name,
            result,
        )
    }

    async fn ensure_security_groups(
        &self,
        spec: &ClusterNetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let roles = spec.security_group_roles();

        // Phase 1: every group must exist before any rule is computed,
        // since rules reference other groups' ids.
        let mut groups = Vec::with_capacity(roles.len());
        for role in &roles {
            groups.push((*role, self.ensure_security_group(spec, *role).await?));
        }
        let ids: BTreeMap<SecurityGroupRole, String> = groups
            .iter()
            .map(|(role, group)| (*role, group.id.clone()))
            .collect();

        // Phase 2: diff each group's rules against the desired set.
        for (role, group) in groups {
            let desired = desired_rules(spec, role, &ids);
            let rules = self
                .reconcile_rules(&group.id, &desired, group.rules)
                .await
                .map_err(|e| e.context(format!("reconciling rules of {}", group.name)))?;
            self.reconcile_tags(ResourceKind::SecurityGroup, &group.id, &spec.tags, &group.tags)
                .await?;
            status.security_groups.insert(
                role,
                SecurityGroupStatus {
                    id: group.id,
                    name: group.name,
                    rules,
                },
            );
        }

        // Groups for roles no longer desired (bastion toggled off) are
        // torn down so the account converges to the spec.
        let stale: Vec<SecurityGroupRole> = status
            .security_groups
            .keys()
            .filter(|role| !roles.contains(role))
            .copied()
            .collect();
        for role in stale {
            if let Some(group) = status.security_groups.remove(&role) {
                match self.api.delete_security_group(&group.id).await {
                    Ok(()) => self
                        .events
                        .deleted(ResourceKind::SecurityGroup, &group.name),
                    Err(e) if e.is_not_found() => {
                        debug!(group = %group.name, "security group already gone");
                    }
                    Err(e) => {
                        status.security_groups.insert(role, group);
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }

    async fn ensure_security_group(
        &self,
        spec: &ClusterNetworkSpec,
        role: SecurityGroupRole,
    ) -> Result<SecurityGroup> {
        let name = spec.security_group_name(role);
        let filter = Filter::by_name(&name);
        let groups = self.api.list_security_groups(&filter).await?;
        match at_most_one(ResourceKind::SecurityGroup, &filter, groups)? {
            Some(existing) => {
                self.events
                    .reused(ResourceKind::SecurityGroup, &existing.name, &existing.id);
                Ok(existing)
            }
            None => {
                let created = self
                    .api
                    .create_security_group(&SecurityGroupCreateSpec {
                        name: name.clone(),
                        description: format!("{role} security group for {}", spec.cluster_name),
                    })
                    .await?;
                self.events
                    .created(ResourceKind::SecurityGroup, &created.name, &created.id);
                Ok(created)
            }
        }
    }

    /// Drive a group's rule set to the desired one.
    ///
    /// Returns the new observed state: rules present in both sets carry
    /// over unchanged with their remote ids; the rest of the observed
    /// set is deleted and the rest of the desired set is created. The
    /// number of remote mutations equals the size of the symmetric
    /// difference under semantic equality.
    pub async fn reconcile_rules(
        &self,
        group_id: &str,
        desired: &[RuleSpec],
        observed: Vec<SecurityGroupRule>,
    ) -> Result<Vec<SecurityGroupRule>> {
        // Dedupe the desired set: two identical desired rules would
        // otherwise create a remote duplicate on every run.
        let mut resolved: Vec<SecurityGroupRuleSpec> = Vec::with_capacity(desired.len());
        for rule in desired.iter().map(|d| d.resolve(group_id)) {
            if !resolved.contains(&rule) {
                resolved.push(rule);
            }
        }

        let (carried, to_delete): (Vec<_>, Vec<_>) = observed
            .into_iter()
            .partition(|o| resolved.iter().any(|d| d.matches(o)));
        let to_create: Vec<&SecurityGroupRuleSpec> = resolved
            .iter()
            .filter(|d| !carried.iter().any(|o| d.matches(o)))
            .collect();

        for rule in &to_delete {
            match self.api.delete_security_group_rule(&rule.id).await {
                Ok(()) => debug!(rule = %rule.id, "deleted stale security group rule"),
                Err(e) if e.is_not_found() => {
                    debug!(rule = %rule.id, "rule already gone");
                }
                Err(e) => {
                    return Err(Error::from(e)
                        .context(format!("deleting security group rule {}", rule.id)))
                }
            }
        }

        let mut result = carried;
        for rule in to_create {
            let created = self.api.create_security_group_rule(group_id, rule).await?;
            result.push(created);
        }
        Ok(result)
    }

    /// Delete the managed security groups recorded in the status.
    pub async fn delete_security_groups(&self, status: &mut NetworkStatus) -> Result<()> {
        let roles: Vec<SecurityGroupRole> = status.security_groups.keys().copied().collect();
        for role in roles {
            let group = status.security_groups[&role].clone();
            match self.api.delete_security_group(&group.id).await {
                Ok(()) => self
                    .events
                    .deleted(ResourceKind::SecurityGroup, &group.name),
                Err(e) if e.is_not_found() => {
                    debug!(group = %group.name, "security group already gone");
                }
                Err(e) => {
                    self.events
                        .failed(ResourceKind::SecurityGroup, &group.name, &e.to_string());
                    return Err(e.into());
                }
            }
            status.security_groups.remove(&role);
        }
        Ok(())
    }
}

/// Desired rule set for one managed group.
///
/// `ids` maps every ensured role to its group id, so cross-group
/// remote references can be stamped in.
fn desired_rules(
    spec: &ClusterNetworkSpec,
    role: SecurityGroupRole,
    ids: &BTreeMap<SecurityGroupRole, String>,
) -> Vec<RuleSpec> {
    let mut rules = vec![
        egress_any(EtherType::IPv4),
        egress_any(EtherType::IPv6),
        RuleSpec {
            direction: Direction::Ingress,
            ether_type: EtherType::IPv4,
            protocol: None,
            port_range_min: None,
            port_range_max: None,
            remote: RemoteRef::SelfGroup,
            description: "allow all within group".to_string(),
        },
    ];

    match role {
        SecurityGroupRole::ControlPlane => {
            rules.push(ingress_tcp(
                API_SERVER_PORT,
                API_SERVER_PORT,
                RemoteRef::Prefix(ANYWHERE_V4.to_string()),
                "Kubernetes API server",
            ));
            rules.push(ingress_tcp(
                ETCD_PORT_MIN,
                ETCD_PORT_MAX,
                RemoteRef::SelfGroup,
                "etcd",
            ));
            if let Some(worker_id) = ids.get(&SecurityGroupRole::Worker) {
                rules.push(ingress_tcp(
                    KUBELET_PORT,
                    KUBELET_PORT,
                    RemoteRef::Group(worker_id.clone()),
                    "kubelet from workers",
                ));
            }
        }
        SecurityGroupRole::Worker => {
            if let Some(cp_id) = ids.get(&SecurityGroupRole::ControlPlane) {
                rules.push(ingress_tcp(
                    KUBELET_PORT,
                    KUBELET_PORT,
                    RemoteRef::Group(cp_id.clone()),
                    "kubelet from control plane",
                ));
            }
        }
        SecurityGroupRole::Bastion => {
            rules.push(ingress_tcp(
                SSH_PORT,
                SSH_PORT,
                RemoteRef::Prefix(ANYWHERE_V4.to_string()),
                "SSH to bastion",
            ));
        }
    }

    if spec.bastion_enabled && role != SecurityGroupRole::Bastion {
        if let Some(bastion_id) = ids.get(&SecurityGroupRole::Bastion) {
            rules.push(ingress_tcp(
                SSH_PORT,
                SSH_PORT,
                RemoteRef::Group(bastion_id.clone()),
                "SSH from bastion",
            ));
        }
    }

    rules
}

fn ingress_tcp(min: u16, max: u16, remote: RemoteRef, description: &str) -> RuleSpec {
    RuleSpec {
        direction: Direction::Ingress,
        ether_type: EtherType::IPv4,
        protocol: Some("tcp".to_string()),
        port_range_min: Some(min),
        port_range_max: Some(max),
        remote,
        description: description.to_string(),
    }
}

fn egress_any(ether_type: EtherType) -> RuleSpec {
    RuleSpec {
        direction: Direction::Egress,
        ether_type,
        protocol: None,
        port_range_min: None,
        port_range_max: None,
        remote: RemoteRef::Any,
        description: "allow all egress".to_string(),
    }
}
