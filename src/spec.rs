//! Desired-state configuration and the observed-status record.
//!
//! [`ClusterNetworkSpec`] is the caller-supplied target state for a
//! cluster's networking topology. [`NetworkStatus`] is the record each
//! reconcile function mutates in place; the caller persists it between
//! invocations; it is the only cross-call memory the reconciler has.

use std::collections::BTreeMap;
use std::fmt;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::cloud::types::{Filter, FixedIp, NetworkRef, SecurityGroupRule};
use crate::error::{Error, Result};

fn default_name_prefix() -> String {
    "trellis".to_string()
}

fn default_true() -> bool {
    true
}

/// Selector for a pre-existing ("bring your own") resource.
///
/// When set, the reconciler adopts the matching resource instead of
/// creating one, and teardown leaves it alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSelector {
    /// Select by resource id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Select by exact resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceSelector {
    /// Convert to a lookup filter
    pub fn to_filter(&self) -> Filter {
        Filter {
            id: self.id.clone(),
            name: self.name.clone(),
            network_id: None,
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

/// Desired state for one subnet on the cluster network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// Explicit subnet name; defaults to a deterministic cluster name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CIDR to allocate
    pub cidr: String,
}

impl SubnetSpec {
    /// Parse and validate the CIDR
    pub fn parse_cidr(&self) -> Result<IpNet> {
        self.cidr
            .parse::<IpNet>()
            .map_err(|e| Error::config(format!("invalid subnet CIDR {:?}: {e}", self.cidr)))
    }
}

/// Desired state for a port.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Explicit port name
    pub name: String,
    /// Fixed IP / subnet bindings to request
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    /// Security group ids to apply to the port
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Whether the port carries a trunk
    #[serde(default)]
    pub trunk: bool,
    /// Tags to place on the port (and trunk, if any)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

/// Remote selector of a security group rule.
///
/// Replaces the "self" sentinel string: the self-reference is a tagged
/// variant resolved against the owning group's id at apply time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteRef {
    /// The group this rule itself belongs to
    SelfGroup,
    /// Another security group, by id
    Group(String),
    /// A remote CIDR
    Prefix(String),
    /// No remote restriction
    Any,
}

/// Desired security group rule, before remote resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Traffic direction
    pub direction: crate::cloud::types::Direction,
    /// Ethernet type
    pub ether_type: crate::cloud::types::EtherType,
    /// IP protocol; `None` means all
    pub protocol: Option<String>,
    /// Lower bound of the port range
    pub port_range_min: Option<u16>,
    /// Upper bound of the port range
    pub port_range_max: Option<u16>,
    /// Remote selector
    pub remote: RemoteRef,
    /// Human-readable description
    pub description: String,
}

impl RuleSpec {
    /// Resolve the remote selector against the owning group's id,
    /// yielding the wire-level create spec.
    pub fn resolve(&self, owner_group_id: &str) -> crate::cloud::types::SecurityGroupRuleSpec {
        let (remote_group_id, remote_ip_prefix) = match &self.remote {
            RemoteRef::SelfGroup => (Some(owner_group_id.to_string()), None),
            RemoteRef::Group(id) => (Some(id.clone()), None),
            RemoteRef::Prefix(cidr) => (None, Some(cidr.clone())),
            RemoteRef::Any => (None, None),
        };
        crate::cloud::types::SecurityGroupRuleSpec {
            direction: self.direction,
            ether_type: self.ether_type,
            protocol: self.protocol.clone(),
            port_range_min: self.port_range_min,
            port_range_max: self.port_range_max,
            remote_group_id,
            remote_ip_prefix,
            description: self.description.clone(),
        }
    }
}

/// Roles of the security groups the reconciler manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityGroupRole {
    /// Control plane nodes
    ControlPlane,
    /// Worker nodes
    Worker,
    /// Bastion host
    Bastion,
}

impl fmt::Display for SecurityGroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlPlane => write!(f, "controlplane"),
            Self::Worker => write!(f, "worker"),
            Self::Bastion => write!(f, "bastion"),
        }
    }
}

/// Caller-supplied target state for a cluster's networking topology.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterNetworkSpec {
    /// Cluster name; part of every deterministic resource name
    pub cluster_name: String,
    /// Prefix for deterministic resource names
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// Adopt a pre-existing cluster network instead of creating one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<ResourceSelector>,
    /// Selector for the external (floating) network; never created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_network: Option<ResourceSelector>,
    /// Adopt a pre-existing router instead of creating one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<ResourceSelector>,
    /// Subnets to ensure on the cluster network
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,
    /// DNS nameservers for created subnets
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
    /// Tags placed on every managed resource
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the reconciler manages security groups and their rules
    #[serde(default = "default_true")]
    pub managed_security_groups: bool,
    /// Whether a bastion host is part of the cluster
    #[serde(default)]
    pub bastion_enabled: bool,
    /// Specific floating IP address to use for the API server, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip: Option<String>,
}

impl ClusterNetworkSpec {
    /// Deterministic base name: `<prefix>-cluster-<clusterName>`
    pub fn base_name(&self) -> String {
        format!("{}-cluster-{}", self.name_prefix, self.cluster_name)
    }

    /// Name of the managed cluster network
    pub fn network_name(&self) -> String {
        self.base_name()
    }

    /// Name of the subnet at the given index, unless the spec names it
    pub fn subnet_name(&self, subnet: &SubnetSpec, index: usize) -> String {
        subnet
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-subnet-{index}", self.base_name()))
    }

    /// Name of the managed router
    pub fn router_name(&self) -> String {
        format!("{}-router", self.base_name())
    }

    /// Name of the managed security group for the role
    pub fn security_group_name(&self, role: SecurityGroupRole) -> String {
        format!("{}-secgroup-{role}", self.base_name())
    }

    /// Roles of the security groups this spec wants managed
    pub fn security_group_roles(&self) -> Vec<SecurityGroupRole> {
        let mut roles = vec![SecurityGroupRole::ControlPlane, SecurityGroupRole::Worker];
        if self.bastion_enabled {
            roles.push(SecurityGroupRole::Bastion);
        }
        roles
    }

    /// Validate the spec before any remote call is made
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(Error::config("cluster name must not be empty"));
        }
        if self.name_prefix.is_empty() {
            return Err(Error::config("resource name prefix must not be empty"));
        }
        for subnet in &self.subnets {
            subnet.parse_cidr()?;
        }
        if let Some(ref selector) = self.network {
            if selector.is_empty() {
                return Err(Error::config(
                    "network selector was set but no filters were passed",
                ));
            }
        }
        if let Some(ref selector) = self.external_network {
            if selector.is_empty() {
                return Err(Error::config(
                    "external network selector was set but no filters were passed",
                ));
            }
        }
        Ok(())
    }
}

/// Identity of an adopted or created resource, plus ownership.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Cloud-assigned id
    pub id: String,
    /// Resource name
    pub name: String,
    /// Tags observed on the resource
    #[serde(default)]
    pub tags: Vec<String>,
    /// True if the caller supplied the resource; suppresses teardown
    #[serde(default)]
    pub externally_managed: bool,
}

impl ResourceStatus {
    /// Record a resource created and owned by the reconciler
    pub fn managed(r: NetworkRef) -> Self {
        Self {
            id: r.id,
            name: r.name,
            tags: r.tags,
            externally_managed: false,
        }
    }

    /// Record a caller-supplied resource adopted by filter
    pub fn adopted(r: NetworkRef) -> Self {
        Self {
            id: r.id,
            name: r.name,
            tags: r.tags,
            externally_managed: true,
        }
    }
}

/// Observed state of one subnet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetStatus {
    /// Cloud-assigned id
    pub id: String,
    /// Subnet name
    pub name: String,
    /// CIDR of the subnet
    pub cidr: String,
}

/// Observed state of one managed security group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupStatus {
    /// Cloud-assigned id
    pub id: String,
    /// Group name
    pub name: String,
    /// Rules on the group after the last reconcile
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

/// Observed floating IP allocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatingIpRecord {
    /// Cloud-assigned id
    pub id: String,
    /// The allocated address
    pub address: String,
}

/// Observed-status record mutated in place by the reconcile functions.
///
/// Serialize and persist this between invocations; the reconciler keeps
/// no other state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// The cluster network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<ResourceStatus>,
    /// The external (floating) network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_network: Option<ResourceStatus>,
    /// Subnets on the cluster network
    #[serde(default)]
    pub subnets: Vec<SubnetStatus>,
    /// The cluster router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<ResourceStatus>,
    /// Managed security groups by role
    #[serde(default)]
    pub security_groups: BTreeMap<SecurityGroupRole, SecurityGroupStatus>,
    /// Floating IP allocated for the API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip: Option<FloatingIpRecord>,
}
