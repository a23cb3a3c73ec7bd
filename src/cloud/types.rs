//! Resource model for the remote networking API.
//!
//! These are the typed shapes the reconciler exchanges with the cloud:
//! observed resources (as returned by list/get), and per-kind create
//! specs (flat structs listing every optional field, one per kind).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of networking resources managed by the reconciler.
///
/// This is a closed set: it doubles as the allow-list for tag
/// replacement, so an unknown taggable kind is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Virtual network
    Network,
    /// Subnet on a network
    Subnet,
    /// Router with optional external gateway
    Router,
    /// Security group
    SecurityGroup,
    /// Network port
    Port,
    /// Port trunk
    Trunk,
    /// Floating IP
    FloatingIp,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Subnet => write!(f, "subnet"),
            Self::Router => write!(f, "router"),
            Self::SecurityGroup => write!(f, "security group"),
            Self::Port => write!(f, "port"),
            Self::Trunk => write!(f, "trunk"),
            Self::FloatingIp => write!(f, "floating IP"),
        }
    }
}

/// Lookup filter for locating a resource.
///
/// At least one field must be set; an empty filter is rejected by the
/// locator as a configuration error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Match on the resource id
    pub id: Option<String>,
    /// Match on the exact resource name
    pub name: Option<String>,
    /// Restrict to resources on this network (subnets, ports)
    pub network_id: Option<String>,
}

impl Filter {
    /// Filter by exact name
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Filter by resource id
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Restrict the filter to a network
    pub fn on_network(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = Some(network_id.into());
        self
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.network_id.is_none()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref id) = self.id {
            parts.push(format!("id={id}"));
        }
        if let Some(ref name) = self.name {
            parts.push(format!("name={name}"));
        }
        if let Some(ref network_id) = self.network_id {
            parts.push(format!("network={network_id}"));
        }
        if parts.is_empty() {
            write!(f, "<empty>")
        } else {
            write!(f, "{}", parts.join(","))
        }
    }
}

/// Identity of a named resource as observed in the cloud account.
///
/// The id is authoritative once assigned; the name is only used for
/// lookup before an id is known.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRef {
    /// Cloud-assigned resource id
    pub id: String,
    /// Resource name
    pub name: String,
    /// Tags currently on the resource
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A virtual network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// Cloud-assigned id
    pub id: String,
    /// Network name
    pub name: String,
    /// Whether the network is an external (provider) network
    #[serde(default)]
    pub external: bool,
    /// Tags on the network
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Network {
    /// Identity of this network
    pub fn as_ref(&self) -> NetworkRef {
        NetworkRef {
            id: self.id.clone(),
            name: self.name.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Create spec for a virtual network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCreateSpec {
    /// Network name
    pub name: String,
    /// Administrative up/down state
    pub admin_state_up: bool,
    /// Human-readable description
    pub description: String,
}

/// A subnet on a network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    /// Cloud-assigned id
    pub id: String,
    /// Subnet name
    pub name: String,
    /// Owning network id
    pub network_id: String,
    /// CIDR of the subnet
    pub cidr: String,
    /// Tags on the subnet
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Create spec for a subnet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetCreateSpec {
    /// Subnet name
    pub name: String,
    /// Owning network id
    pub network_id: String,
    /// CIDR to allocate
    pub cidr: String,
    /// DNS nameservers handed out to ports on this subnet
    pub dns_nameservers: Vec<String>,
    /// Human-readable description
    pub description: String,
}

/// A router.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Router {
    /// Cloud-assigned id
    pub id: String,
    /// Router name
    pub name: String,
    /// Network id of the external gateway, if one is set
    pub external_network_id: Option<String>,
    /// Tags on the router
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Create spec for a router.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterCreateSpec {
    /// Router name
    pub name: String,
    /// External gateway network id
    pub external_network_id: Option<String>,
    /// Human-readable description
    pub description: String,
}

/// Direction of a security group rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic entering the group
    Ingress,
    /// Traffic leaving the group
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => write!(f, "ingress"),
            Self::Egress => write!(f, "egress"),
        }
    }
}

/// Ethernet type a rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EtherType {
    /// IPv4 traffic
    #[serde(rename = "IPv4")]
    IPv4,
    /// IPv6 traffic
    #[serde(rename = "IPv6")]
    IPv6,
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IPv4 => write!(f, "IPv4"),
            Self::IPv6 => write!(f, "IPv6"),
        }
    }
}

/// A security group rule as observed on the remote side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// Cloud-assigned rule id; never part of rule equality
    pub id: String,
    /// Traffic direction
    pub direction: Direction,
    /// Ethernet type
    pub ether_type: EtherType,
    /// IP protocol ("tcp", "udp", "icmp", ...); `None` means all
    pub protocol: Option<String>,
    /// Lower bound of the port range
    pub port_range_min: Option<u16>,
    /// Upper bound of the port range
    pub port_range_max: Option<u16>,
    /// Remote security group the rule applies to
    pub remote_group_id: Option<String>,
    /// Remote CIDR the rule applies to
    pub remote_ip_prefix: Option<String>,
    /// Human-readable description
    pub description: String,
}

/// Wire-level create spec for a security group rule.
///
/// This is the resolved form: any `self` remote reference has already
/// been replaced with the owning group's id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRuleSpec {
    /// Traffic direction
    pub direction: Direction,
    /// Ethernet type
    pub ether_type: EtherType,
    /// IP protocol; `None` means all
    pub protocol: Option<String>,
    /// Lower bound of the port range
    pub port_range_min: Option<u16>,
    /// Upper bound of the port range
    pub port_range_max: Option<u16>,
    /// Remote security group id
    pub remote_group_id: Option<String>,
    /// Remote CIDR
    pub remote_ip_prefix: Option<String>,
    /// Human-readable description
    pub description: String,
}

impl SecurityGroupRuleSpec {
    /// Semantic equality against an observed rule.
    ///
    /// Compares every field except the observed rule's id.
    pub fn matches(&self, observed: &SecurityGroupRule) -> bool {
        self.direction == observed.direction
            && self.ether_type == observed.ether_type
            && self.protocol == observed.protocol
            && self.port_range_min == observed.port_range_min
            && self.port_range_max == observed.port_range_max
            && self.remote_group_id == observed.remote_group_id
            && self.remote_ip_prefix == observed.remote_ip_prefix
            && self.description == observed.description
    }
}

/// A security group with its current rule set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Cloud-assigned id
    pub id: String,
    /// Group name
    pub name: String,
    /// Rules currently on the group
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
    /// Tags on the group
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Create spec for a security group.
///
/// Groups are created empty; rules are reconciled separately so that
/// cross-group remote references can be resolved first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupCreateSpec {
    /// Group name
    pub name: String,
    /// Human-readable description
    pub description: String,
}

/// A fixed IP binding on a port.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedIp {
    /// Subnet the address is drawn from
    pub subnet_id: Option<String>,
    /// Explicit address, if requested
    pub ip_address: Option<String>,
}

/// A network port.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Cloud-assigned id
    pub id: String,
    /// Port name
    pub name: String,
    /// Owning network id
    pub network_id: String,
    /// Fixed IP bindings
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    /// Security group ids applied to the port
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Tags on the port
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Create spec for a port.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortCreateSpec {
    /// Port name
    pub name: String,
    /// Network to create the port on
    pub network_id: String,
    /// Fixed IP bindings to request
    pub fixed_ips: Vec<FixedIp>,
    /// Security group ids to apply
    pub security_groups: Vec<String>,
    /// Human-readable description
    pub description: String,
}

/// A port trunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trunk {
    /// Cloud-assigned id
    pub id: String,
    /// Trunk name
    pub name: String,
    /// Parent port id
    pub port_id: String,
    /// Tags on the trunk
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Create spec for a trunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrunkCreateSpec {
    /// Trunk name
    pub name: String,
    /// Parent port id
    pub port_id: String,
    /// Human-readable description
    pub description: String,
}

/// A subport attached to a trunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subport {
    /// Underlying port id
    pub port_id: String,
    /// Segmentation type ("vlan"); carried opaquely
    pub segmentation_type: String,
    /// Segmentation id; carried opaquely
    pub segmentation_id: u32,
}

/// Status of a floating IP, driven entirely by the remote side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FloatingIpState {
    /// Not associated with any port
    Down,
    /// Associated and passing traffic
    Active,
    /// Remote-side error state
    Error,
    /// Any other status string the remote may report
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for FloatingIpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => write!(f, "DOWN"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Error => write!(f, "ERROR"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A floating IP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatingIp {
    /// Cloud-assigned id
    pub id: String,
    /// The publicly routable address
    pub address: String,
    /// Port the address is bound to, if any
    pub port_id: Option<String>,
    /// Remote-reported status
    pub status: FloatingIpState,
}

/// Create spec for a floating IP.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatingIpCreateSpec {
    /// External network to allocate from
    pub network_id: String,
    /// Specific address to request, if any
    pub address: Option<String>,
    /// Human-readable description
    pub description: String,
}

/// Normalize a tag set: dedupe and sort deterministically.
///
/// Stable output avoids spurious diffs across runs.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
