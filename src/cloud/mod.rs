//! Typed client seam for the remote cloud networking API.
//!
//! The reconciler never speaks HTTP itself; it drives an implementation
//! of [`NetworkingApi`]. Every call is synchronous from the caller's
//! point of view and returns either a result or a [`CloudError`] whose
//! classification ([`CloudErrorKind`]) is assigned by the client
//! implementation, not guessed here. The waiters only ever match on the
//! kind, so the retry/fail-fast boundary is client configuration.

pub mod types;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use self::types::{
    Filter, FloatingIp, FloatingIpCreateSpec, Network, NetworkCreateSpec, Port, PortCreateSpec,
    ResourceKind, Router, RouterCreateSpec, SecurityGroup, SecurityGroupCreateSpec,
    SecurityGroupRule, SecurityGroupRuleSpec, Subnet, SubnetCreateSpec, Subport, Trunk,
    TrunkCreateSpec,
};

/// Classification of a remote call failure.
///
/// Assigned by the client implementation from response metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// The resource does not exist
    NotFound,
    /// The operation conflicts with the resource's current state
    Conflict,
    /// A transient failure worth retrying
    Retryable,
    /// Anything else; never retried locally
    Other,
}

/// A classified failure from the remote networking API.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct CloudError {
    /// Failure classification
    pub kind: CloudErrorKind,
    /// Remote-reported message
    pub message: String,
}

impl CloudError {
    /// Build an error with the given classification
    pub fn new(kind: CloudErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A not-found failure
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::NotFound, message)
    }

    /// A conflict failure
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Conflict, message)
    }

    /// A transient, retryable failure
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Retryable, message)
    }

    /// An unclassified failure
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Other, message)
    }

    /// True if the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind == CloudErrorKind::NotFound
    }

    /// True if the failure is a state conflict
    pub fn is_conflict(&self) -> bool {
        self.kind == CloudErrorKind::Conflict
    }

    /// True if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, CloudErrorKind::Conflict | CloudErrorKind::Retryable)
    }
}

/// Result alias for remote calls
pub type CloudResult<T> = Result<T, CloudError>;

/// The remote cloud networking API consumed by the reconciler.
///
/// Implementations wrap the actual transport and map wire failures onto
/// [`CloudError`] with an honest [`CloudErrorKind`]. All list calls
/// return every match for the filter; disambiguation is the locator's
/// job.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkingApi: Send + Sync {
    // -- networks --

    /// List networks matching the filter
    async fn list_networks(&self, filter: &Filter) -> CloudResult<Vec<Network>>;

    /// Create a network
    async fn create_network(&self, spec: &NetworkCreateSpec) -> CloudResult<Network>;

    /// Delete a network by id
    async fn delete_network(&self, id: &str) -> CloudResult<()>;

    // -- subnets --

    /// List subnets matching the filter
    async fn list_subnets(&self, filter: &Filter) -> CloudResult<Vec<Subnet>>;

    /// Create a subnet
    async fn create_subnet(&self, spec: &SubnetCreateSpec) -> CloudResult<Subnet>;

    /// Delete a subnet by id
    async fn delete_subnet(&self, id: &str) -> CloudResult<()>;

    // -- routers --

    /// List routers matching the filter
    async fn list_routers(&self, filter: &Filter) -> CloudResult<Vec<Router>>;

    /// Create a router
    async fn create_router(&self, spec: &RouterCreateSpec) -> CloudResult<Router>;

    /// Delete a router by id
    async fn delete_router(&self, id: &str) -> CloudResult<()>;

    /// Attach an interface for the subnet to the router
    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()>;

    /// Detach the interface for the subnet from the router
    async fn remove_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()>;

    /// List the router's current interface ports
    async fn list_router_interface_ports(&self, router_id: &str) -> CloudResult<Vec<Port>>;

    // -- security groups --

    /// List security groups matching the filter
    async fn list_security_groups(&self, filter: &Filter) -> CloudResult<Vec<SecurityGroup>>;

    /// Create a security group (empty; rules are reconciled separately)
    async fn create_security_group(
        &self,
        spec: &SecurityGroupCreateSpec,
    ) -> CloudResult<SecurityGroup>;

    /// Delete a security group by id
    async fn delete_security_group(&self, id: &str) -> CloudResult<()>;

    /// Create a rule on the group
    async fn create_security_group_rule(
        &self,
        group_id: &str,
        rule: &SecurityGroupRuleSpec,
    ) -> CloudResult<SecurityGroupRule>;

    /// Delete a rule by id
    async fn delete_security_group_rule(&self, rule_id: &str) -> CloudResult<()>;

    // -- ports --

    /// Fetch a port by id
    async fn get_port(&self, id: &str) -> CloudResult<Port>;

    /// List ports matching the filter
    async fn list_ports(&self, filter: &Filter) -> CloudResult<Vec<Port>>;

    /// Create a port
    async fn create_port(&self, spec: &PortCreateSpec) -> CloudResult<Port>;

    /// Delete a port by id
    async fn delete_port(&self, id: &str) -> CloudResult<()>;

    // -- floating IPs --

    /// Find a floating IP by its address
    async fn find_floating_ip(&self, address: &str) -> CloudResult<Option<FloatingIp>>;

    /// Fetch a floating IP by id
    async fn get_floating_ip(&self, id: &str) -> CloudResult<FloatingIp>;

    /// Allocate a floating IP
    async fn create_floating_ip(&self, spec: &FloatingIpCreateSpec) -> CloudResult<FloatingIp>;

    /// Re-point a floating IP at a port, or clear the binding with `None`
    async fn update_floating_ip_port<'a>(
        &self,
        id: &str,
        port_id: Option<&'a str>,
    ) -> CloudResult<FloatingIp>;

    /// Release a floating IP by id
    async fn delete_floating_ip(&self, id: &str) -> CloudResult<()>;

    // -- trunks --

    /// Find the trunk whose parent is the given port, if any
    async fn find_trunk_by_port(&self, port_id: &str) -> CloudResult<Option<Trunk>>;

    /// List trunks matching the filter
    async fn list_trunks(&self, filter: &Filter) -> CloudResult<Vec<Trunk>>;

    /// Create a trunk on a parent port
    async fn create_trunk(&self, spec: &TrunkCreateSpec) -> CloudResult<Trunk>;

    /// Delete a trunk by id
    async fn delete_trunk(&self, id: &str) -> CloudResult<()>;

    /// List the subports attached to a trunk
    async fn list_subports(&self, trunk_id: &str) -> CloudResult<Vec<Subport>>;

    /// Detach the given subports from the trunk in one batched call
    async fn remove_subports(&self, trunk_id: &str, subports: &[Subport]) -> CloudResult<()>;

    // -- tags --

    /// Replace the full tag set on a taggable resource
    async fn replace_tags(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        tags: &[String],
    ) -> CloudResult<()>;
}
