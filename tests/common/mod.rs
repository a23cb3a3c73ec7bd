//! In-memory fake of the remote networking API for scenario tests.
//!
//! The fake enforces the same ordering constraints as the real cloud
//! (a trunk cannot be deleted while subports are attached, a port
//! cannot be deleted while it is a subport) and records every mutating
//! call, so tests can assert idempotency and teardown ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use trellis::cloud::types::{
    Filter, FloatingIp, FloatingIpCreateSpec, FloatingIpState, Network, NetworkCreateSpec, Port,
    PortCreateSpec, ResourceKind, Router, RouterCreateSpec, SecurityGroup,
    SecurityGroupCreateSpec, SecurityGroupRule, SecurityGroupRuleSpec, Subnet, SubnetCreateSpec,
    Subport, Trunk, TrunkCreateSpec,
};
use trellis::cloud::{CloudError, CloudResult, NetworkingApi};

#[derive(Default)]
struct State {
    networks: Vec<Network>,
    subnets: Vec<Subnet>,
    routers: Vec<Router>,
    /// (router id, subnet id) pairs with the synthesized interface port
    router_interfaces: Vec<(String, String, Port)>,
    groups: Vec<SecurityGroup>,
    ports: Vec<Port>,
    trunks: Vec<Trunk>,
    subports: HashMap<String, Vec<Subport>>,
    fips: Vec<FloatingIp>,
}

/// In-memory cloud account.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
    counter: AtomicU32,
    /// Log of every mutating call, in order
    pub mutations: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn log(&self, call: impl Into<String>) {
        self.mutations.lock().unwrap().push(call.into());
    }

    /// Number of mutating calls made so far
    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    /// Seed a pre-existing external network and return its id
    pub fn seed_external_network(&self, name: &str) -> String {
        let id = self.next_id("net");
        self.state.lock().unwrap().networks.push(Network {
            id: id.clone(),
            name: name.to_string(),
            external: true,
            tags: vec![],
        });
        id
    }

    /// Seed a pre-existing network and return its id
    pub fn seed_network(&self, name: &str) -> String {
        let id = self.next_id("net");
        self.state.lock().unwrap().networks.push(Network {
            id: id.clone(),
            name: name.to_string(),
            external: false,
            tags: vec![],
        });
        id
    }

    pub fn network_count(&self) -> usize {
        self.state.lock().unwrap().networks.len()
    }

    pub fn port_count(&self) -> usize {
        self.state.lock().unwrap().ports.len()
    }

    pub fn trunk_count(&self) -> usize {
        self.state.lock().unwrap().trunks.len()
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().unwrap().groups.len()
    }

    /// Attach a subport (with its own underlying port) to the trunk
    pub fn seed_subport(&self, trunk_id: &str, segmentation_id: u32) -> String {
        let port_id = self.next_id("port");
        let mut state = self.state.lock().unwrap();
        state.ports.push(Port {
            id: port_id.clone(),
            name: format!("subport-{segmentation_id}"),
            network_id: String::new(),
            fixed_ips: vec![],
            security_groups: vec![],
            tags: vec![],
        });
        state
            .subports
            .entry(trunk_id.to_string())
            .or_default()
            .push(Subport {
                port_id: port_id.clone(),
                segmentation_type: "vlan".to_string(),
                segmentation_id,
            });
        port_id
    }

    /// Remove one rule from a group, simulating drift or an
    /// interrupted previous run
    pub fn drop_one_rule(&self, group_name: &str) -> SecurityGroupRule {
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.name == group_name)
            .expect("group exists");
        group.rules.pop().expect("group has rules")
    }
}

fn filter_matches(filter: &Filter, id: &str, name: &str, network_id: Option<&str>) -> bool {
    filter.id.as_deref().map_or(true, |v| v == id)
        && filter.name.as_deref().map_or(true, |v| v == name)
        && filter
            .network_id
            .as_deref()
            .map_or(true, |v| Some(v) == network_id)
}

#[async_trait]
impl NetworkingApi for FakeCloud {
    async fn list_networks(&self, filter: &Filter) -> CloudResult<Vec<Network>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .networks
            .iter()
            .filter(|n| filter_matches(filter, &n.id, &n.name, None))
            .cloned()
            .collect())
    }

    async fn create_network(&self, spec: &NetworkCreateSpec) -> CloudResult<Network> {
        self.log("create_network");
        let network = Network {
            id: self.next_id("net"),
            name: spec.name.clone(),
            external: false,
            tags: vec![],
        };
        self.state.lock().unwrap().networks.push(network.clone());
        Ok(network)
    }

    async fn delete_network(&self, id: &str) -> CloudResult<()> {
        self.log("delete_network");
        let mut state = self.state.lock().unwrap();
        if state.subnets.iter().any(|s| s.network_id == id) {
            return Err(CloudError::conflict("network has subnets"));
        }
        let before = state.networks.len();
        state.networks.retain(|n| n.id != id);
        if state.networks.len() == before {
            return Err(CloudError::not_found("no such network"));
        }
        Ok(())
    }

    async fn list_subnets(&self, filter: &Filter) -> CloudResult<Vec<Subnet>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subnets
            .iter()
            .filter(|s| filter_matches(filter, &s.id, &s.name, Some(&s.network_id)))
            .cloned()
            .collect())
    }

    async fn create_subnet(&self, spec: &SubnetCreateSpec) -> CloudResult<Subnet> {
        self.log("create_subnet");
        let subnet = Subnet {
            id: self.next_id("sub"),
            name: spec.name.clone(),
            network_id: spec.network_id.clone(),
            cidr: spec.cidr.clone(),
            tags: vec![],
        };
        self.state.lock().unwrap().subnets.push(subnet.clone());
        Ok(subnet)
    }

    async fn delete_subnet(&self, id: &str) -> CloudResult<()> {
        self.log("delete_subnet");
        let mut state = self.state.lock().unwrap();
        if state
            .router_interfaces
            .iter()
            .any(|(_, subnet_id, _)| subnet_id == id)
        {
            return Err(CloudError::conflict("subnet has a router interface"));
        }
        let before = state.subnets.len();
        state.subnets.retain(|s| s.id != id);
        if state.subnets.len() == before {
            return Err(CloudError::not_found("no such subnet"));
        }
        Ok(())
    }

    async fn list_routers(&self, filter: &Filter) -> CloudResult<Vec<Router>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .routers
            .iter()
            .filter(|r| filter_matches(filter, &r.id, &r.name, None))
            .cloned()
            .collect())
    }

    async fn create_router(&self, spec: &RouterCreateSpec) -> CloudResult<Router> {
        self.log("create_router");
        let router = Router {
            id: self.next_id("rtr"),
            name: spec.name.clone(),
            external_network_id: spec.external_network_id.clone(),
            tags: vec![],
        };
        self.state.lock().unwrap().routers.push(router.clone());
        Ok(router)
    }

    async fn delete_router(&self, id: &str) -> CloudResult<()> {
        self.log("delete_router");
        let mut state = self.state.lock().unwrap();
        if state
            .router_interfaces
            .iter()
            .any(|(router_id, _, _)| router_id == id)
        {
            return Err(CloudError::conflict("router has interfaces"));
        }
        let before = state.routers.len();
        state.routers.retain(|r| r.id != id);
        if state.routers.len() == before {
            return Err(CloudError::not_found("no such router"));
        }
        Ok(())
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()> {
        self.log("add_router_interface");
        let mut state = self.state.lock().unwrap();
        if state
            .router_interfaces
            .iter()
            .any(|(r, s, _)| r == router_id && s == subnet_id)
        {
            return Err(CloudError::conflict("interface already attached"));
        }
        let port = Port {
            id: format!("rtrport-{router_id}-{subnet_id}"),
            name: String::new(),
            network_id: String::new(),
            fixed_ips: vec![trellis::cloud::types::FixedIp {
                subnet_id: Some(subnet_id.to_string()),
                ip_address: None,
            }],
            security_groups: vec![],
            tags: vec![],
        };
        state
            .router_interfaces
            .push((router_id.to_string(), subnet_id.to_string(), port));
        Ok(())
    }

    async fn remove_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()> {
        self.log("remove_router_interface");
        let mut state = self.state.lock().unwrap();
        let before = state.router_interfaces.len();
        state
            .router_interfaces
            .retain(|(r, s, _)| !(r == router_id && s == subnet_id));
        if state.router_interfaces.len() == before {
            return Err(CloudError::not_found("no such interface"));
        }
        Ok(())
    }

    async fn list_router_interface_ports(&self, router_id: &str) -> CloudResult<Vec<Port>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .router_interfaces
            .iter()
            .filter(|(r, _, _)| r == router_id)
            .map(|(_, _, port)| port.clone())
            .collect())
    }

    async fn list_security_groups(&self, filter: &Filter) -> CloudResult<Vec<SecurityGroup>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .groups
            .iter()
            .filter(|g| filter_matches(filter, &g.id, &g.name, None))
            .cloned()
            .collect())
    }

    async fn create_security_group(
        &self,
        spec: &SecurityGroupCreateSpec,
    ) -> CloudResult<SecurityGroup> {
        self.log("create_security_group");
        let group = SecurityGroup {
            id: self.next_id("sg"),
            name: spec.name.clone(),
            rules: vec![],
            tags: vec![],
        };
        self.state.lock().unwrap().groups.push(group.clone());
        Ok(group)
    }

    async fn delete_security_group(&self, id: &str) -> CloudResult<()> {
        self.log("delete_security_group");
        let mut state = self.state.lock().unwrap();
        let before = state.groups.len();
        state.groups.retain(|g| g.id != id);
        if state.groups.len() == before {
            return Err(CloudError::not_found("no such security group"));
        }
        Ok(())
    }

    async fn create_security_group_rule(
        &self,
        group_id: &str,
        rule: &SecurityGroupRuleSpec,
    ) -> CloudResult<SecurityGroupRule> {
        self.log("create_security_group_rule");
        let created = SecurityGroupRule {
            id: self.next_id("rule"),
            direction: rule.direction,
            ether_type: rule.ether_type,
            protocol: rule.protocol.clone(),
            port_range_min: rule.port_range_min,
            port_range_max: rule.port_range_max,
            remote_group_id: rule.remote_group_id.clone(),
            remote_ip_prefix: rule.remote_ip_prefix.clone(),
            description: rule.description.clone(),
        };
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| CloudError::not_found("no such security group"))?;
        group.rules.push(created.clone());
        Ok(created)
    }

    async fn delete_security_group_rule(&self, rule_id: &str) -> CloudResult<()> {
        self.log("delete_security_group_rule");
        let mut state = self.state.lock().unwrap();
        for group in &mut state.groups {
            let before = group.rules.len();
            group.rules.retain(|r| r.id != rule_id);
            if group.rules.len() != before {
                return Ok(());
            }
        }
        Err(CloudError::not_found("no such rule"))
    }

    async fn get_port(&self, id: &str) -> CloudResult<Port> {
        let state = self.state.lock().unwrap();
        state
            .ports
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("no such port"))
    }

    async fn list_ports(&self, filter: &Filter) -> CloudResult<Vec<Port>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ports
            .iter()
            .filter(|p| filter_matches(filter, &p.id, &p.name, Some(&p.network_id)))
            .cloned()
            .collect())
    }

    async fn create_port(&self, spec: &PortCreateSpec) -> CloudResult<Port> {
        self.log("create_port");
        let port = Port {
            id: self.next_id("port"),
            name: spec.name.clone(),
            network_id: spec.network_id.clone(),
            fixed_ips: spec.fixed_ips.clone(),
            security_groups: spec.security_groups.clone(),
            tags: vec![],
        };
        self.state.lock().unwrap().ports.push(port.clone());
        Ok(port)
    }

    async fn delete_port(&self, id: &str) -> CloudResult<()> {
        self.log(format!("delete_port:{id}"));
        let mut state = self.state.lock().unwrap();
        if state
            .subports
            .values()
            .any(|subports| subports.iter().any(|sp| sp.port_id == id))
        {
            return Err(CloudError::conflict("port is attached as a subport"));
        }
        if state.trunks.iter().any(|t| t.port_id == id) {
            return Err(CloudError::conflict("port carries a trunk"));
        }
        let before = state.ports.len();
        state.ports.retain(|p| p.id != id);
        if state.ports.len() == before {
            return Err(CloudError::not_found("no such port"));
        }
        Ok(())
    }

    async fn find_floating_ip(&self, address: &str) -> CloudResult<Option<FloatingIp>> {
        let state = self.state.lock().unwrap();
        Ok(state.fips.iter().find(|f| f.address == address).cloned())
    }

    async fn get_floating_ip(&self, id: &str) -> CloudResult<FloatingIp> {
        let state = self.state.lock().unwrap();
        state
            .fips
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("no such floating IP"))
    }

    async fn create_floating_ip(&self, spec: &FloatingIpCreateSpec) -> CloudResult<FloatingIp> {
        self.log("create_floating_ip");
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let fip = FloatingIp {
            id: format!("fip-{n}"),
            address: spec
                .address
                .clone()
                .unwrap_or_else(|| format!("203.0.113.{n}")),
            port_id: None,
            status: FloatingIpState::Down,
        };
        self.state.lock().unwrap().fips.push(fip.clone());
        Ok(fip)
    }

    async fn update_floating_ip_port<'a>(
        &self,
        id: &str,
        port_id: Option<&'a str>,
    ) -> CloudResult<FloatingIp> {
        self.log("update_floating_ip_port");
        let mut state = self.state.lock().unwrap();
        let fip = state
            .fips
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CloudError::not_found("no such floating IP"))?;
        fip.port_id = port_id.map(str::to_string);
        // The remote side flips the status once the binding settles;
        // the fake settles instantly so the next poll observes it.
        fip.status = if port_id.is_some() {
            FloatingIpState::Active
        } else {
            FloatingIpState::Down
        };
        Ok(fip.clone())
    }

    async fn delete_floating_ip(&self, id: &str) -> CloudResult<()> {
        self.log("delete_floating_ip");
        let mut state = self.state.lock().unwrap();
        let before = state.fips.len();
        state.fips.retain(|f| f.id != id);
        if state.fips.len() == before {
            return Err(CloudError::not_found("no such floating IP"));
        }
        Ok(())
    }

    async fn find_trunk_by_port(&self, port_id: &str) -> CloudResult<Option<Trunk>> {
        let state = self.state.lock().unwrap();
        Ok(state.trunks.iter().find(|t| t.port_id == port_id).cloned())
    }

    async fn list_trunks(&self, filter: &Filter) -> CloudResult<Vec<Trunk>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .trunks
            .iter()
            .filter(|t| filter_matches(filter, &t.id, &t.name, None))
            .cloned()
            .collect())
    }

    async fn create_trunk(&self, spec: &TrunkCreateSpec) -> CloudResult<Trunk> {
        self.log("create_trunk");
        let trunk = Trunk {
            id: self.next_id("trunk"),
            name: spec.name.clone(),
            port_id: spec.port_id.clone(),
            tags: vec![],
        };
        self.state.lock().unwrap().trunks.push(trunk.clone());
        Ok(trunk)
    }

    async fn delete_trunk(&self, id: &str) -> CloudResult<()> {
        self.log("delete_trunk");
        let mut state = self.state.lock().unwrap();
        if state.subports.get(id).is_some_and(|s| !s.is_empty()) {
            return Err(CloudError::conflict("trunk has subports"));
        }
        let before = state.trunks.len();
        state.trunks.retain(|t| t.id != id);
        if state.trunks.len() == before {
            return Err(CloudError::not_found("no such trunk"));
        }
        Ok(())
    }

    async fn list_subports(&self, trunk_id: &str) -> CloudResult<Vec<Subport>> {
        let state = self.state.lock().unwrap();
        Ok(state.subports.get(trunk_id).cloned().unwrap_or_default())
    }

    async fn remove_subports(&self, trunk_id: &str, subports: &[Subport]) -> CloudResult<()> {
        self.log("remove_subports");
        let mut state = self.state.lock().unwrap();
        let attached = state
            .subports
            .get_mut(trunk_id)
            .ok_or_else(|| CloudError::not_found("no such trunk"))?;
        attached.retain(|sp| !subports.iter().any(|r| r.port_id == sp.port_id));
        Ok(())
    }

    async fn replace_tags(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        tags: &[String],
    ) -> CloudResult<()> {
        self.log(format!("replace_tags:{kind}"));
        let mut state = self.state.lock().unwrap();
        let slot = match kind {
            ResourceKind::Network => state
                .networks
                .iter_mut()
                .find(|n| n.id == resource_id)
                .map(|n| &mut n.tags),
            ResourceKind::Subnet => state
                .subnets
                .iter_mut()
                .find(|s| s.id == resource_id)
                .map(|s| &mut s.tags),
            ResourceKind::Router => state
                .routers
                .iter_mut()
                .find(|r| r.id == resource_id)
                .map(|r| &mut r.tags),
            ResourceKind::SecurityGroup => state
                .groups
                .iter_mut()
                .find(|g| g.id == resource_id)
                .map(|g| &mut g.tags),
            ResourceKind::Port => state
                .ports
                .iter_mut()
                .find(|p| p.id == resource_id)
                .map(|p| &mut p.tags),
            ResourceKind::Trunk => state
                .trunks
                .iter_mut()
                .find(|t| t.id == resource_id)
                .map(|t| &mut t.tags),
            ResourceKind::FloatingIp => return Ok(()),
        };
        match slot {
            Some(slot) => {
                *slot = tags.to_vec();
                Ok(())
            }
            None => Err(CloudError::not_found("no such resource")),
        }
    }
}
