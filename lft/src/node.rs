use std::{collections::BTreeMap, sync::Arc, time::Duration};

use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec},
        core::v1::{
            Capabilities, Container, Pod, PodSpec, PodTemplateSpec, ResourceRequirements,
            SecurityContext,
        },
    },
    apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::LabelSelector},
};
use kube::{Api, api::ObjectMeta, client::Client};
use owo_colors::OwoColorize;

use crate::{
    colors::{FG1, FG2},
    driver::NodeFacade,
    effector::Effector,
    error::Error,
    identity::IdentityResolver,
    journal::{Journal, Operation},
    watcher::Watcher,
};
use lft_common::{MANAGER_NAME, annotations, labels};

/// How long `instantiate` waits for the pod to come up.
const READY_TIMEOUT: Duration = Duration::from_secs(600);
/// How long `init_controller` waits for the daemon's TCP listener.
const LISTENER_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_CONTROLLER_PORT: u16 = 6653;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    Host,
    Switch,
    Controller,
}

impl NodeRole {
    pub fn default_image(&self) -> &'static str {
        match self {
            NodeRole::Host => "nicolaka/netshoot",
            NodeRole::Switch => "gns3/openvswitch",
            NodeRole::Controller => "osrg/ryu",
        }
    }
}

/// Workload knobs for one topology node.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub image: String,
    pub cpu: String,
    pub memory: String,
    pub privileged: bool,
    pub namespace: String,
    pub app: String,
}

impl NodeSpec {
    pub fn for_role(role: NodeRole) -> Self {
        Self {
            image: role.default_image().to_string(),
            cpu: "500m".to_string(),
            memory: "512Mi".to_string(),
            privileged: true,
            namespace: "default".to_string(),
            app: labels::APP_VALUE.to_string(),
        }
    }
}

/// One logical topology node backed by a single-replica StatefulSet whose
/// pod is `<logical_name>-0`. Verbs journal their intent and then drive the
/// effectors; the `reconnect` flag suppresses journaling during replay.
pub struct K8sNode {
    client: Client,
    effector: Effector,
    identity: IdentityResolver,
    journal: Journal,
    role: NodeRole,
    logical_name: String,
    pod_name: String,
    spec: NodeSpec,
}

/// Logical (workload) name behind a pod name.
pub(crate) fn logical_of(pod_name: &str) -> &str {
    pod_name.strip_suffix("-0").unwrap_or(pod_name)
}

pub(crate) fn pod_is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some("Running")
}

fn pod_is_ready(pod: &Pod) -> bool {
    if !pod_is_running(pod) {
        return false;
    }
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

impl K8sNode {
    pub fn host(client: &Client, name: &str) -> Arc<Self> {
        Self::with_spec(client, name, NodeRole::Host, NodeSpec::for_role(NodeRole::Host))
    }

    pub fn switch(client: &Client, name: &str) -> Arc<Self> {
        Self::with_spec(client, name, NodeRole::Switch, NodeSpec::for_role(NodeRole::Switch))
    }

    pub fn controller(client: &Client, name: &str) -> Arc<Self> {
        Self::with_spec(
            client,
            name,
            NodeRole::Controller,
            NodeSpec::for_role(NodeRole::Controller),
        )
    }

    /// Build a node and attach it to the process-wide reconciler. Must run
    /// inside a tokio runtime (the first node spawns the event loop).
    pub fn with_spec(client: &Client, name: &str, role: NodeRole, spec: NodeSpec) -> Arc<Self> {
        let effector = Effector::new(client.clone(), &spec.namespace);
        let node = Arc::new(Self {
            client: client.clone(),
            identity: IdentityResolver::new(client.clone(), &spec.namespace, effector.clone()),
            journal: Journal::new(client.clone(), &spec.namespace, name),
            effector,
            role,
            logical_name: name.to_string(),
            pod_name: format!("{name}-0"),
            spec,
        });
        Watcher::attach(client, &node.spec.namespace, &labels::selector()).register(&node);
        node
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Create the backing workload and block until its pod is Running and
    /// Ready. The workload's existence is the precondition for the journal,
    /// so this verb is not journaled.
    pub async fn instantiate(&self) -> Result<(), Error> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), &self.spec.namespace);
        match api
            .create(&Default::default(), &self.stateful_set_resource())
            .await
        {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 409 => {}
            Err(e) => return Err(e.into()),
        }
        self.wait_until_ready(READY_TIMEOUT).await?;
        if self.role == NodeRole::Switch {
            self.ensure_bridge().await?;
        }
        println!("🌱 {} {}", self.pod_name.color(FG2), "is up".color(FG1));
        Ok(())
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.spec.namespace);
        for _ in 0..timeout.as_secs() {
            match pods.get(&self.pod_name).await {
                Ok(pod) if pod_is_ready(&pod) => return Ok(()),
                Ok(_) => {}
                Err(kube::Error::Api(ae)) if ae.code == 404 => {}
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(Error::ReadinessTimeout {
            pod: self.pod_name.clone(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// StatefulSet manifest giving the node a stable pod identity across
    /// recreations.
    pub fn stateful_set_resource(&self) -> StatefulSet {
        stateful_set_resource(&self.logical_name, &self.spec)
    }

    /// Link this node to `peer` with a fresh veth pair. Both journals get a
    /// mirrored entry (written before any effect) so each side replays its
    /// own half of the link after a recreation.
    pub async fn connect(
        &self,
        peer: &dyn NodeFacade,
        interface_name: &str,
        peer_interface_name: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        if !reconnect {
            Journal::new(
                self.client.clone(),
                &self.spec.namespace,
                peer.logical_name(),
            )
            .append(&Operation::Connect {
                peer: self.pod_name.clone(),
                interface_name: peer_interface_name.to_string(),
                peer_interface_name: interface_name.to_string(),
            })
            .await?;
            self.journal
                .append(&Operation::Connect {
                    peer: peer.pod_name().to_string(),
                    interface_name: interface_name.to_string(),
                    peer_interface_name: peer_interface_name.to_string(),
                })
                .await?;
        }
        self.connect_link(
            peer.pod_name(),
            Some(peer.role()),
            interface_name,
            peer_interface_name,
        )
        .await
    }

    /// Wire the veth pair between this pod and `peer_pod`. With no peer role
    /// (journal replay), the peer's switch port is restored by the peer's
    /// own mirrored entry instead.
    async fn connect_link(
        &self,
        peer_pod: &str,
        peer_role: Option<NodeRole>,
        interface_name: &str,
        peer_interface_name: &str,
    ) -> Result<(), Error> {
        let pid = self.identity.pid_of(&self.pod_name).await?;
        let peer_pid = self.identity.pid_of(peer_pod).await?;
        println!(
            "🔗 {} {} {}",
            format!("{} (pid {})", self.pod_name, pid).color(FG2),
            "<-->".color(FG1),
            format!("{peer_pod} (pid {peer_pid})").color(FG2),
        );

        // Stale names block `ip link add`; clear them everywhere they can
        // linger before recreating the pair.
        for (iface, ns_pid) in [(interface_name, pid), (peer_interface_name, peer_pid)] {
            let _ = self.effector.host_run(&format!("ip link delete {iface}")).await;
            let _ = self
                .effector
                .enter_netns(ns_pid, &format!("ip link delete {iface}"))
                .await;
        }

        self.effector
            .host_run(&format!(
                "ip link add {interface_name} type veth peer name {peer_interface_name}"
            ))
            .await?;
        self.effector
            .host_run(&format!("ip link set {interface_name} netns {pid}"))
            .await?;
        self.effector
            .host_run(&format!("ip link set {peer_interface_name} netns {peer_pid}"))
            .await?;
        self.effector
            .enter_netns(pid, &format!("ip link set {interface_name} up"))
            .await?;
        self.effector
            .enter_netns(peer_pid, &format!("ip link set {peer_interface_name} up"))
            .await?;

        if self.role == NodeRole::Switch {
            self.attach_port(interface_name).await?;
        }
        if peer_role == Some(NodeRole::Switch) {
            self.attach_port_on(peer_pod, logical_of(peer_pod), peer_interface_name)
                .await?;
        }
        Ok(())
    }

    pub async fn set_ip(
        &self,
        ip: &str,
        mask: u8,
        interface: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        if !reconnect {
            self.journal
                .append(&Operation::SetIp {
                    ip: ip.to_string(),
                    mask,
                    interface: interface.to_string(),
                })
                .await?;
        }
        match self
            .effector
            .exec_in_pod(&self.pod_name, &format!("ip addr add {ip}/{mask} dev {interface}"))
            .await
        {
            Ok(_) => {}
            // Replay may find the address already present.
            Err(Error::Effector { .. }) if reconnect => {}
            Err(e) => return Err(e),
        }
        self.effector
            .exec_in_pod(&self.pod_name, &format!("ip link set {interface} up"))
            .await?;
        println!(
            "📬 {} {} {}",
            self.pod_name.color(FG2),
            format!("{ip}/{mask} on").color(FG1),
            interface.color(FG2),
        );
        Ok(())
    }

    /// Static routes are deliberately not journaled; they do not survive a
    /// pod recreation.
    pub async fn add_route(&self, ip: &str, mask: u8, interface: &str) -> Result<(), Error> {
        let pid = self.identity.pid_of(&self.pod_name).await?;
        self.effector
            .enter_netns(pid, &format!("ip route add {ip}/{mask} dev {interface}"))
            .await?;
        Ok(())
    }

    pub async fn set_default_gateway(
        &self,
        gateway_ip: &str,
        interface: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        if !reconnect {
            self.journal
                .append(&Operation::SetDefaultGateway {
                    gateway_ip: gateway_ip.to_string(),
                    iface_peer: interface.to_string(),
                })
                .await?;
        }
        let pid = self.identity.pid_of(&self.pod_name).await?;
        // The cluster network plugs in its own default route at pod start.
        let _ = self.effector.enter_netns(pid, "ip route del default").await;
        self.effector
            .enter_netns(
                pid,
                &format!("ip route add default via {gateway_ip} dev {interface}"),
            )
            .await?;
        Ok(())
    }

    /// Give the node an uplink: a veth pair whose far end stays on the host
    /// and carries `ip/mask`, with NAT out of the host's default egress.
    pub async fn connect_to_internet(
        &self,
        ip: &str,
        mask: u8,
        node_iface: &str,
        host_iface: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        if !reconnect {
            self.journal
                .append(&Operation::ConnectToInternet {
                    ip: ip.to_string(),
                    mask,
                    node_iface: node_iface.to_string(),
                    host_iface: host_iface.to_string(),
                })
                .await?;
        }
        let pid = self.identity.pid_of(&self.pod_name).await?;

        for iface in [node_iface, host_iface] {
            let _ = self.effector.host_run(&format!("ip link del {iface}")).await;
        }
        self.effector
            .host_run(&format!("ip link add {node_iface} type veth peer name {host_iface}"))
            .await?;
        self.effector
            .host_run(&format!("ip link set {node_iface} netns {pid}"))
            .await?;
        self.effector
            .enter_netns(pid, &format!("ip link set {node_iface} up"))
            .await?;
        if self.role == NodeRole::Switch {
            self.attach_port(node_iface).await?;
        }
        self.effector
            .host_run(&format!("ip link set {host_iface} up"))
            .await?;
        self.effector
            .host_run(&format!("ip addr add {ip}/{mask} dev {host_iface}"))
            .await?;

        let egress = self
            .effector
            .host_run("ip route show default | awk '{print $5}'")
            .await?;
        let egress = egress.lines().next().unwrap_or("").trim().to_string();
        if egress.is_empty() {
            return Err(Error::UserInput(
                "host has no default route to NAT through".to_string(),
            ));
        }
        self.effector
            .host_run(&format!("iptables -t nat -I POSTROUTING -o {egress} -j MASQUERADE"))
            .await?;
        self.effector
            .host_run(&format!("iptables -A FORWARD -i {host_iface} -o {egress} -j ACCEPT"))
            .await?;
        self.effector
            .host_run(&format!("iptables -A FORWARD -i {egress} -o {host_iface} -j ACCEPT"))
            .await?;
        println!(
            "🌐 {} {} {}",
            self.pod_name.color(FG2),
            "online via".color(FG1),
            format!("{host_iface} -> {egress}").color(FG2),
        );
        Ok(())
    }

    /// Point the switch's bridge at an OpenFlow controller and pin the
    /// fail-mode so the bridge never falls back to standalone learning.
    pub async fn set_controller(
        &self,
        controller_ip: &str,
        controller_port: u16,
        protocol: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        self.require_role(NodeRole::Switch, "set_controller")?;
        if !reconnect {
            self.journal
                .append(&Operation::SetController {
                    controller_ip: controller_ip.to_string(),
                    controller_port,
                    protocol: protocol.to_string(),
                })
                .await?;
        }
        let bridge = &self.logical_name;
        self.effector
            .exec_in_pod(&self.pod_name, &format!("ovs-vsctl del-controller {bridge} || true"))
            .await?;
        self.effector
            .exec_in_pod(
                &self.pod_name,
                &format!("ovs-vsctl set-controller {bridge} {protocol}:{controller_ip}:{controller_port}"),
            )
            .await?;
        self.effector
            .exec_in_pod(&self.pod_name, &format!("ovs-vsctl set-fail-mode {bridge} secure"))
            .await?;
        Ok(())
    }

    /// Launch the SDN controller daemon detached and wait for its TCP
    /// listener. With no `ip` the pod's own address is used; the resolved
    /// value is what gets journaled.
    pub async fn init_controller(
        &self,
        ip: Option<&str>,
        port: u16,
        app_path: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        self.require_role(NodeRole::Controller, "init_controller")?;
        let ip = match ip {
            Some(ip) => ip.to_string(),
            None => self.get_ip().await?,
        };
        if !reconnect {
            self.journal
                .append(&Operation::InitController {
                    ip,
                    port,
                    app_path: app_path.to_string(),
                })
                .await?;
        }
        self.effector
            .exec_in_pod(
                &self.pod_name,
                &format!(
                    "nohup ryu-manager --ofp-tcp-listen-port {port} {app_path} > /tmp/ryu.log 2>&1 &"
                ),
            )
            .await?;
        self.wait_for_listener(port, LISTENER_TIMEOUT).await
    }

    async fn wait_for_listener(&self, port: u16, timeout: Duration) -> Result<(), Error> {
        for _ in 0..timeout.as_secs() {
            if let Ok(out) = self.run("ss -lntp").await
                && out.contains(&port.to_string())
            {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(Error::ReadinessTimeout {
            pod: self.pod_name.clone(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Bring up the OVS bridge backing this switch. Safe to repeat; replay
    /// runs it before every journal entry.
    pub async fn ensure_bridge(&self) -> Result<(), Error> {
        self.require_role(NodeRole::Switch, "ensure_bridge")?;
        if self
            .effector
            .exec_in_pod(&self.pod_name, &format!("ovs-vsctl br-exists {}", self.logical_name))
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.effector
            .exec_in_pod(&self.pod_name, &format!("ovs-vsctl add-br {}", self.logical_name))
            .await?;
        self.effector
            .exec_in_pod(&self.pod_name, &format!("ip link set {} up", self.logical_name))
            .await?;
        Ok(())
    }

    /// Absorb `interface` as a port on this switch's bridge.
    pub async fn attach_port(&self, interface: &str) -> Result<(), Error> {
        self.require_role(NodeRole::Switch, "attach_port")?;
        self.attach_port_on(&self.pod_name, &self.logical_name, interface)
            .await
    }

    async fn attach_port_on(
        &self,
        pod_name: &str,
        bridge: &str,
        interface: &str,
    ) -> Result<(), Error> {
        match self
            .effector
            .exec_in_pod(pod_name, &format!("ovs-vsctl add-port {bridge} {interface}"))
            .await
        {
            Ok(_) => {}
            // The port record survives in the OVS database when only the
            // interface was torn down.
            Err(Error::Effector { .. }) => {}
            Err(e) => return Err(e),
        }
        self.effector
            .exec_in_pod(pod_name, &format!("ip link set {interface} up"))
            .await?;
        Ok(())
    }

    /// Raw command passthrough into the pod's main container.
    pub async fn run(&self, command: &str) -> Result<String, Error> {
        self.effector.exec_in_pod(&self.pod_name, command).await
    }

    pub async fn get_ip(&self) -> Result<String, Error> {
        let out = self.run("hostname -i").await?;
        out.split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::Identity(format!("pod {} reported no address", self.pod_name)))
    }

    /// Delete the backing pod; the StatefulSet recreates it with a fresh
    /// UID, which is what drives the reconciler's replay.
    pub async fn delete_pod(&self) -> Result<(), Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.spec.namespace);
        match pods.delete(&self.pod_name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fixed dispatch used by the reconciler; journaling suppressed.
    pub async fn reapply(&self, operation: &Operation) -> Result<(), Error> {
        match operation {
            Operation::Connect {
                peer,
                interface_name,
                peer_interface_name,
            } => {
                self.connect_link(peer, None, interface_name, peer_interface_name)
                    .await
            }
            Operation::SetIp { ip, mask, interface } => {
                self.set_ip(ip, *mask, interface, true).await
            }
            Operation::SetDefaultGateway { gateway_ip, iface_peer } => {
                self.set_default_gateway(gateway_ip, iface_peer, true).await
            }
            Operation::SetController {
                controller_ip,
                controller_port,
                protocol,
            } => {
                self.set_controller(controller_ip, *controller_port, protocol, true)
                    .await
            }
            Operation::InitController { ip, port, app_path } => {
                self.init_controller(Some(ip), *port, app_path, true).await
            }
            Operation::ConnectToInternet {
                ip,
                mask,
                node_iface,
                host_iface,
            } => {
                self.connect_to_internet(ip, *mask, node_iface, host_iface, true)
                    .await
            }
        }
    }

    fn require_role(&self, role: NodeRole, verb: &str) -> Result<(), Error> {
        if self.role == role {
            Ok(())
        } else {
            Err(Error::UserInput(format!(
                "{verb} on {} requires a {role:?} node",
                self.pod_name
            )))
        }
    }
}

/// The journal annotation is seeded empty so it lives and dies with the
/// workload.
fn stateful_set_resource(logical_name: &str, spec: &NodeSpec) -> StatefulSet {
    let mut pod_labels = BTreeMap::new();
    pod_labels.insert(labels::APP.to_string(), spec.app.clone());

    let security_context = SecurityContext {
        capabilities: Some(Capabilities {
            add: Some(vec!["NET_ADMIN".to_string(), "NET_RAW".to_string()]),
            ..Default::default()
        }),
        privileged: spec.privileged.then_some(true),
        ..Default::default()
    };

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(logical_name.to_string()),
            namespace: Some(spec.namespace.clone()),
            labels: Some(pod_labels.clone()),
            annotations: Some({
                let mut metadata = BTreeMap::new();
                metadata.insert(annotations::OPERATIONS.to_string(), "[]".to_string());
                metadata.insert(annotations::CREATED_BY.to_string(), MANAGER_NAME.to_string());
                metadata
            }),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            service_name: Some(logical_name.to_string()),
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(pod_labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "main".to_string(),
                        image: Some(spec.image.clone()),
                        stdin: Some(true),
                        tty: Some(true),
                        security_context: Some(security_context),
                        resources: Some(ResourceRequirements {
                            limits: Some({
                                let mut limits = BTreeMap::new();
                                limits.insert("cpu".to_string(), Quantity(spec.cpu.clone()));
                                limits.insert("memory".to_string(), Quantity(spec.memory.clone()));
                                limits
                            }),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    restart_policy: Some("Always".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(role: NodeRole) -> StatefulSet {
        stateful_set_resource("s1", &NodeSpec::for_role(role))
    }

    fn main_container(manifest: &StatefulSet) -> &Container {
        &manifest
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0]
    }

    #[test]
    fn logical_name_strips_the_ordinal() {
        assert_eq!(logical_of("h1-0"), "h1");
        assert_eq!(logical_of("s1"), "s1");
    }

    #[test]
    fn workload_is_a_single_replica_with_stable_identity() {
        let manifest = manifest(NodeRole::Switch);
        let spec = manifest.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.service_name.as_deref(), Some("s1"));
        assert_eq!(manifest.metadata.name.as_deref(), Some("s1"));
    }

    #[test]
    fn selector_and_template_carry_the_topology_label() {
        let manifest = manifest(NodeRole::Host);
        let spec = manifest.spec.as_ref().unwrap();
        let expected = Some(&labels::APP_VALUE.to_string());
        assert_eq!(
            spec.selector
                .match_labels
                .as_ref()
                .and_then(|l| l.get(labels::APP)),
            expected,
        );
        assert_eq!(
            spec.template
                .metadata
                .as_ref()
                .and_then(|m| m.labels.as_ref())
                .and_then(|l| l.get(labels::APP)),
            expected,
        );
    }

    #[test]
    fn journal_annotation_is_seeded_empty() {
        let manifest = manifest(NodeRole::Host);
        let metadata = manifest.metadata.annotations.as_ref().unwrap();
        assert_eq!(
            metadata.get(annotations::OPERATIONS).map(String::as_str),
            Some("[]"),
        );
        assert_eq!(
            metadata.get(annotations::CREATED_BY).map(String::as_str),
            Some(MANAGER_NAME),
        );
    }

    #[test]
    fn container_gets_network_capabilities_and_limits() {
        let manifest = manifest(NodeRole::Host);
        let container = main_container(&manifest);
        assert_eq!(container.name, "main");
        assert_eq!(container.stdin, Some(true));
        assert_eq!(container.tty, Some(true));
        let caps = container
            .security_context
            .as_ref()
            .unwrap()
            .capabilities
            .as_ref()
            .unwrap()
            .add
            .as_ref()
            .unwrap();
        assert!(caps.contains(&"NET_ADMIN".to_string()));
        assert!(caps.contains(&"NET_RAW".to_string()));
        let limits = container.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits.get("cpu"), Some(&Quantity("500m".to_string())));
        assert_eq!(limits.get("memory"), Some(&Quantity("512Mi".to_string())));
    }

    #[test]
    fn privilege_flag_is_honored() {
        let privileged = manifest(NodeRole::Switch);
        assert_eq!(
            main_container(&privileged)
                .security_context
                .as_ref()
                .unwrap()
                .privileged,
            Some(true),
        );
        let mut spec = NodeSpec::for_role(NodeRole::Host);
        spec.privileged = false;
        let unprivileged = stateful_set_resource("h1", &spec);
        assert_eq!(
            main_container(&unprivileged)
                .security_context
                .as_ref()
                .unwrap()
                .privileged,
            None,
        );
    }

    #[test]
    fn pods_restart_in_place() {
        let manifest = manifest(NodeRole::Host);
        assert_eq!(
            manifest
                .spec
                .as_ref()
                .unwrap()
                .template
                .spec
                .as_ref()
                .unwrap()
                .restart_policy
                .as_deref(),
            Some("Always"),
        );
    }

    #[test]
    fn roles_pick_their_images() {
        assert_eq!(NodeRole::Host.default_image(), "nicolaka/netshoot");
        assert_eq!(NodeRole::Switch.default_image(), "gns3/openvswitch");
        assert_eq!(NodeRole::Controller.default_image(), "osrg/ryu");
    }
}
