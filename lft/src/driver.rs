use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use async_trait::async_trait;
use kube::{
    client::Client,
    config::{KubeConfigOptions, Kubeconfig},
};

use crate::{
    effector::Effector,
    error::Error,
    node::{K8sNode, NodeRole, NodeSpec},
};

/// Which effector family backs the node facades. Chosen once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Kubernetes,
    ContainerRuntime,
}

pub const BACKEND_ENV: &str = "LFT_BACKEND";

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "kubernetes" | "k8s" => Ok(BackendKind::Kubernetes),
            "container-runtime" | "docker" => Ok(BackendKind::ContainerRuntime),
            other => Err(Error::UserInput(format!("unknown backend: {other}"))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Kubernetes => write!(f, "kubernetes"),
            BackendKind::ContainerRuntime => write!(f, "container-runtime"),
        }
    }
}

pub fn backend_from_env() -> Result<BackendKind, Error> {
    match std::env::var(BACKEND_ENV) {
        Ok(value) => value.parse(),
        Err(_) => Ok(BackendKind::Kubernetes),
    }
}

/// The verb surface every backend family presents. The container-runtime
/// twin lives outside this workspace and is specified by these signatures.
#[async_trait]
pub trait NodeFacade: Send + Sync {
    fn logical_name(&self) -> &str;
    fn pod_name(&self) -> &str;
    fn role(&self) -> NodeRole;

    async fn instantiate(&self) -> Result<(), Error>;
    async fn connect(
        &self,
        peer: &dyn NodeFacade,
        interface_name: &str,
        peer_interface_name: &str,
        reconnect: bool,
    ) -> Result<(), Error>;
    async fn set_ip(&self, ip: &str, mask: u8, interface: &str, reconnect: bool)
    -> Result<(), Error>;
    async fn add_route(&self, ip: &str, mask: u8, interface: &str) -> Result<(), Error>;
    async fn set_default_gateway(
        &self,
        gateway_ip: &str,
        interface: &str,
        reconnect: bool,
    ) -> Result<(), Error>;
    async fn connect_to_internet(
        &self,
        ip: &str,
        mask: u8,
        node_iface: &str,
        host_iface: &str,
        reconnect: bool,
    ) -> Result<(), Error>;
    async fn set_controller(
        &self,
        controller_ip: &str,
        controller_port: u16,
        protocol: &str,
        reconnect: bool,
    ) -> Result<(), Error>;
    async fn init_controller(
        &self,
        ip: Option<&str>,
        port: u16,
        app_path: &str,
        reconnect: bool,
    ) -> Result<(), Error>;
    async fn run(&self, command: &str) -> Result<String, Error>;
    async fn get_ip(&self) -> Result<String, Error>;
}

#[async_trait]
impl NodeFacade for K8sNode {
    fn logical_name(&self) -> &str {
        K8sNode::logical_name(self)
    }

    fn pod_name(&self) -> &str {
        K8sNode::pod_name(self)
    }

    fn role(&self) -> NodeRole {
        K8sNode::role(self)
    }

    async fn instantiate(&self) -> Result<(), Error> {
        K8sNode::instantiate(self).await
    }

    async fn connect(
        &self,
        peer: &dyn NodeFacade,
        interface_name: &str,
        peer_interface_name: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        K8sNode::connect(self, peer, interface_name, peer_interface_name, reconnect).await
    }

    async fn set_ip(
        &self,
        ip: &str,
        mask: u8,
        interface: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        K8sNode::set_ip(self, ip, mask, interface, reconnect).await
    }

    async fn add_route(&self, ip: &str, mask: u8, interface: &str) -> Result<(), Error> {
        K8sNode::add_route(self, ip, mask, interface).await
    }

    async fn set_default_gateway(
        &self,
        gateway_ip: &str,
        interface: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        K8sNode::set_default_gateway(self, gateway_ip, interface, reconnect).await
    }

    async fn connect_to_internet(
        &self,
        ip: &str,
        mask: u8,
        node_iface: &str,
        host_iface: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        K8sNode::connect_to_internet(self, ip, mask, node_iface, host_iface, reconnect).await
    }

    async fn set_controller(
        &self,
        controller_ip: &str,
        controller_port: u16,
        protocol: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        K8sNode::set_controller(self, controller_ip, controller_port, protocol, reconnect).await
    }

    async fn init_controller(
        &self,
        ip: Option<&str>,
        port: u16,
        app_path: &str,
        reconnect: bool,
    ) -> Result<(), Error> {
        K8sNode::init_controller(self, ip, port, app_path, reconnect).await
    }

    async fn run(&self, command: &str) -> Result<String, Error> {
        K8sNode::run(self, command).await
    }

    async fn get_ip(&self) -> Result<String, Error> {
        K8sNode::get_ip(self).await
    }
}

/// How to reach the cluster.
#[derive(Clone, Debug)]
pub struct ClusterOptions {
    pub namespace: String,
    pub kubeconfig: Option<PathBuf>,
    /// Obtain credentials from the local cluster runtime before connecting.
    pub generate_credentials: bool,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            kubeconfig: None,
            generate_credentials: false,
        }
    }
}

/// Hands out node facades for the selected backend family.
pub struct Driver {
    client: Client,
    namespace: String,
}

impl Driver {
    pub async fn select(kind: BackendKind, options: ClusterOptions) -> Result<Self, Error> {
        match kind {
            BackendKind::Kubernetes => Self::kubernetes(options).await,
            BackendKind::ContainerRuntime => Err(Error::UnsupportedBackend(
                "the container-runtime family ships separately; only kubernetes is built in"
                    .to_string(),
            )),
        }
    }

    pub async fn kubernetes(options: ClusterOptions) -> Result<Self, Error> {
        let client = build_client(&options).await?;
        Ok(Self {
            client,
            namespace: options.namespace,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn host(&self, name: &str) -> Arc<K8sNode> {
        self.node(name, NodeRole::Host)
    }

    pub fn switch(&self, name: &str) -> Arc<K8sNode> {
        self.node(name, NodeRole::Switch)
    }

    pub fn controller(&self, name: &str) -> Arc<K8sNode> {
        self.node(name, NodeRole::Controller)
    }

    fn node(&self, name: &str, role: NodeRole) -> Arc<K8sNode> {
        let spec = NodeSpec {
            namespace: self.namespace.clone(),
            ..NodeSpec::for_role(role)
        };
        K8sNode::with_spec(&self.client, name, role, spec)
    }
}

async fn build_client(options: &ClusterOptions) -> Result<Client, Error> {
    if options.generate_credentials {
        let path = options
            .kubeconfig
            .clone()
            .unwrap_or_else(|| PathBuf::from("kubeconfig"));
        Effector::generate_cluster_credentials(&path).await?;
        return load_kubeconfig(&path).await;
    }
    if let Some(path) = &options.kubeconfig {
        return load_kubeconfig(path).await;
    }
    Ok(Client::try_default().await?)
}

async fn load_kubeconfig(path: &Path) -> Result<Client, Error> {
    let kubeconfig = Kubeconfig::read_from(path)
        .map_err(|e| Error::UserInput(format!("failed to read kubeconfig {}: {e}", path.display())))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::UserInput(format!("invalid kubeconfig {}: {e}", path.display())))?;
    Ok(Client::try_from(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_both_families() {
        assert_eq!("kubernetes".parse::<BackendKind>().unwrap(), BackendKind::Kubernetes);
        assert_eq!("K8S".parse::<BackendKind>().unwrap(), BackendKind::Kubernetes);
        assert_eq!(
            "docker".parse::<BackendKind>().unwrap(),
            BackendKind::ContainerRuntime,
        );
        assert_eq!(
            "container-runtime".parse::<BackendKind>().unwrap(),
            BackendKind::ContainerRuntime,
        );
        assert!("hyperv".parse::<BackendKind>().is_err());
    }

    #[test]
    fn backend_kind_displays_its_selector_token() {
        assert_eq!(BackendKind::Kubernetes.to_string(), "kubernetes");
        assert_eq!(BackendKind::ContainerRuntime.to_string(), "container-runtime");
    }
}
