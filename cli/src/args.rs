use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "lft",
    about = "Emulate layered network topologies on a Kubernetes cluster"
)]
pub struct Cli {
    #[clap(flatten)]
    pub cluster: ClusterArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug, Clone)]
pub struct ClusterArgs {
    /// Namespace holding the emulated topology
    #[arg(long, env = "LFT_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Path to a kubeconfig file
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Obtain credentials from the local cluster runtime before connecting
    #[arg(long, env = "LFT_GENERATE_KUBECONFIG", default_value_t = false)]
    pub generate_kubeconfig: bool,

    /// Effector family backing the node facades
    #[arg(long, env = "LFT_BACKEND", default_value = "kubernetes")]
    pub backend: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Two hosts on a point-to-point link
    PointToPoint,
    /// Switched LAN behind an SDN controller
    Lan,
    /// One host NATed to the internet through the cluster host
    Internet,
    /// Delete every workload created by the emulator
    Teardown,
}
