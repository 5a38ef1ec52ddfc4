use std::path::PathBuf;

use anyhow::Result;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{
    Api, ResourceExt,
    api::{DeleteParams, ListParams},
};
use owo_colors::OwoColorize;

use lft::{BackendKind, ClusterOptions, Driver, K8sNode, node::DEFAULT_CONTROLLER_PORT};

use crate::args::ClusterArgs;

async fn driver(args: &ClusterArgs) -> Result<Driver> {
    let kind: BackendKind = args.backend.parse()?;
    let options = ClusterOptions {
        namespace: args.namespace.clone(),
        kubeconfig: args.kubeconfig.clone().map(PathBuf::from),
        generate_credentials: args.generate_kubeconfig,
    };
    Ok(Driver::select(kind, options).await?)
}

/// Scenario: h1 <-> h2 over a single veth pair.
pub async fn run_point_to_point(args: &ClusterArgs) -> Result<()> {
    let driver = driver(args).await?;
    let h1 = driver.host("h1");
    let h2 = driver.host("h2");
    h1.instantiate().await?;
    h2.instantiate().await?;

    h1.connect(h2.as_ref(), "h1-eth0", "h2-eth0", false).await?;
    h1.set_ip("10.0.0.1", 24, "h1-eth0", false).await?;
    h2.set_ip("10.0.0.2", 24, "h2-eth0", false).await?;

    probe(&h1, "ping -c 3 10.0.0.2").await;
    hold().await
}

/// Scenario: h1 and h2 behind OVS switch s1, forwarding decided by a ryu
/// controller on c0.
pub async fn run_lan(args: &ClusterArgs) -> Result<()> {
    let driver = driver(args).await?;
    let c0 = driver.controller("c0");
    let s1 = driver.switch("s1");
    let h1 = driver.host("h1");
    let h2 = driver.host("h2");
    for node in [&c0, &s1, &h1, &h2] {
        node.instantiate().await?;
    }

    c0.init_controller(None, DEFAULT_CONTROLLER_PORT, "ryu.app.simple_switch_13", false)
        .await?;
    let controller_ip = c0.get_ip().await?;
    s1.set_controller(&controller_ip, DEFAULT_CONTROLLER_PORT, "tcp", false)
        .await?;

    h1.connect(s1.as_ref(), "h1-eth0", "s1-eth1", false).await?;
    h2.connect(s1.as_ref(), "h2-eth0", "s1-eth2", false).await?;
    h1.set_ip("10.0.0.1", 24, "h1-eth0", false).await?;
    h2.set_ip("10.0.0.2", 24, "h2-eth0", false).await?;

    probe(&h1, "ping -c 3 10.0.0.2").await;
    hold().await
}

/// Scenario: h1 reaches the internet through a host-side veth end and NAT.
pub async fn run_internet(args: &ClusterArgs) -> Result<()> {
    let driver = driver(args).await?;
    let h1 = driver.host("h1");
    h1.instantiate().await?;

    // The host end of the pair carries the gateway address.
    h1.connect_to_internet("192.168.100.1", 24, "eth1", "h1br", false)
        .await?;
    h1.set_ip("192.168.100.2", 24, "eth1", false).await?;
    h1.set_default_gateway("192.168.100.1", "eth1", false).await?;

    probe(&h1, "curl -s -m 10 -o /dev/null -w '%{http_code}' http://example.com").await;
    hold().await
}

/// Delete every workload the emulator created in the namespace.
pub async fn run_teardown(args: &ClusterArgs) -> Result<()> {
    let driver = driver(args).await?;
    let api: Api<StatefulSet> = Api::namespaced(driver.client().clone(), &args.namespace);
    let selector = lft_common::labels::selector();
    let workloads = api.list(&ListParams::default().labels(&selector)).await?;
    if workloads.items.is_empty() {
        println!("nothing to tear down in '{}'", args.namespace);
        return Ok(());
    }
    for workload in workloads {
        let name = workload.name_any();
        api.delete(&name, &DeleteParams::default()).await?;
        println!("🗑  {} {}", "deleted".red(), name);
    }
    Ok(())
}

async fn probe(node: &K8sNode, command: &str) {
    match node.run(command).await {
        Ok(out) => println!("{}", out.trim().green()),
        Err(e) => eprintln!("{}", format!("probe '{command}' failed: {e}").red()),
    }
}

/// Keep the process (and with it the reconciler) alive so pod recreations
/// heal while the demo runs.
async fn hold() -> Result<()> {
    println!(
        "{}",
        "Topology is up; Ctrl+C to exit (the reconciler keeps it converged)".green()
    );
    lft_common::shutdown::shutdown_signal().await;
    Ok(())
}
