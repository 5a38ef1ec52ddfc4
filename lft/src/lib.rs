//! Emulates layered network topologies (hosts, switches, SDN controllers)
//! on a Kubernetes cluster: pods are the endpoints, host-level veth pairs
//! are the links, and a background reconciler replays each node's journaled
//! operations whenever a pod's identity changes.

mod colors;

pub mod driver;
pub mod effector;
pub mod error;
pub mod identity;
pub mod journal;
pub mod node;
pub mod plan;
pub mod watcher;

pub use driver::{BackendKind, ClusterOptions, Driver, NodeFacade, backend_from_env};
pub use effector::Effector;
pub use error::Error;
pub use journal::{Journal, Operation};
pub use node::{K8sNode, NodeRole, NodeSpec};
pub use watcher::Watcher;
