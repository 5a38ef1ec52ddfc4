use k8s_openapi::api::core::v1::Pod;
use kube::{Api, client::Client};

use crate::{effector::Effector, error::Error};

/// Resolves a pod name to the host PID of its main container, for network
/// namespace operations. The result can go stale the moment it is returned;
/// callers tolerate the resulting effector failures and lean on the
/// reconciler to converge again.
pub struct IdentityResolver {
    pods: Api<Pod>,
    effector: Effector,
}

impl IdentityResolver {
    pub fn new(client: Client, namespace: &str, effector: Effector) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            effector,
        }
    }

    pub async fn pid_of(&self, pod_name: &str) -> Result<u32, Error> {
        let pod = self.pods.get(pod_name).await?;
        let container_id = pod
            .status
            .as_ref()
            .and_then(|status| status.container_statuses.as_ref())
            .and_then(|statuses| statuses.first())
            .and_then(|status| status.container_id.as_deref())
            .ok_or_else(|| Error::Identity(format!("no container status for pod {pod_name}")))?;
        let container_id = parse_container_id(container_id)?;
        let info = self
            .effector
            .host_run(&format!("microk8s ctr containers info {container_id}"))
            .await?;
        pid_from_container_info(&info)
    }
}

/// Split a `<runtime>://<id>` container reference into its bare id.
pub fn parse_container_id(raw: &str) -> Result<&str, Error> {
    match raw.split_once("://") {
        Some((runtime, id)) if !runtime.is_empty() && !id.is_empty() => Ok(id),
        _ => Err(Error::Identity(format!(
            "unexpected container id format: {raw}"
        ))),
    }
}

/// Pull the PID out of the container runtime's info dump: the first Linux
/// namespace path of the form `/proc/<pid>/ns/...`.
pub fn pid_from_container_info(info: &str) -> Result<u32, Error> {
    let info: serde_json::Value = serde_json::from_str(info)
        .map_err(|e| Error::Identity(format!("container info is not valid json: {e}")))?;
    let namespaces = info
        .pointer("/Spec/linux/namespaces")
        .and_then(|namespaces| namespaces.as_array())
        .ok_or_else(|| Error::Identity("container info lists no namespaces".to_string()))?;
    for namespace in namespaces {
        if let Some(path) = namespace.get("path").and_then(|path| path.as_str())
            && let Some(pid) = pid_from_ns_path(path)
        {
            return Ok(pid);
        }
    }
    Err(Error::Identity(
        "no /proc/<pid>/ns path in container info".to_string(),
    ))
}

fn pid_from_ns_path(path: &str) -> Option<u32> {
    let rest = path.strip_prefix("/proc/")?;
    let (pid, rest) = rest.split_once('/')?;
    if !rest.starts_with("ns/") {
        return None;
    }
    pid.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_containerd_reference() {
        let id = parse_container_id("containerd://3f9a0c41d2").unwrap();
        assert_eq!(id, "3f9a0c41d2");
    }

    #[test]
    fn splits_docker_reference() {
        let id = parse_container_id("docker://abcdef").unwrap();
        assert_eq!(id, "abcdef");
    }

    #[test]
    fn rejects_bare_ids() {
        assert!(parse_container_id("3f9a0c41d2").is_err());
        assert!(parse_container_id("://missing-runtime").is_err());
    }

    #[test]
    fn extracts_pid_from_runtime_info() {
        let info = r#"{
            "ID": "3f9a0c41d2",
            "Spec": {
                "linux": {
                    "namespaces": [
                        {"type": "pid"},
                        {"type": "network", "path": "/proc/42187/ns/net"},
                        {"type": "ipc", "path": "/proc/42187/ns/ipc"}
                    ]
                }
            }
        }"#;
        assert_eq!(pid_from_container_info(info).unwrap(), 42187);
    }

    #[test]
    fn missing_namespace_paths_are_an_error() {
        let info = r#"{"Spec": {"linux": {"namespaces": [{"type": "pid"}]}}}"#;
        assert!(pid_from_container_info(info).is_err());
    }

    #[test]
    fn unrelated_paths_are_ignored() {
        assert_eq!(pid_from_ns_path("/proc/100/ns/net"), Some(100));
        assert_eq!(pid_from_ns_path("/proc/100/cwd"), None);
        assert_eq!(pid_from_ns_path("/sys/fs/cgroup"), None);
    }
}
