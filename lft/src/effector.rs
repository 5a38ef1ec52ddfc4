use std::path::Path;

use k8s_openapi::{api::core::v1::Pod, apimachinery::pkg::apis::meta::v1::Status};
use kube::{Api, api::AttachParams, client::Client};
use tokio::io::AsyncReadExt;

use crate::error::Error;

/// Executes one primitive against the cluster or the host. Stateless and
/// retry-free; idempotence belongs to the caller.
#[derive(Clone)]
pub struct Effector {
    pods: Api<Pod>,
}

impl Effector {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
        }
    }

    /// Run a shell command in the pod's main container and return the
    /// combined output. A non-zero exit becomes an effector error with the
    /// recovered exit code.
    pub async fn exec_in_pod(&self, pod_name: &str, command: &str) -> Result<String, Error> {
        let params = AttachParams::default().stdout(true).stderr(true);
        let mut attached = self
            .pods
            .exec(pod_name, ["/bin/bash", "-c", command], &params)
            .await?;

        let mut stdout_reader = attached.stdout();
        let mut stderr_reader = attached.stderr();
        let status_fut = attached.take_status();

        let mut out = String::new();
        let mut err = String::new();
        tokio::join!(
            async {
                if let Some(reader) = stdout_reader.as_mut() {
                    let _ = reader.read_to_string(&mut out).await;
                }
            },
            async {
                if let Some(reader) = stderr_reader.as_mut() {
                    let _ = reader.read_to_string(&mut err).await;
                }
            },
        );

        let status = match status_fut {
            Some(status) => status.await,
            None => None,
        };
        let _ = attached.join().await;

        if let Some(status) = status
            && let Some(rc) = command_exit_code(&status)
        {
            let stderr = if err.is_empty() {
                status.message.unwrap_or_default()
            } else {
                err
            };
            return Err(Error::Effector { stderr, rc });
        }

        out.push_str(&err);
        Ok(out)
    }

    /// Run a shell command on the host.
    pub async fn host_run(&self, command: &str) -> Result<String, Error> {
        host_command(command).await
    }

    /// Run a command inside the process-scoped network namespace of `pid`.
    pub async fn enter_netns(&self, pid: u32, command: &str) -> Result<String, Error> {
        host_command(&format!("nsenter -t {pid} -n {command}")).await
    }

    /// Obtain apiserver credentials from the local cluster runtime. Needed
    /// before any client exists, hence no receiver.
    pub async fn generate_cluster_credentials(path: &Path) -> Result<(), Error> {
        let kubeconfig = host_command("microk8s config").await?;
        tokio::fs::write(path, kubeconfig).await?;
        Ok(())
    }
}

async fn host_command(command: &str) -> Result<String, Error> {
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await?;
    if !output.status.success() {
        return Err(Error::Effector {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            rc: output.status.code().unwrap_or(-1),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Exit code of a failed exec, recovered from the `NonZeroExitCode` status
/// the apiserver sends back over the exec channel.
fn command_exit_code(status: &Status) -> Option<i32> {
    if status.status.as_deref() != Some("Failure") {
        return None;
    }
    let rc = status
        .details
        .as_ref()
        .and_then(|details| details.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|cause| cause.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|cause| cause.message.as_deref())
        .and_then(|message| message.parse().ok())
        .unwrap_or(-1);
    Some(rc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};

    fn failure(exit_code: &str) -> Status {
        Status {
            status: Some("Failure".to_string()),
            reason: Some("NonZeroExitCode".to_string()),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".to_string()),
                    message: Some(exit_code.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn success_status_is_not_a_failure() {
        let status = Status {
            status: Some("Success".to_string()),
            ..Default::default()
        };
        assert_eq!(command_exit_code(&status), None);
    }

    #[test]
    fn exit_code_recovered_from_causes() {
        assert_eq!(command_exit_code(&failure("2")), Some(2));
    }

    #[test]
    fn unparseable_exit_code_falls_back() {
        assert_eq!(command_exit_code(&failure("boom")), Some(-1));
    }
}
