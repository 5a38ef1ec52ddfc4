use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, ResourceExt,
    client::Client,
    runtime::watcher::{self, Event},
};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::{
    colors::{FG1, FG2},
    error::Error,
    node::{K8sNode, NodeRole, pod_is_running},
    plan::{self, Observation, TrackingRecord},
};

/// How long a dirty pod gets to reach Running before replay moves on to the
/// next one (its flag stays set for the next event).
const REPLAY_RUNNING_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause before rebuilding a failed event stream.
const STREAM_BACKOFF: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Server-side watch timeout; the stream is rebuilt when it lapses.
const WATCH_TIMEOUT_SECS: u32 = 60;

static WATCHER: OnceLock<Watcher> = OnceLock::new();

/// Process-wide topology reconciler. Watches the pod event stream for the
/// topology label, detects pod identity changes, and replays each node's
/// journal in dependency order: switches carry bridges and controller
/// bindings, so they come back before anything reconnects to them.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    namespace: String,
    label_selector: String,
    registry: Mutex<HashMap<String, Arc<K8sNode>>>,
    records: Mutex<Vec<TrackingRecord>>,
    stop: CancellationToken,
}

impl Watcher {
    /// Return the singleton, spawning the event loop on first call. Later
    /// calls get the existing instance; a second loop is never started.
    pub fn attach(client: &Client, namespace: &str, label_selector: &str) -> Watcher {
        WATCHER
            .get_or_init(|| {
                let inner = Arc::new(Inner {
                    client: client.clone(),
                    namespace: namespace.to_string(),
                    label_selector: label_selector.to_string(),
                    registry: Mutex::new(HashMap::new()),
                    records: Mutex::new(Vec::new()),
                    stop: CancellationToken::new(),
                });
                tokio::spawn(inner.clone().watch_loop());
                Watcher { inner }
            })
            .clone()
    }

    /// Register a facade for replay dispatch, keyed by pod name.
    pub fn register(&self, node: &Arc<K8sNode>) {
        self.inner
            .registry
            .lock()
            .unwrap()
            .insert(node.pod_name().to_string(), node.clone());
    }

    /// Stop the event loop. In-flight effector calls run to completion.
    pub fn stop(&self) {
        self.inner.stop.cancel();
    }
}

impl Inner {
    async fn watch_loop(self: Arc<Self>) {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        println!(
            "👁  {} {} {}",
            "Watching pods".color(FG1),
            self.label_selector.color(FG2),
            format!("in '{}'", self.namespace).color(FG1),
        );
        while !self.stop.is_cancelled() {
            let config = watcher::Config::default()
                .labels(&self.label_selector)
                .timeout(WATCH_TIMEOUT_SECS);
            let stream = watcher::watcher(pods.clone(), config);
            tokio::pin!(stream);
            loop {
                let event = tokio::select! {
                    _ = self.stop.cancelled() => return,
                    event = stream.next() => event,
                };
                match event {
                    Some(Ok(Event::Apply(pod) | Event::InitApply(pod))) => {
                        self.handle_pod(&pods, pod).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let err = Error::Stream(e.to_string());
                        eprintln!("{}", format!("{err}; reconnecting in 2s").red());
                        if stream_error_severs_connection(&e) {
                            // We may have missed recreations; redo everything
                            // once the stream is back.
                            plan::mark_all_dirty(&mut self.records.lock().unwrap());
                        }
                        tokio::time::sleep(STREAM_BACKOFF).await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    async fn handle_pod(&self, pods: &Api<Pod>, pod: Pod) {
        let Some(uid) = pod.metadata.uid.clone() else {
            return;
        };
        let pod_name = pod.name_any();
        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_default();

        let observation = {
            let mut records = self.records.lock().unwrap();
            plan::observe(&mut records, &pod_name, &uid, &phase)
        };
        if observation == Observation::Recreated {
            let count = plan::recreate_count(&self.records.lock().unwrap(), &pod_name);
            println!(
                "♻️  {} {} {}",
                pod_name.color(FG2),
                "was recreated".color(FG1),
                format!("(recreate_count={count}); redoing the whole network").color(FG1),
            );
        }
        let dirty = plan::any_dirty(&self.records.lock().unwrap());
        if dirty {
            self.drive_replay(pods).await;
        }
    }

    fn is_switch(&self, pod_name: &str) -> bool {
        let role = self
            .registry
            .lock()
            .unwrap()
            .get(pod_name)
            .map(|node| node.role());
        plan::role_is_switch(role, pod_name)
    }

    /// Replay phase: dirty switches first in discovery order, then every
    /// non-switch re-marked so port attachment lands on fresh bridges.
    async fn drive_replay(&self, pods: &Api<Pod>) {
        let switches = {
            let records = self.records.lock().unwrap();
            plan::dirty_pods(&records, |name| self.is_switch(name), true)
        };
        if !switches.is_empty() {
            println!(
                "🔁 {} {}",
                "replaying switches first:".color(FG1),
                format!("{switches:?}").color(FG2),
            );
            for pod_name in &switches {
                self.replay_one(pods, pod_name).await;
            }
            let mut records = self.records.lock().unwrap();
            plan::mark_non_switches_dirty(&mut records, |name| self.is_switch(name));
        }
        let others = {
            let records = self.records.lock().unwrap();
            plan::dirty_pods(&records, |name| self.is_switch(name), false)
        };
        for pod_name in &others {
            self.replay_one(pods, pod_name).await;
        }
    }

    async fn replay_one(&self, pods: &Api<Pod>, pod_name: &str) {
        if !self.wait_for_running(pods, pod_name).await {
            eprintln!(
                "{}",
                format!(
                    "pod {pod_name} not Running within {}s; retrying on the next event",
                    REPLAY_RUNNING_TIMEOUT.as_secs()
                )
                .yellow()
            );
            return;
        }
        match self.reapply(pod_name).await {
            Ok(()) => {
                plan::clear_dirty(&mut self.records.lock().unwrap(), pod_name);
            }
            Err(e) => {
                // Flag stays set; the next event retries the whole journal.
                eprintln!("{}", format!("replay failed for {pod_name}: {e}").red());
            }
        }
    }

    async fn wait_for_running(&self, pods: &Api<Pod>, pod_name: &str) -> bool {
        for _ in 0..REPLAY_RUNNING_TIMEOUT.as_secs() {
            if let Ok(pod) = pods.get(pod_name).await
                && pod_is_running(&pod)
            {
                return true;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        false
    }

    async fn reapply(&self, pod_name: &str) -> Result<(), Error> {
        let node = self.registry.lock().unwrap().get(pod_name).cloned();
        let Some(node) = node else {
            // Tracked from the label selector but never registered here
            // (leftover from an earlier driver run); nothing to dispatch to.
            eprintln!(
                "{}",
                format!("no facade registered for {pod_name}; skipping replay").yellow()
            );
            plan::clear_dirty(&mut self.records.lock().unwrap(), pod_name);
            return Ok(());
        };
        let (operations, skipped) = node.journal().read().await?;
        for tag in &skipped {
            eprintln!(
                "{}",
                format!("{}", Error::UnknownOperation(tag.clone())).yellow()
            );
        }
        println!(
            "🔁 {} {} {}",
            "replaying".color(FG1),
            format!("{} operation(s)", operations.len()).color(FG2),
            format!("on {pod_name}").color(FG1),
        );
        for operation in &operations {
            if node.role() == NodeRole::Switch {
                node.ensure_bridge().await?;
            }
            node.reapply(operation).await?;
        }
        Ok(())
    }
}

/// Connection-class failures (refused, DNS, reset) mean recreations may have
/// gone unseen; everything is replayed once the stream is back. Server-sent
/// watch errors just rebuild the stream and keep the current flags.
fn stream_error_severs_connection(error: &watcher::Error) -> bool {
    matches!(
        error,
        watcher::Error::InitialListFailed(_)
            | watcher::Error::WatchStartFailed(_)
            | watcher::Error::WatchFailed(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use kube::core::response::StatusSummary;

    fn api_error() -> kube::Error {
        kube::Error::Api(Box::new(ErrorResponse {
            status: Some(StatusSummary::Failure),
            message: "connection refused".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
            details: None,
            metadata: None,
        }))
    }

    #[test]
    fn connection_failures_invalidate_everything() {
        assert!(stream_error_severs_connection(
            &watcher::Error::InitialListFailed(api_error())
        ));
        assert!(stream_error_severs_connection(&watcher::Error::WatchFailed(
            api_error()
        )));
    }

    #[test]
    fn server_watch_errors_keep_current_flags() {
        let error = watcher::Error::WatchError(Box::new(ErrorResponse {
            status: Some(StatusSummary::Failure),
            message: "too old resource version".to_string(),
            reason: "Expired".to_string(),
            code: 410,
            details: None,
            metadata: None,
        }));
        assert!(!stream_error_severs_connection(&error));
    }
}
