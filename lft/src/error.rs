#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("pod {pod} did not become ready within {timeout_secs}s")]
    ReadinessTimeout { pod: String, timeout_secs: u64 },

    #[error("could not resolve pod identity: {0}")]
    Identity(String),

    #[error("command failed with rc {rc}: {stderr}")]
    Effector { stderr: String, rc: i32 },

    #[error("watch stream error: {0}")]
    Stream(String),

    #[error("unknown operation tag: {0}")]
    UnknownOperation(String),

    #[error("journal for {name} would exceed the annotation size limit ({size} bytes)")]
    JournalFull { name: String, size: usize },

    #[error("backend not built in: {0}")]
    UnsupportedBackend(String),

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
