pub mod shutdown;

/// Name recorded on every resource this tool manages.
pub const MANAGER_NAME: &str = "lft";

pub mod annotations {
    /// Ordered operation journal attached to a node's workload.
    pub const OPERATIONS: &str = "lft/operations";
    pub const CREATED_BY: &str = "lft/created-by";
}

pub mod labels {
    pub const APP: &str = "app";
    pub const APP_VALUE: &str = "k8s-node";

    /// Label selector matching every emulated topology node.
    pub fn selector() -> String {
        format!("{APP}={APP_VALUE}")
    }
}

pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_else(|_| String::new())
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);
}
