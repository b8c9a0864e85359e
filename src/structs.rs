use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a session connects to: a pod container or a node shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Pod,
    Node,
}

/// Identifies what a session connects to. Immutable per connection
/// attempt; changing any field requires a new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub kind: TargetKind,
    pub namespace: String,
    /// Pod name, or for node targets the node's prepared shell pod.
    pub name: String,
    pub container: Option<String>,
}

impl SessionTarget {
    pub fn pod(
        namespace: impl Into<String>,
        name: impl Into<String>,
        container: Option<String>,
    ) -> Self {
        Self {
            kind: TargetKind::Pod,
            namespace: namespace.into(),
            name: name.into(),
            container,
        }
    }

    pub fn node(namespace: impl Into<String>, shell_pod: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Node,
            namespace: namespace.into(),
            name: shell_pod.into(),
            container: None,
        }
    }
}

/// Options fixed at log-stream open time. Any change requires a new
/// session; the backend's tail semantics are defined only at open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub container: Option<String>,
    pub tail_lines: Option<i64>,
    pub timestamps: bool,
    pub previous: bool,
    pub follow: bool,
    pub since_seconds: Option<i64>,
}

/// Response of the one-shot (non-follow) log fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFetchResponse {
    pub logs: Vec<String>,
    pub container: Option<String>,
    pub pod: String,
    pub namespace: String,
}

/// A pod eligible for default selection when none is chosen explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodCandidate {
    pub name: String,
    pub namespace: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Terminal transport lifecycle. Exactly one live transport exists per
/// session at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Errored,
}

/// Log session lifecycle. `Loaded` terminates the static (one-shot)
/// path, `Streaming` the follow path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    Idle,
    Loading,
    Streaming,
    Loaded,
    Closed,
    Errored,
}
