//! Remote-session layer for a Kubernetes dashboard.
//!
//! Maintains live bidirectional terminal sessions and one-way streaming
//! log tails against a cluster, surviving target changes and user-driven
//! reconfiguration while presenting ordered, byte-accurate output with
//! throughput measurement. Resource CRUD, routing and chart rendering are
//! the embedding dashboard's concern; this crate only speaks sessions.

use kube::{config::KubeConfigOptions, Client, Config};

pub mod ansi;
pub mod binding;
pub mod cmd;
pub mod error;
pub mod filter;
mod log;
pub mod logs;
pub mod prefs;
pub mod stats;
pub mod streaming;
pub mod structs;
pub mod terminal;

pub use error::SessionError;
pub use log::setup_logger;
pub use structs::{
    ConnectionState, LogFetchResponse, LogOptions, LogState, PodCandidate, SessionTarget,
    TargetKind,
};

/// Build a client for the selected cluster. The context override is how
/// cluster selection reaches this layer; everything downstream carries it
/// implicitly in the client.
#[tracing::instrument]
pub async fn init_client(context: Option<String>) -> Result<Client, SessionError> {
    let options = KubeConfigOptions {
        context,
        cluster: None,
        user: None,
    };
    let config = Config::from_kubeconfig(&options).await?;
    Ok(Client::try_from(config)?)
}
