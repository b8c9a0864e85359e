use thiserror::Error;

/// Errors surfaced by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("session is not connected")]
    NotConnected,

    #[error("transport channel closed")]
    ChannelClosed,

    #[error("transport missing {0} stream")]
    MissingStream(&'static str),

    #[error("preference store i/o error: {0}")]
    PrefsIo(#[from] std::io::Error),

    #[error("preference store encode error: {0}")]
    PrefsEncode(#[from] serde_json::Error),
}
