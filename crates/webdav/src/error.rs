use lswb_core::retry::Transient;

/// Errors from remote storage operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with an unexpected status code.
    #[error("WebDAV error ({status}) for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    #[error("remote path not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Mounting or unmounting the remote storage failed.
    #[error("mount error: {0}")]
    Mount(String),
}

impl Transient for RemoteError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 423 || *status == 429,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Self::NotFound(_) | Self::Protocol(_) | Self::Mount(_) => false,
        }
    }
}
