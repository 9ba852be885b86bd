/// Core error type for the relay.
///
/// Adapter crates should map their specific errors into this type so the
/// transfer engine can classify failures consistently (fatal vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("failed to initiate resumable upload: {status} - {body}")]
    SessionInitiation { status: u16, body: String },

    /// Network-level failure talking to a remote endpoint. Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered in a way the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
