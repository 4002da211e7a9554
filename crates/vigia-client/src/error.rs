/// Errors that can occur on a detection client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The TCP connect to the server failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Frame-level failure, e.g. during the subscription handshake.
    #[error("frame error: {0}")]
    Frame(#[from] vigia_frame::FrameError),

    /// `connect` was called while a session is still live.
    #[error("client is already connected")]
    AlreadyConnected,

    /// Socket setup or receiver thread spawn failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
