/// Errors that can occur while framing or deframing envelopes.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header declared a length outside `1..=MAX_FRAME_SIZE`.
    #[error("invalid frame size: {size} bytes (allowed 1..={})", crate::codec::MAX_FRAME_SIZE)]
    InvalidFrameSize { size: usize },

    /// The frame body was not valid envelope JSON. Fatal to the
    /// connection; the stream offers no way to resynchronize.
    #[error("malformed frame payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended, either between frames or mid-frame. This is the
    /// normal way a server session finishes, not a protocol violation.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
