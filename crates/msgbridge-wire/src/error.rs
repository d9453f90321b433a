/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The envelope header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4d42 \"MB\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload is not valid frame JSON.
    #[error("frame json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON parsed but does not describe any known frame shape.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
