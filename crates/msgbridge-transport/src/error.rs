/// Errors that can occur when posting to or subscribing on a port.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port has been closed; nothing more can be posted.
    #[error("port closed")]
    Closed,

    /// The port only supports a single subscriber and already has one.
    #[error("port already has a subscriber")]
    AlreadySubscribed,

    /// An I/O error occurred on the underlying byte stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
