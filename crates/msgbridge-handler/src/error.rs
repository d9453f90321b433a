use std::sync::Arc;

use msgbridge_transport::TransportError;
use msgbridge_wire::Reason;

/// A bug in one of the two peers. Not recoverable by the handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// A Reply arrived for a callback id with no pending call.
    #[error("cannot resolve callback {0}")]
    UnknownCallback(u64),

    /// The peer invoked an action nobody registered.
    #[error("unknown action from peer: {0}")]
    UnknownAction(String),

    /// `on` was called twice for one action name.
    #[error("there is already an action called \"{0}\"")]
    DuplicateAction(String),
}

/// Errors surfaced to code using a [`MessageHandler`](crate::MessageHandler).
///
/// Cloneable so a stream can hand the same failure to every later read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// The frame could not be handed to the port; it never reached the wire.
    #[error("failed to post frame: {0}")]
    Send(Arc<TransportError>),

    /// The payload could not be turned into a frame.
    #[error("failed to encode payload: {0}")]
    Encode(Arc<serde_json::Error>),

    /// A reply payload did not match the requested type.
    #[error("failed to decode payload: {0}")]
    Decode(Arc<serde_json::Error>),

    /// Local misuse or a peer bug.
    #[error("protocol violation: {0}")]
    Protocol(ProtocolViolation),

    /// The peer reported a failure (a failed Reply or a stream error).
    #[error(transparent)]
    Remote(Reason),

    /// The handler owning the pending capability went away first.
    #[error("message handler dropped before the {0} settled")]
    Detached(&'static str),
}

impl HandlerError {
    pub(crate) fn encode(err: serde_json::Error) -> Self {
        Self::Encode(Arc::new(err))
    }

    /// The cross-boundary reason, when the failure came from the peer.
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Self::Remote(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<TransportError> for HandlerError {
    fn from(err: TransportError) -> Self {
        Self::Send(Arc::new(err))
    }
}

impl From<ProtocolViolation> for HandlerError {
    fn from(violation: ProtocolViolation) -> Self {
        Self::Protocol(violation)
    }
}

impl From<Reason> for HandlerError {
    fn from(reason: Reason) -> Self {
        Self::Remote(reason)
    }
}

pub type Result<T> = std::result::Result<T, HandlerError>;
