//! Cross-boundary failure reasons.
//!
//! Errors do not survive serialization, so failures crossing the port are
//! reduced to a closed set of kinds identified by a `name` field. Anything
//! outside that set is downgraded to [`Reason::Unknown`], keeping its message.

use serde::{Deserialize, Serialize};

/// Boxed error returned by action handlers and stream hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Wire name of [`Reason::Abort`].
pub const ABORT_EXCEPTION: &str = "AbortException";
/// Wire name of [`Reason::MissingResource`].
pub const MISSING_RESOURCE_EXCEPTION: &str = "MissingPDFException";
/// Wire name of [`Reason::UnexpectedResponse`].
pub const UNEXPECTED_RESPONSE_EXCEPTION: &str = "UnexpectedResponseException";
/// Wire name of [`Reason::Unknown`].
pub const UNKNOWN_ERROR_EXCEPTION: &str = "UnknownErrorException";

/// A failure that can be carried by a Reply or a stream control frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(from = "WireReason", into = "WireReason")]
pub enum Reason {
    /// The operation was aborted, usually by a cancel.
    #[error("{message}")]
    Abort { message: String },

    /// The requested resource does not exist.
    #[error("{message}")]
    MissingResource { message: String },

    /// A fetch returned an unexpected status.
    #[error("{message}")]
    UnexpectedResponse { message: String, status: u16 },

    /// Any other failure; `details` keeps the original rendering.
    #[error("{message}")]
    Unknown { message: String, details: String },
}

impl Reason {
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort {
            message: message.into(),
        }
    }

    pub fn missing_resource(message: impl Into<String>) -> Self {
        Self::MissingResource {
            message: message.into(),
        }
    }

    pub fn unexpected_response(message: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
            status,
        }
    }

    pub fn unknown(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            details: details.into(),
        }
    }

    /// The wire `name` of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Abort { .. } => ABORT_EXCEPTION,
            Self::MissingResource { .. } => MISSING_RESOURCE_EXCEPTION,
            Self::UnexpectedResponse { .. } => UNEXPECTED_RESPONSE_EXCEPTION,
            Self::Unknown { .. } => UNKNOWN_ERROR_EXCEPTION,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Abort { message }
            | Self::MissingResource { message }
            | Self::UnexpectedResponse { message, .. }
            | Self::Unknown { message, .. } => message,
        }
    }

    /// Encode an arbitrary error for the wire.
    ///
    /// A `Reason` passes through unchanged; every other error becomes
    /// `Unknown` with its display message and debug rendering.
    pub fn wrap(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(reason) = err.downcast_ref::<Reason>() {
            return reason.clone();
        }
        Self::unknown(err.to_string(), format!("{err:?}"))
    }

    /// Encode a boxed handler error, reusing the allocation when it already
    /// holds a `Reason`.
    pub fn wrap_boxed(err: BoxError) -> Self {
        match err.downcast::<Reason>() {
            Ok(reason) => *reason,
            Err(other) => Self::unknown(other.to_string(), format!("{other:?}")),
        }
    }
}

/// Serialized shape: `{ name, message, status?, details? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireReason {
    name: String,
    #[serde(default)]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<WireReason> for Reason {
    fn from(wire: WireReason) -> Self {
        match wire.name.as_str() {
            ABORT_EXCEPTION => Reason::abort(wire.message),
            MISSING_RESOURCE_EXCEPTION => Reason::missing_resource(wire.message),
            UNEXPECTED_RESPONSE_EXCEPTION => {
                Reason::unexpected_response(wire.message, wire.status.unwrap_or(0))
            }
            UNKNOWN_ERROR_EXCEPTION => {
                let details = wire.details.unwrap_or_default();
                Reason::unknown(wire.message, details)
            }
            other => {
                let details = format!("{other}: {}", wire.message);
                Reason::unknown(wire.message, details)
            }
        }
    }
}

impl From<Reason> for WireReason {
    fn from(reason: Reason) -> Self {
        let name = reason.name().to_string();
        match reason {
            Reason::Abort { message } | Reason::MissingResource { message } => WireReason {
                name,
                message,
                status: None,
                details: None,
            },
            Reason::UnexpectedResponse { message, status } => WireReason {
                name,
                message,
                status: Some(status),
                details: None,
            },
            Reason::Unknown { message, details } => WireReason {
                name,
                message,
                status: None,
                details: Some(details),
            },
        }
    }
}
