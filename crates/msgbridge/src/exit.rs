use std::fmt;
use std::io;

use msgbridge_handler::HandlerError;
use msgbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    let code = match err {
        TransportError::Io(source) => io_code(source.kind()),
        TransportError::Closed => TRANSPORT_ERROR,
        TransportError::AlreadySubscribed => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn handler_error(context: &str, err: HandlerError) -> CliError {
    match err {
        HandlerError::Send(source) => transport_error(context, &source),
        HandlerError::Encode(_) | HandlerError::Decode(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        HandlerError::Remote(reason) => CliError::new(
            FAILURE,
            format!("{context}: {}: {}", reason.name(), reason.message()),
        ),
        HandlerError::Detached(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        HandlerError::Protocol(_) => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
