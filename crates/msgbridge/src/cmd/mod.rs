use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use msgbridge_handler::MessageHandler;
use msgbridge_wire::{FrameConfig, FramedPort};
use serde_json::Value;

use crate::exit::{handler_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod notify;
pub mod serve;
pub mod stream;
pub mod version;

/// Handler name used by the serving side.
pub const SERVER_NAME: &str = "worker";
/// Handler name used by the connecting side.
pub const CLIENT_NAME: &str = "main";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the built-in actions on a Unix socket.
    Serve(ServeArgs),
    /// Invoke an action and print its reply.
    Call(CallArgs),
    /// Send a notification.
    Notify(NotifyArgs),
    /// Open a stream and print each chunk.
    Stream(StreamArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat, config: FrameConfig) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, config).await,
        Command::Call(args) => call::run(args, config, format).await,
        Command::Notify(args) => notify::run(args, config).await,
        Command::Stream(args) => stream::run(args, config, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    #[arg(env = "MSGBRIDGE_SOCKET")]
    pub path: PathBuf,
    /// Exit after serving N connections.
    #[arg(long, value_name = "N")]
    pub connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// String payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read a JSON payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    #[arg(env = "MSGBRIDGE_SOCKET")]
    pub path: PathBuf,
    /// Action to invoke on the peer.
    #[arg(long, short = 'a')]
    pub action: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Socket path to connect to.
    #[arg(env = "MSGBRIDGE_SOCKET")]
    pub path: PathBuf,
    /// Action to notify on the peer.
    #[arg(long, short = 'a')]
    pub action: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Socket path to connect to.
    #[arg(env = "MSGBRIDGE_SOCKET")]
    pub path: PathBuf,
    /// Stream action to open on the peer.
    #[arg(long, short = 'a')]
    pub action: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Chunks buffered before the producer is paused.
    #[arg(long, default_value = "1")]
    pub high_water_mark: i64,
    /// Cancel the stream after K chunks.
    #[arg(long, value_name = "K")]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// A client handler attached to a socket connection.
pub struct Session {
    pub handler: MessageHandler,
    pub port: Arc<FramedPort>,
}

#[cfg(unix)]
pub async fn connect(path: &Path, config: FrameConfig) -> CliResult<Session> {
    let stream = tokio::net::UnixStream::connect(path).await.map_err(|err| {
        crate::exit::io_error(&format!("connect to {} failed", path.display()), err)
    })?;
    let port = Arc::new(FramedPort::with_config(stream, config));
    let handler = MessageHandler::new(CLIENT_NAME, SERVER_NAME, port.clone())
        .map_err(|err| handler_error("attach failed", err))?;
    Ok(Session { handler, port })
}

#[cfg(not(unix))]
pub async fn connect(path: &Path, _config: FrameConfig) -> CliResult<Session> {
    Err(CliError::new(
        USAGE,
        format!("{}: unix sockets are not available on this platform", path.display()),
    ))
}

pub fn resolve_payload(args: &PayloadArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
    }
    if let Some(data) = &args.data {
        return Ok(Value::String(data.clone()));
    }
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return serde_json::from_str(&text).map_err(|err| {
            CliError::new(
                crate::exit::DATA_INVALID,
                format!("{} is not valid JSON: {err}", path.display()),
            )
        });
    }
    Ok(Value::Null)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
