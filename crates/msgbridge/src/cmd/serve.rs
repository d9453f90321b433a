use std::time::Duration;

use msgbridge_handler::{HandlerError, MessageHandler};
use msgbridge_wire::{BoxError, FrameConfig};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{CliResult, SUCCESS};

#[derive(Debug, Deserialize)]
struct CountRequest {
    count: u64,
    #[serde(default)]
    delay_ms: Option<u64>,
}

/// Install the actions every served connection answers.
///
/// - `Echo` (call): replies with its payload
/// - `Log` (notification): logs its payload
/// - `Count` (stream): `{"count": N, "delay_ms"?: D}` yields `0..N`
pub fn register_builtins(handler: &MessageHandler) -> Result<(), HandlerError> {
    handler.on("Echo", |data| async move { Ok::<_, BoxError>(data) })?;

    handler.on("Log", |data| async move {
        info!(data = %data, "peer log");
        Ok::<_, BoxError>(Value::Null)
    })?;

    handler.on_stream("Count", |data, sink| async move {
        let request: CountRequest = serde_json::from_value(data)?;
        let stream_id = sink.stream_id();
        sink.set_on_cancel(move |reason| async move {
            info!(stream_id, reason = %reason, "count stream cancelled");
            Ok::<_, BoxError>(())
        });

        tokio::spawn(async move {
            for n in 0..request.count {
                if sink.ready().await.is_err() {
                    return;
                }
                if let Some(delay) = request.delay_ms {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                if let Err(err) = sink.enqueue(n) {
                    warn!(stream_id, error = %err, "count stream enqueue failed");
                    return;
                }
            }
            if let Err(err) = sink.close() {
                warn!(stream_id, error = %err, "count stream close failed");
            }
        });
        Ok::<_, BoxError>(())
    })?;

    Ok(())
}

#[cfg(unix)]
pub async fn run(args: ServeArgs, config: FrameConfig) -> CliResult<i32> {
    use crate::exit::io_error;

    remove_stale_socket(&args.path)?;
    let listener = tokio::net::UnixListener::bind(&args.path)
        .map_err(|err| io_error(&format!("bind {} failed", args.path.display()), err))?;
    info!(path = %args.path.display(), "serving");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut connections = Vec::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|err| io_error("accept failed", err))?;
                let id = connections.len() + 1;
                connections.push(tokio::spawn(serve_connection(stream, config.clone(), id)));
                if args.connections.is_some_and(|max| connections.len() >= max) {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    if args.connections.is_some() {
        for connection in connections {
            let _ = connection.await;
        }
    }
    let _ = std::fs::remove_file(&args.path);
    Ok(SUCCESS)
}

#[cfg(not(unix))]
pub async fn run(args: ServeArgs, _config: FrameConfig) -> CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        format!(
            "{}: unix sockets are not available on this platform",
            args.path.display()
        ),
    ))
}

#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> CliResult<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)
            .map_err(|err| crate::exit::io_error("removing stale socket failed", err)),
        Ok(_) => Err(crate::exit::CliError::new(
            crate::exit::USAGE,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(_) => Ok(()),
    }
}

#[cfg(unix)]
async fn serve_connection(stream: tokio::net::UnixStream, config: FrameConfig, id: usize) {
    use std::sync::Arc;

    use msgbridge_wire::{FramedPort, Reason};

    use crate::cmd::{CLIENT_NAME, SERVER_NAME};

    let port = Arc::new(FramedPort::with_config(stream, config));
    let handler = match MessageHandler::new(SERVER_NAME, CLIENT_NAME, port) {
        Ok(handler) => handler,
        Err(err) => {
            warn!(connection = id, error = %err, "attach failed");
            return;
        }
    };
    if let Err(err) = register_builtins(&handler) {
        warn!(connection = id, error = %err, "registering actions failed");
        return;
    }
    info!(connection = id, "peer connected");

    handler.closed().await;
    if let Some(violation) = handler.fault() {
        warn!(connection = id, error = %violation, "peer violated the protocol");
    }
    handler.reject_pending(Reason::abort("connection closed"));
    info!(connection = id, "peer disconnected");
}
