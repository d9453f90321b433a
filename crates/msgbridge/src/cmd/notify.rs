use msgbridge_wire::FrameConfig;
use tracing::debug;

use crate::cmd::{connect, resolve_payload, NotifyArgs};
use crate::exit::{handler_error, transport_error, CliResult, SUCCESS};

pub async fn run(args: NotifyArgs, config: FrameConfig) -> CliResult<i32> {
    let payload = resolve_payload(&args.payload)?;
    let session = connect(&args.path, config).await?;

    session
        .handler
        .send(&args.action, payload)
        .map_err(|err| handler_error("notify failed", err))?;
    session
        .port
        .flush()
        .await
        .map_err(|err| transport_error("notify failed", &err))?;
    debug!(action = %args.action, "notification sent");
    Ok(SUCCESS)
}
