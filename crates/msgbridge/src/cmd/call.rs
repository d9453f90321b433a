use msgbridge_wire::FrameConfig;

use crate::cmd::{connect, parse_duration, resolve_payload, CallArgs};
use crate::exit::{handler_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_reply, OutputFormat};

pub async fn run(args: CallArgs, config: FrameConfig, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args.payload)?;
    let session = connect(&args.path, config).await?;

    let reply = session.handler.send_with_promise(&args.action, payload);
    let callback_id = reply.callback_id();
    let value = tokio::time::timeout(timeout, reply)
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("no reply within {timeout:?}")))?
        .map_err(|err| handler_error("call failed", err))?;

    print_reply(&args.action, callback_id, &value, format);
    Ok(SUCCESS)
}
