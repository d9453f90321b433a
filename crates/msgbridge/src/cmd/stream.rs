use msgbridge_handler::QueueingStrategy;
use msgbridge_wire::{FrameConfig, Reason};
use tracing::info;

use crate::cmd::{connect, resolve_payload, StreamArgs};
use crate::exit::{handler_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{ChunkPrinter, OutputFormat};

pub async fn run(args: StreamArgs, config: FrameConfig, format: OutputFormat) -> CliResult<i32> {
    if args.high_water_mark < 0 {
        return Err(CliError::new(USAGE, "--high-water-mark must not be negative"));
    }
    let payload = resolve_payload(&args.payload)?;
    let session = connect(&args.path, config).await?;

    let strategy = QueueingStrategy::count(args.high_water_mark);
    let mut reader = session
        .handler
        .send_with_stream(&args.action, payload, strategy);
    let mut printer = ChunkPrinter::new(reader.stream_id(), format);

    loop {
        if args.limit.is_some_and(|limit| printer.printed() >= limit) {
            reader
                .cancel(Reason::abort("chunk limit reached"))
                .await
                .map_err(|err| handler_error("cancel failed", err))?;
            info!(chunks = printer.printed(), "stream cancelled at limit");
            break;
        }
        match reader.read().await {
            Ok(Some(chunk)) => printer.chunk(&chunk),
            Ok(None) => break,
            Err(err) => {
                printer.finish();
                return Err(handler_error("stream failed", err));
            }
        }
    }

    printer.finish();
    Ok(SUCCESS)
}
