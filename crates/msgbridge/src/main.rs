mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use msgbridge_wire::{FrameConfig, DEFAULT_MAX_PAYLOAD};

use crate::cmd::Command;
use crate::exit::{CliError, INTERNAL};
use crate::logging::LogArgs;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "msgbridge", version, about = "Message bridge RPC and stream CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    #[command(flatten)]
    logging: LogArgs,

    /// Largest frame payload accepted or sent, in bytes.
    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = DEFAULT_MAX_PAYLOAD,
        env = "MSGBRIDGE_MAX_PAYLOAD",
        global = true
    )]
    max_payload: usize,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    cli.logging.init();

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let config = FrameConfig {
        max_payload_size: cli.max_payload,
    };

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime startup failed: {err}")))
        .and_then(|runtime| runtime.block_on(cmd::run(cli.command, format, config)));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
