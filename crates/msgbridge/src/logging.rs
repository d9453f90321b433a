use clap::{Args, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Targets that follow `--log-level`; everything else is capped at warn.
const BRIDGE_TARGETS: [&str; 4] = [
    "msgbridge",
    "msgbridge_transport",
    "msgbridge_wire",
    "msgbridge_handler",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Global logging flags. Logs go to stderr; stdout carries replies and chunks.
#[derive(Args, Debug, Clone, Copy)]
pub struct LogArgs {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Minimum level for msgbridge's own events (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "MSGBRIDGE_LOG_LEVEL",
        global = true
    )]
    pub log_level: LogLevel,
}

impl LogArgs {
    /// Per-target filter: dispatch events at the chosen level, runtime and
    /// dependency noise at warn at most.
    pub fn targets(&self) -> Targets {
        let level = LevelFilter::from(self.log_level);
        Targets::new()
            .with_default(level.min(LevelFilter::WARN))
            .with_targets(BRIDGE_TARGETS.iter().map(|target| (*target, level)))
    }

    /// Install the stderr subscriber. Targets are only printed when tracing
    /// dispatch, where they tell handler and wire events apart.
    pub fn init(&self) {
        let verbose = matches!(self.log_level, LogLevel::Debug | LogLevel::Trace);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(verbose);

        let _ = match self.log_format {
            LogFormat::Text => tracing_subscriber::registry()
                .with(layer.with_filter(self.targets()))
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(layer.json().with_filter(self.targets()))
                .try_init(),
        };
    }
}
