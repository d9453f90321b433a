use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    action: &'a str,
    callback_id: u64,
    reply: &'a Value,
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    stream_id: u64,
    index: usize,
    chunk: &'a Value,
}

pub fn print_reply(action: &str, callback_id: u64, reply: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                action,
                callback_id,
                reply,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ACTION", "CALLBACK", "REPLY"])
                .add_row(vec![
                    action.to_string(),
                    callback_id.to_string(),
                    preview(reply),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("action={action} callback={callback_id} reply={}", preview(reply));
        }
    }
}

/// Prints stream chunks as they arrive; tables are rendered once at the end.
pub struct ChunkPrinter {
    format: OutputFormat,
    stream_id: u64,
    printed: usize,
    rows: Vec<Vec<String>>,
}

impl ChunkPrinter {
    pub fn new(stream_id: u64, format: OutputFormat) -> Self {
        Self {
            format,
            stream_id,
            printed: 0,
            rows: Vec::new(),
        }
    }

    pub fn printed(&self) -> usize {
        self.printed
    }

    pub fn chunk(&mut self, chunk: &Value) {
        let index = self.printed;
        self.printed += 1;
        match self.format {
            OutputFormat::Json => {
                let out = ChunkOutput {
                    stream_id: self.stream_id,
                    index,
                    chunk,
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table => self.rows.push(vec![index.to_string(), preview(chunk)]),
            OutputFormat::Pretty => println!("chunk[{index}] = {}", preview(chunk)),
        }
    }

    pub fn finish(self) {
        if !matches!(self.format, OutputFormat::Table) {
            return;
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["INDEX", "CHUNK"]);
        for row in self.rows {
            table.add_row(row);
        }
        println!("{table}");
    }
}

fn preview(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
