use std::io::IsTerminal;

use clap::ValueEnum;
use cmdbus_slave::RuntimeStats;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

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

#[derive(Debug, Serialize)]
pub struct CallOutput {
    pub address: u8,
    pub command: u8,
    pub payload: i32,
    pub reply: i32,
    pub elapsed_us: u64,
}

#[derive(Debug, Serialize)]
pub struct StopOutput {
    pub address: u8,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BoardSummary {
    pub address: u8,
    pub masters: u64,
    #[serde(flatten)]
    pub stats: RuntimeStats,
    pub emergency_stops: u64,
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_call(out: &CallOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = table(vec!["ADDRESS", "COMMAND", "PAYLOAD", "REPLY", "ELAPSED"]);
            table.add_row(vec![
                out.address.to_string(),
                out.command.to_string(),
                out.payload.to_string(),
                out.reply.to_string(),
                format!("{}us", out.elapsed_us),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "board={} command={} payload={} reply={} ({}us)",
                out.address, out.command, out.payload, out.reply, out.elapsed_us
            );
        }
    }
}

pub fn print_stop_all(results: &[StopOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&results),
        OutputFormat::Table => {
            let mut table = table(vec!["ADDRESS", "STOPPED", "ERROR"]);
            for result in results {
                table.add_row(vec![
                    result.address.to_string(),
                    if result.acknowledged { "yes" } else { "no" }.to_string(),
                    result.error.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for result in results {
                match &result.error {
                    None => println!("board={} stopped", result.address),
                    Some(err) => println!("board={} NOT stopped: {err}", result.address),
                }
            }
        }
    }
}

pub fn print_board_summary(summary: &BoardSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            let stats = &summary.stats;
            let mut table = table(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("masters", summary.masters),
                ("handled", stats.handled),
                ("rejected", stats.rejected),
                ("unknown", stats.unknown),
                ("ignored", stats.ignored),
                ("control_steps", stats.control_steps),
                ("emergency_stops", summary.emergency_stops),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("board {}", summary.address);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let stats = &summary.stats;
            println!(
                "board={} masters={} handled={} rejected={} unknown={} ignored={} emergency_stops={}",
                summary.address,
                summary.masters,
                stats.handled,
                stats.rejected,
                stats.unknown,
                stats.ignored,
                summary.emergency_stops
            );
        }
    }
}
