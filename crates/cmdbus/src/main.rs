mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "cmdbus", version, about = "Command bus master and board simulator")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_with_negative_payload() {
        let cli = Cli::try_parse_from([
            "cmdbus",
            "call",
            "3",
            "2",
            "-120",
            "--socket",
            "/tmp/bus.sock",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.address, 3);
                assert_eq!(args.command, 2);
                assert_eq!(args.payload, -120);
                assert_eq!(args.connection.timeout, "50ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn call_requires_a_connection() {
        let err = Cli::try_parse_from(["cmdbus", "call", "1", "2"])
            .expect_err("missing connection should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn socket_and_serial_conflict() {
        let err = Cli::try_parse_from([
            "cmdbus",
            "call",
            "1",
            "2",
            "--socket",
            "/tmp/bus.sock",
            "--serial",
            "/dev/ttyUSB0",
        ])
        .expect_err("conflicting connections should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_stop_all_board_list() {
        let cli = Cli::try_parse_from([
            "cmdbus",
            "stop-all",
            "--boards",
            "1,2,7",
            "--serial",
            "/dev/ttyUSB0",
            "--baud",
            "57600",
        ])
        .expect("stop-all args should parse");

        match cli.command {
            Command::StopAll(args) => {
                assert_eq!(args.boards, vec![1, 2, 7]);
                assert_eq!(args.connection.baud, 57600);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_address() {
        assert!(Cli::try_parse_from(["cmdbus", "call", "256", "2", "--socket", "/tmp/b"]).is_err());
    }
}
