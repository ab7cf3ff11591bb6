use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use cmdbus_master::{BusClient, ClientConfig};
use cmdbus_transport::{BusStream, SerialConfig, DEFAULT_BAUD_RATE};

use crate::exit::{bus_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod board;
pub mod call;
pub mod stop_all;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command to one board and print the reply.
    Call(CallArgs),
    /// Send the emergency stop to every listed board.
    StopAll(StopAllArgs),
    /// Run a simulated board on a Unix socket until interrupted.
    Board(BoardArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::StopAll(args) => stop_all::run(args, format),
        Command::Board(args) => board::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the bus is and how long to wait for replies.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Simulated bus socket (see `cmdbus board`).
    #[arg(long, value_name = "PATH", conflicts_with = "serial", required_unless_present = "serial")]
    pub socket: Option<PathBuf>,
    /// Serial device carrying the bus.
    #[arg(long, value_name = "DEVICE", env = "CMDBUS_SERIAL")]
    pub serial: Option<String>,
    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Reply window per call (e.g. 50ms, 1s).
    #[arg(long, default_value = "50ms")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Board address (1-255).
    pub address: u8,
    /// Command id (0-255).
    pub command: u8,
    /// Signed 32-bit request payload.
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    pub payload: i32,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct StopAllArgs {
    /// Board addresses (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub boards: Vec<u8>,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct BoardArgs {
    /// Board description (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,
    /// Socket path to bind.
    #[arg(long, value_name = "PATH")]
    pub socket: PathBuf,
    /// Override the address from the config file.
    #[arg(long)]
    pub address: Option<u8>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn open_client(args: &ConnectionArgs) -> CliResult<BusClient<BusStream, BusStream>> {
    let config = ClientConfig::default().with_reply_timeout(parse_duration(&args.timeout)?);

    if let Some(path) = &args.socket {
        #[cfg(unix)]
        return BusClient::connect_unix(path, config)
            .map_err(|err| bus_error("connect failed", err));
        #[cfg(not(unix))]
        return Err(CliError::new(
            USAGE,
            format!("--socket {} needs unix domain sockets", path.display()),
        ));
    }

    match &args.serial {
        Some(device) => {
            let serial = SerialConfig::new(device.as_str()).with_baud_rate(args.baud);
            BusClient::open_serial(&serial, config).map_err(|err| bus_error("open failed", err))
        }
        None => Err(CliError::new(USAGE, "either --socket or --serial is required")),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, scale): (&str, fn(u64) -> Duration) = if let Some(n) = input.strip_suffix("ms") {
        (n, Duration::from_millis)
    } else if let Some(n) = input.strip_suffix('s') {
        (n, Duration::from_secs)
    } else {
        (input, Duration::from_millis)
    };

    match number.trim().parse::<u64>() {
        Ok(0) => Err(CliError::new(USAGE, "duration must be greater than zero")),
        Ok(value) => Ok(scale(value)),
        Err(_) => Err(CliError::new(USAGE, format!("invalid duration: {input:?}"))),
    }
}
