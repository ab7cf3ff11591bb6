use std::time::Instant;

use crate::cmd::{open_client, CallArgs};
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_call, CallOutput, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let client = open_client(&args.connection)?;

    let started = Instant::now();
    let reply = client
        .call(args.address, args.command, args.payload)
        .map_err(|err| bus_error("call failed", err))?;

    print_call(
        &CallOutput {
            address: args.address,
            command: args.command,
            payload: args.payload,
            reply,
            elapsed_us: started.elapsed().as_micros() as u64,
        },
        format,
    );
    Ok(SUCCESS)
}
