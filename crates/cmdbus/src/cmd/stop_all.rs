use crate::cmd::{open_client, StopAllArgs};
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_stop_all, OutputFormat, StopOutput};

pub fn run(args: StopAllArgs, format: OutputFormat) -> CliResult<i32> {
    let client = open_client(&args.connection)?;

    let results: Vec<StopOutput> = client
        .stop_all(&args.boards)
        .into_iter()
        .map(|(address, result)| StopOutput {
            address,
            acknowledged: result.is_ok(),
            error: result.err().map(|err| err.to_string()),
        })
        .collect();

    print_stop_all(&results, format);

    if results.iter().all(|result| result.acknowledged) {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
