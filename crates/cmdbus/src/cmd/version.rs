use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("cmdbus {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("CMDBUS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("CMDBUS_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "features: slave={}, master={}, async={}, cli=true",
        cfg!(feature = "slave"),
        cfg!(feature = "master"),
        cfg!(feature = "async")
    );
    println!(
        "frame: start=0x{:02X} end=0x{:02X} escape=0x{:02X} max_wire_size={}",
        cmdbus_frame::START_BYTE,
        cmdbus_frame::END_BYTE,
        cmdbus_frame::ESCAPE_BYTE,
        cmdbus_frame::MAX_WIRE_SIZE
    );

    Ok(SUCCESS)
}
