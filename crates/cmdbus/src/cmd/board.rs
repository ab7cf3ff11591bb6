use crate::cmd::BoardArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

#[cfg(not(unix))]
pub fn run(args: BoardArgs, _format: OutputFormat) -> CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        format!(
            "cannot serve {}: board simulation needs unix domain sockets",
            args.socket.display()
        ),
    ))
}

#[cfg(unix)]
pub fn run(args: BoardArgs, format: OutputFormat) -> CliResult<i32> {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use cmdbus_slave::{
        BoardBuilder, BoardConfig, RuntimeConfig, RuntimeError, SimActuators, SimSensors,
        SlaveRuntime,
    };
    use cmdbus_transport::UnixDomainSocket;
    use tracing::info;

    use crate::exit::{config_error, runtime_error, transport_error, SUCCESS};
    use crate::output::{print_board_summary, BoardSummary};

    let mut config =
        BoardConfig::from_file(&args.config).map_err(|err| config_error("load failed", err))?;
    if let Some(address) = args.address {
        config.address = address;
    }
    let board = BoardBuilder::from_config(&config)
        .map_err(|err| config_error("invalid board", err))?
        .build();
    let address = board.address();
    let actuators = SimActuators::new(config.ports.len());
    let sensors = SimSensors::new();

    let socket =
        UnixDomainSocket::bind(&args.socket).map_err(|err| transport_error("bind failed", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(
        address,
        commands = ?board.table().command_ids(),
        socket = ?socket.path(),
        "simulated board waiting for a master"
    );

    let Some(stream) = wait_for_master(&socket, &running)? else {
        print_board_summary(
            &BoardSummary {
                address,
                masters: 0,
                stats: Default::default(),
                emergency_stops: 0,
            },
            format,
        );
        return Ok(SUCCESS);
    };

    let reader = stream
        .try_clone()
        .map_err(|err| transport_error("attach failed", err))?;
    let mut runtime = SlaveRuntime::new(
        board,
        reader,
        stream,
        actuators,
        sensors,
        RuntimeConfig::for_board(&config),
    )
    .map_err(|err| runtime_error("board failed to start", err))?;
    let mut masters = 1u64;

    loop {
        match runtime.run(&running) {
            Ok(()) => break,
            Err(RuntimeError::Disconnected) => {
                info!(address, "master detached");
                let Some(stream) = wait_for_master(&socket, &running)? else {
                    break;
                };
                let reader = stream
                    .try_clone()
                    .map_err(|err| transport_error("attach failed", err))?;
                runtime
                    .reattach(reader, stream)
                    .map_err(|err| runtime_error("attach failed", err))?;
                masters += 1;
            }
            Err(err) => return Err(runtime_error("board failed", err)),
        }
    }

    print_board_summary(
        &BoardSummary {
            address,
            masters,
            stats: runtime.stats(),
            emergency_stops: runtime.state().emergency_stops(),
        },
        format,
    );
    Ok(SUCCESS)
}

#[cfg(unix)]
const ACCEPT_POLL: std::time::Duration = std::time::Duration::from_millis(20);

/// Block until a master connects or `running` clears.
#[cfg(unix)]
fn wait_for_master(
    socket: &cmdbus_transport::UnixDomainSocket,
    running: &std::sync::atomic::AtomicBool,
) -> CliResult<Option<cmdbus_transport::BusStream>> {
    use std::sync::atomic::Ordering;

    while running.load(Ordering::SeqCst) {
        match socket.try_accept() {
            Ok(Some(stream)) => return Ok(Some(stream)),
            Ok(None) => std::thread::sleep(ACCEPT_POLL),
            Err(err) => return Err(crate::exit::transport_error("accept failed", err)),
        }
    }
    Ok(None)
}

#[cfg(unix)]
fn install_ctrlc_handler(running: std::sync::Arc<std::sync::atomic::AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|err| {
        crate::exit::CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
