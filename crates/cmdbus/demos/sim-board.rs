//! One master and two simulated boards on a shared in-process line.
//!
//! Run with:
//!   cargo run --example sim-board
//!
//! A relay thread copies every master byte to both boards and every board
//! byte back to the master, the way a multi-drop serial line behaves. Each
//! board ignores frames for the other address.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cmdbus::master::{BusClient, ClientConfig};
use cmdbus::slave::{
    BoardBuilder, BoardConfig, RuntimeConfig, SimActuators, SimSensors, SlaveRuntime,
    SPIN_MOTOR_BASE,
};
use cmdbus::transport::{BusPort, BusStream};

type Error = Box<dyn std::error::Error>;

fn relay(
    mut source: BusStream,
    running: Arc<AtomicBool>,
    mut deliver: impl FnMut(&[u8]) -> std::io::Result<()> + Send + 'static,
) -> Result<thread::JoinHandle<()>, Error> {
    source.set_read_timeout(Duration::from_millis(5))?;
    Ok(thread::spawn(move || {
        let mut buf = [0u8; 64];
        while running.load(Ordering::SeqCst) {
            match source.read(&mut buf) {
                Ok(0) => return,
                Ok(n) => {
                    if deliver(&buf[..n]).is_err() {
                        return;
                    }
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(_) => return,
            }
        }
    }))
}

fn spawn_board(
    address: u8,
    board_end: BusStream,
    running: Arc<AtomicBool>,
) -> Result<(SimActuators, thread::JoinHandle<()>), Error> {
    let config = BoardConfig {
        address,
        ..BoardConfig::default()
    };
    let board = BoardBuilder::from_config(&config)?.build();
    let actuators = SimActuators::new(config.ports.len());

    let mut runtime = SlaveRuntime::new(
        board,
        board_end.try_clone()?,
        board_end,
        actuators.clone(),
        SimSensors::new(),
        RuntimeConfig::for_board(&config),
    )?;
    let handle = thread::spawn(move || {
        if let Err(err) = runtime.run(&running) {
            eprintln!("board {address} stopped: {err}");
        }
    });
    Ok((actuators, handle))
}

fn main() -> Result<(), Error> {
    let running = Arc::new(AtomicBool::new(true));
    let (master_end, hub_up) = BusStream::pair()?;
    let to_master = Arc::new(Mutex::new(hub_up.try_clone()?));

    let mut threads = Vec::new();
    let mut to_boards = Vec::new();
    let mut boards = Vec::new();
    for address in [1u8, 2] {
        let (board_end, hub_down) = BusStream::pair()?;
        to_boards.push(hub_down.try_clone()?);
        let to_master = Arc::clone(&to_master);
        threads.push(relay(hub_down, running.clone(), move |bytes| {
            let mut master = to_master
                .lock()
                .map_err(|_| std::io::Error::other("line lock poisoned"))?;
            master.write_all(bytes)
        })?);

        let (actuators, handle) = spawn_board(address, board_end, running.clone())?;
        threads.push(handle);
        boards.push((address, actuators));
    }
    threads.push(relay(hub_up, running.clone(), move |bytes| {
        to_boards
            .iter_mut()
            .try_for_each(|board| board.write_all(bytes))
    })?);

    let client = BusClient::open(
        master_end,
        ClientConfig::default().with_reply_timeout(Duration::from_millis(200)),
    )?;

    for (address, actuators) in &boards {
        let speed = 60 * i32::from(*address);
        let echoed = client.call(*address, SPIN_MOTOR_BASE, speed)?;
        thread::sleep(Duration::from_millis(10));
        eprintln!(
            "board {address}: speed {speed} echoed {echoed}, port 0 duty {:.3}",
            actuators.drive(0)
        );
        let unknown = client.call(*address, 200, 1)?;
        eprintln!("board {address}: unknown command answered {unknown}");
    }

    let addresses: Vec<u8> = boards.iter().map(|(address, _)| *address).collect();
    for (address, result) in client.stop_all(&addresses) {
        eprintln!("board {address}: emergency stop -> {result:?}");
    }
    for (address, actuators) in &boards {
        eprintln!(
            "board {address}: outputs neutral = {}",
            actuators.is_neutral()
        );
    }

    running.store(false, Ordering::SeqCst);
    drop(client);
    for handle in threads {
        let _ = handle.join();
    }
    Ok(())
}
