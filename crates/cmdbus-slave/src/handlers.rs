//! Built-in command handlers.

use crate::dispatch::Reply;
use crate::state::BoardState;

pub use cmdbus_frame::SAFE_COMMAND;

/// Motor port `k` answers command `SPIN_MOTOR_BASE + k`.
pub const SPIN_MOTOR_BASE: u8 = 2;

/// Command id bound to spin-motor port `port`, if it fits below the
/// reserved id.
pub fn spin_motor_command(port: usize) -> Option<u8> {
    let id = usize::from(SPIN_MOTOR_BASE).checked_add(port)?;
    u8::try_from(id).ok().filter(|id| *id != SAFE_COMMAND)
}

/// Record a goal speed for the motor port encoded in the command id and echo
/// the request.
pub fn spin_motor(state: &mut BoardState, command_id: u8, payload: i32) -> Reply {
    let Some(port) = command_id.checked_sub(SPIN_MOTOR_BASE) else {
        return Reply::rejected();
    };
    if state.set_motor_goal(usize::from(port), payload) {
        Reply::handled(payload)
    } else {
        Reply::rejected()
    }
}

/// Zero every goal. Outputs follow on the next control step.
pub fn safe(state: &mut BoardState, _command_id: u8, _payload: i32) -> Reply {
    state.stop_all();
    Reply::handled(0)
}

/// Record the hanger goal and answer with the speed it actually runs at.
pub fn serve_hanger(state: &mut BoardState, _command_id: u8, payload: i32) -> Reply {
    match state.hanger_mut() {
        Some(hanger) => {
            hanger.goal = payload;
            Reply::handled(hanger.current)
        }
        None => Reply::rejected(),
    }
}

/// Set the tray's target position and answer with the position it has
/// counted so far. Releases the hold left by an emergency stop.
pub fn load_tray(state: &mut BoardState, _command_id: u8, payload: i32) -> Reply {
    match state.tray_mut() {
        Some(tray) => {
            tray.goal = payload;
            tray.held = false;
            Reply::handled(tray.position)
        }
        None => Reply::rejected(),
    }
}

/// Handler answering with the last sampled count of encoder `port`.
pub fn read_encoder(port: usize) -> impl FnMut(&mut BoardState, u8, i32) -> Reply + Send {
    move |state: &mut BoardState, _command_id: u8, _payload: i32| {
        Reply::handled(state.encoder_count(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoardConfig, HangerConfig, PortFunction, TrayConfig};
    use crate::dispatch::DispatchOutcome;

    #[test]
    fn spin_motor_echoes_and_records_goal() {
        let mut state = BoardState::new(&BoardConfig::default());
        let reply = spin_motor(&mut state, SPIN_MOTOR_BASE + 1, -90);
        assert_eq!(reply, Reply::handled(-90));
        assert_eq!(state.motor_goal(1), -90);
    }

    #[test]
    fn spin_motor_rejects_ports_the_board_lacks() {
        let mut state = BoardState::new(&BoardConfig::default());
        assert_eq!(spin_motor(&mut state, SPIN_MOTOR_BASE + 4, 10), Reply::rejected());
        assert_eq!(spin_motor(&mut state, 1, 10).outcome, DispatchOutcome::Rejected);
    }

    #[test]
    fn safe_clears_goals() {
        let mut state = BoardState::new(&BoardConfig::default());
        state.set_motor_goal(0, 200);
        assert_eq!(safe(&mut state, SAFE_COMMAND, 99), Reply::handled(0));
        assert_eq!(state.motor_goal(0), 0);
        assert_eq!(state.emergency_stops(), 1);
    }

    #[test]
    fn hanger_replies_with_current_speed() {
        let config = BoardConfig {
            ports: vec![PortFunction::Motor, PortFunction::Other],
            hanger: Some(HangerConfig::default()),
            ..BoardConfig::default()
        };
        let mut state = BoardState::new(&config);
        state.hanger_mut().unwrap().current = 15;

        assert_eq!(serve_hanger(&mut state, 20, 40), Reply::handled(15));
        assert_eq!(state.hanger().unwrap().goal, 40);
    }

    #[test]
    fn hanger_without_axis_is_rejected() {
        let mut state = BoardState::new(&BoardConfig::default());
        assert_eq!(serve_hanger(&mut state, 20, 40), Reply::rejected());
    }

    #[test]
    fn load_tray_sets_target_and_reports_position() {
        let config = BoardConfig {
            ports: vec![PortFunction::Other, PortFunction::Motor],
            tray: Some(TrayConfig::default()),
            ..BoardConfig::default()
        };
        let mut state = BoardState::new(&config);
        state.tray_mut().unwrap().position = 2;
        state.stop_all();
        assert!(state.tray().unwrap().held);

        assert_eq!(load_tray(&mut state, 20, 5), Reply::handled(2));
        let tray = state.tray().unwrap();
        assert_eq!(tray.goal, 5);
        assert!(!tray.held);

        let mut bare = BoardState::new(&BoardConfig::default());
        assert_eq!(load_tray(&mut bare, 20, 5), Reply::rejected());
    }

    #[test]
    fn encoder_reader_ignores_payload() {
        let config = BoardConfig {
            ports: vec![PortFunction::Motor, PortFunction::Encoder],
            ..BoardConfig::default()
        };
        let mut state = BoardState::new(&config);
        state.set_encoder_count(1, 812);

        let mut handler = read_encoder(1);
        assert_eq!(handler(&mut state, 40, -1), Reply::handled(812));
    }

    #[test]
    fn spin_motor_ids_stop_below_the_reserved_id() {
        assert_eq!(spin_motor_command(0), Some(2));
        assert_eq!(spin_motor_command(252), Some(254));
        assert_eq!(spin_motor_command(253), None);
        assert_eq!(spin_motor_command(400), None);
    }
}
