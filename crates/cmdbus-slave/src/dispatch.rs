use std::collections::BTreeMap;

use crate::error::DispatchError;
use crate::state::BoardState;

/// How a dispatched command was handled. Not sent on the wire; the reply
/// frame only carries the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// The handler declined the request (e.g. a port the board does not have).
    Rejected,
    /// No handler is registered for the command id.
    UnknownCommand,
}

impl DispatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchOutcome::Handled => "handled",
            DispatchOutcome::Rejected => "rejected",
            DispatchOutcome::UnknownCommand => "unknown_command",
        }
    }
}

/// What a handler returns: the reply payload and how it fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub payload: i32,
    pub outcome: DispatchOutcome,
}

impl Reply {
    pub fn handled(payload: i32) -> Self {
        Self {
            payload,
            outcome: DispatchOutcome::Handled,
        }
    }

    /// Declined requests still get a reply, with a zero payload.
    pub fn rejected() -> Self {
        Self {
            payload: 0,
            outcome: DispatchOutcome::Rejected,
        }
    }
}

/// A board-local command handler.
///
/// Handlers must return quickly: while one runs, the board cannot answer
/// anything else, including the emergency stop. Long physical processes are
/// expressed as goals in [`BoardState`] for the control step to pursue.
pub trait CommandHandler: Send {
    fn handle(&mut self, state: &mut BoardState, command_id: u8, payload: i32) -> Reply;
}

impl<F> CommandHandler for F
where
    F: FnMut(&mut BoardState, u8, i32) -> Reply + Send,
{
    fn handle(&mut self, state: &mut BoardState, command_id: u8, payload: i32) -> Reply {
        self(state, command_id, payload)
    }
}

/// Command id to handler mapping for one board.
#[derive(Default)]
pub struct DispatchTable {
    handlers: BTreeMap<u8, Box<dyn CommandHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `command_id` to `handler`. An existing binding is never replaced.
    pub fn register<H>(&mut self, command_id: u8, handler: H) -> Result<(), DispatchError>
    where
        H: CommandHandler + 'static,
    {
        if self.handlers.contains_key(&command_id) {
            return Err(DispatchError::DuplicateCommand(command_id));
        }
        self.handlers.insert(command_id, Box::new(handler));
        Ok(())
    }

    /// Run the handler for `command_id`.
    ///
    /// Unknown ids answer `(0, UnknownCommand)`; the bus always replies.
    pub fn dispatch(
        &mut self,
        state: &mut BoardState,
        command_id: u8,
        payload: i32,
    ) -> (i32, DispatchOutcome) {
        match self.handlers.get_mut(&command_id) {
            Some(handler) => {
                let reply = handler.handle(state, command_id, payload);
                (reply.payload, reply.outcome)
            }
            None => (0, DispatchOutcome::UnknownCommand),
        }
    }

    pub fn contains(&self, command_id: u8) -> bool {
        self.handlers.contains_key(&command_id)
    }

    /// Registered ids in ascending order.
    pub fn command_ids(&self) -> Vec<u8> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("commands", &self.command_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardConfig;

    fn state() -> BoardState {
        BoardState::new(&BoardConfig::default())
    }

    fn echo(_: &mut BoardState, _: u8, payload: i32) -> Reply {
        Reply::handled(payload)
    }

    #[test]
    fn registering_distinct_ids_succeeds() {
        let mut table = DispatchTable::new();
        for id in [2u8, 3, 20, 255] {
            table.register(id, echo).unwrap();
        }
        assert_eq!(table.len(), 4);
        assert_eq!(table.command_ids(), vec![2, 3, 20, 255]);
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_first_handler() {
        let mut table = DispatchTable::new();
        table.register(2, echo).unwrap();

        let err = table
            .register(2, |_: &mut BoardState, _: u8, _: i32| Reply::handled(-1))
            .unwrap_err();
        assert_eq!(err, DispatchError::DuplicateCommand(2));

        let mut state = state();
        assert_eq!(
            table.dispatch(&mut state, 2, 42),
            (42, DispatchOutcome::Handled)
        );
    }

    #[test]
    fn unknown_command_replies_zero() {
        let mut table = DispatchTable::new();
        let mut state = state();
        assert!(table.is_empty());
        assert_eq!(
            table.dispatch(&mut state, 77, 1234),
            (0, DispatchOutcome::UnknownCommand)
        );
    }

    #[test]
    fn handler_sees_command_id_and_state() {
        let mut table = DispatchTable::new();
        table
            .register(5, |state: &mut BoardState, id: u8, payload: i32| {
                if state.set_motor_goal(usize::from(id - 2), payload) {
                    Reply::handled(payload)
                } else {
                    Reply::rejected()
                }
            })
            .unwrap();

        let mut state = state();
        assert_eq!(
            table.dispatch(&mut state, 5, -80),
            (-80, DispatchOutcome::Handled)
        );
        assert_eq!(state.motor_goal(3), -80);
    }

    #[test]
    fn stateful_closure_handlers() {
        let mut calls = 0;
        let mut table = DispatchTable::new();
        table
            .register(9, move |_: &mut BoardState, _: u8, _: i32| {
                calls += 1;
                Reply::handled(calls)
            })
            .unwrap();

        let mut state = state();
        assert_eq!(table.dispatch(&mut state, 9, 0).0, 1);
        assert_eq!(table.dispatch(&mut state, 9, 0).0, 2);
    }

    #[test]
    fn debug_lists_commands() {
        let mut table = DispatchTable::new();
        table.register(255, echo).unwrap();
        assert_eq!(format!("{table:?}"), "DispatchTable { commands: [255] }");
    }
}
