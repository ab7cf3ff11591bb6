use tracing::debug;

use crate::config::BoardConfig;
use crate::control::Controller;
use crate::dispatch::{CommandHandler, DispatchTable};
use crate::error::ConfigError;
use crate::handlers::{self, SAFE_COMMAND};
use crate::state::BoardState;

/// Everything a runtime needs to serve one board.
#[derive(Debug)]
pub struct Board {
    address: u8,
    table: DispatchTable,
    state: BoardState,
    controller: Controller,
}

impl Board {
    /// Assemble a board by hand. Prefer [`BoardBuilder`] when starting from a
    /// configuration.
    pub fn new(address: u8, table: DispatchTable, state: BoardState, controller: Controller) -> Self {
        Self {
            address,
            table,
            state,
            controller,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut DispatchTable, &mut BoardState, &Controller) {
        (&mut self.table, &mut self.state, &self.controller)
    }
}

/// Builds a [`Board`] with the standard handlers for its configuration.
///
/// ```
/// use cmdbus_slave::{BoardBuilder, BoardConfig, Reply};
///
/// let board = BoardBuilder::from_config(&BoardConfig::default())
///     .unwrap()
///     .register(100, |_: &mut cmdbus_slave::BoardState, _: u8, payload: i32| {
///         Reply::handled(payload * 2)
///     })
///     .unwrap()
///     .build();
/// assert!(board.table().contains(100));
/// ```
#[derive(Debug)]
pub struct BoardBuilder {
    config: BoardConfig,
    table: DispatchTable,
}

impl BoardBuilder {
    /// Validate `config` and register the emergency stop, one spin-motor
    /// handler per motor port, and any hanger, tray and encoder handlers it
    /// names.
    pub fn from_config(config: &BoardConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut table = DispatchTable::new();
        table.register(SAFE_COMMAND, handlers::safe)?;

        for port in config.motor_ports() {
            let command = handlers::spin_motor_command(port).ok_or_else(|| {
                ConfigError::Invalid(format!("motor port {port} has no free command id"))
            })?;
            table.register(command, handlers::spin_motor)?;
        }

        if let Some(hanger) = &config.hanger {
            table.register(hanger.command, handlers::serve_hanger)?;
        }

        if let Some(tray) = &config.tray {
            table.register(tray.command, handlers::load_tray)?;
        }

        for encoder in &config.encoders {
            table.register(encoder.command, handlers::read_encoder(encoder.port))?;
        }

        debug!(
            address = config.address,
            commands = ?table.command_ids(),
            "board dispatch table built"
        );

        Ok(Self {
            config: config.clone(),
            table,
        })
    }

    /// Add a board-specific handler. Ids already taken are refused.
    pub fn register<H>(mut self, command_id: u8, handler: H) -> Result<Self, ConfigError>
    where
        H: CommandHandler + 'static,
    {
        self.table.register(command_id, handler)?;
        Ok(self)
    }

    pub fn build(self) -> Board {
        Board {
            address: self.config.address,
            state: BoardState::new(&self.config),
            controller: Controller::new(&self.config),
            table: self.table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderConfig, HangerConfig, PortFunction, TrayConfig};
    use crate::error::DispatchError;

    #[test]
    fn default_board_registers_safe_and_motors() {
        let board = BoardBuilder::from_config(&BoardConfig::default())
            .unwrap()
            .build();
        assert_eq!(board.address(), 1);
        assert_eq!(board.table().command_ids(), vec![2, 3, 4, 5, 255]);
    }

    #[test]
    fn motor_commands_follow_port_index() {
        let config = BoardConfig {
            ports: vec![
                PortFunction::Encoder,
                PortFunction::Motor,
                PortFunction::Other,
                PortFunction::Motor,
            ],
            hanger: Some(HangerConfig {
                motor_port: 2,
                forward_limit: None,
                reverse_limit: None,
                ..HangerConfig::default()
            }),
            encoders: vec![EncoderConfig {
                command: 40,
                port: 0,
            }],
            ..BoardConfig::default()
        };
        let board = BoardBuilder::from_config(&config).unwrap().build();
        assert_eq!(board.table().command_ids(), vec![3, 5, 20, 40, 255]);
        assert!(board.state().hanger().is_some());
    }

    #[test]
    fn tray_board_registers_load_command() {
        let config = BoardConfig {
            ports: vec![PortFunction::Other, PortFunction::Motor],
            tray: Some(TrayConfig::default()),
            ..BoardConfig::default()
        };
        let board = BoardBuilder::from_config(&config).unwrap().build();
        assert_eq!(board.table().command_ids(), vec![3, 20, 255]);
        assert!(board.state().tray().is_some());
    }

    #[test]
    fn hanger_and_tray_on_one_id_collide() {
        let config = BoardConfig {
            ports: vec![PortFunction::Other, PortFunction::Other],
            hanger: Some(HangerConfig {
                forward_limit: None,
                reverse_limit: None,
                ..HangerConfig::default()
            }),
            tray: Some(TrayConfig::default()),
            ..BoardConfig::default()
        };
        assert!(matches!(
            BoardBuilder::from_config(&config),
            Err(ConfigError::Dispatch(DispatchError::DuplicateCommand(20)))
        ));
    }

    #[test]
    fn colliding_ids_fail_at_startup() {
        let config = BoardConfig {
            encoders: vec![EncoderConfig {
                command: 3,
                port: 0,
            }],
            ports: vec![PortFunction::Encoder, PortFunction::Motor],
            ..BoardConfig::default()
        };
        let err = BoardBuilder::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Dispatch(DispatchError::DuplicateCommand(3))
        ));
    }

    #[test]
    fn custom_handler_cannot_shadow_safe() {
        let err = BoardBuilder::from_config(&BoardConfig::default())
            .unwrap()
            .register(SAFE_COMMAND, handlers::spin_motor)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Dispatch(DispatchError::DuplicateCommand(SAFE_COMMAND))
        ));
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = BoardConfig {
            address: 0,
            ..BoardConfig::default()
        };
        assert!(matches!(
            BoardBuilder::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
