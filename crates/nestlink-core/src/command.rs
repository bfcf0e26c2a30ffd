// ── Command API ──
//
// All thermostat changes flow through a unified `Command` enum and the
// bridge's single worker, so they run in order with status refreshes.

use nestlink_api::{EcoMode, ThermostatMode};

use crate::error::CoreError;

/// A command envelope sent through the task queue.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against a Nest account. `device` is a thermostat id.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetTemperature {
        device: String,
        target: f64,
    },
    SetAway {
        device: String,
        away: bool,
        /// `None` uses the bridge's configured default.
        eco_when_away: Option<bool>,
    },
    SetEcoMode {
        device: String,
        mode: EcoMode,
    },
    SetThermostatMode {
        device: String,
        mode: ThermostatMode,
    },
}

impl Command {
    pub fn device(&self) -> &str {
        match self {
            Self::SetTemperature { device, .. }
            | Self::SetAway { device, .. }
            | Self::SetEcoMode { device, .. }
            | Self::SetThermostatMode { device, .. } => device,
        }
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Accepted by Nest for this thermostat.
    Applied { device: String },
}
