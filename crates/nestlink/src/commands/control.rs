//! Thermostat control handlers: set-temp, away, eco, mode.

use nestlink_core::{
    Bridge, BridgeConfig, Command as CoreCommand, CommandResult, CoreError, ThermostatMode,
};

use crate::cli::{GlobalOpts, ModeArg, Switch};
use crate::error::CliError;

use super::util;

/// What the user asked for, before the device key is resolved to an id.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    SetTemp(f64),
    Away { state: Switch, no_eco: bool },
    Eco(Switch),
    Mode(ModeArg),
}

impl Action {
    fn into_command(self, device: String) -> CoreCommand {
        match self {
            Self::SetTemp(target) => CoreCommand::SetTemperature { device, target },
            Self::Away { state, no_eco } => CoreCommand::SetAway {
                device,
                away: state.is_on(),
                eco_when_away: no_eco.then_some(false),
            },
            Self::Eco(state) => CoreCommand::SetEcoMode {
                device,
                mode: state.into(),
            },
            Self::Mode(mode) => CoreCommand::SetThermostatMode {
                device,
                mode: mode.into(),
            },
        }
    }

    fn describe(self) -> String {
        match self {
            Self::SetTemp(target) => format!("target temperature set to {target}"),
            Self::Away { state, .. } if state.is_on() => "set to away".into(),
            Self::Away { .. } => "set to home".into(),
            Self::Eco(state) if state.is_on() => "eco mode on".into(),
            Self::Eco(_) => "eco mode off".into(),
            Self::Mode(mode) => format!("mode set to {}", ThermostatMode::from(mode)),
        }
    }

    fn validate(self) -> Result<(), CliError> {
        match self {
            Self::SetTemp(target) if !target.is_finite() => Err(CliError::Validation {
                field: "temperature".into(),
                reason: format!("'{target}' is not a temperature"),
            }),
            _ => Ok(()),
        }
    }
}

/// Refresh, resolve `key` (id or room name) and apply `action`.
///
/// Both tasks go through the same bridge queue, so the command sees the
/// snapshot the lookup was made against.
pub async fn handle(
    config: BridgeConfig,
    key: String,
    action: Action,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    action.validate()?;

    let lookup = key.clone();
    let result = Bridge::oneshot(config, |bridge| async move {
        let state = bridge.refresh().await?;
        let Some(device) = util::thermostat_id(&state, &lookup) else {
            return Ok(None);
        };
        let applied = bridge.execute(action.into_command(device)).await?;
        Ok::<_, CoreError>(Some(applied))
    })
    .await?;

    let Some(CommandResult::Applied { device }) = result else {
        return Err(util::thermostat_not_found(&key));
    };

    if !global.quiet {
        eprintln!("✓ {device}: {}", action.describe());
    }
    Ok(())
}
