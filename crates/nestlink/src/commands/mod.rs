//! Command dispatch for everything that talks to Nest.

pub mod config_cmd;
pub mod control;
pub mod status;
pub mod util;

use nestlink_core::BridgeConfig;

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

use self::control::Action;

pub async fn dispatch(
    cmd: Command,
    config: BridgeConfig,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::status(config, format, global).await,
        Command::Watch(args) => status::watch(config, &args, format, global).await,
        Command::SetTemp {
            device,
            temperature,
        } => control::handle(config, device, Action::SetTemp(temperature), global).await,
        Command::Away {
            device,
            state,
            no_eco,
        } => control::handle(config, device, Action::Away { state, no_eco }, global).await,
        Command::Eco { device, state } => {
            control::handle(config, device, Action::Eco(state), global).await
        }
        Command::Mode { device, mode } => {
            control::handle(config, device, Action::Mode(mode), global).await
        }
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not need a Nest connection".into(),
        }),
    }
}
