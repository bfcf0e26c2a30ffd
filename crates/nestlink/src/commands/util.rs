//! Shared helpers for command handlers.

use nestlink_core::BridgeState;

use crate::error::CliError;

/// Resolve a thermostat key (id or room name) against a fresh state.
pub fn thermostat_id(state: &BridgeState, key: &str) -> Option<String> {
    state.find_thermostat(key).map(|t| t.id.clone())
}

pub fn thermostat_not_found(key: &str) -> CliError {
    CliError::NotFound {
        resource_type: "thermostat".into(),
        identifier: key.into(),
        list_command: "status".into(),
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
