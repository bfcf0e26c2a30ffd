//! CLI configuration: thin wrapper around `nestlink_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--issue-token, --cookie, --timeout).

use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use nestlink_config::{SecretKind, apply_profile, resolve_secret};
use nestlink_core::BridgeConfig;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use nestlink_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_secret,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag > config default > table.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&config.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}

/// Build a `BridgeConfig` from the config file, profile, and CLI overrides.
///
/// A named profile that does not exist is an error. The implicit default
/// profile may be absent; its secrets then come from flags, env or keyring.
pub fn bridge_config(global: &GlobalOpts, config: &Config) -> Result<BridgeConfig, CliError> {
    let profile_name = active_profile_name(global, config);
    let profile = match config.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(profile_not_found(&profile_name, config));
        }
        None => Profile::default(),
    };

    let issue_token = secret_with_flag(
        global.issue_token.as_deref(),
        &profile,
        &profile_name,
        SecretKind::IssueToken,
    )?;
    let cookie = secret_with_flag(
        global.cookie.as_deref(),
        &profile,
        &profile_name,
        SecretKind::Cookie,
    )?;

    let mut bridge = apply_profile(
        BridgeConfig::new(issue_token, cookie),
        &profile,
        &config.defaults,
    )?;
    if let Some(timeout) = global.timeout {
        if timeout == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        bridge.timeout = Duration::from_secs(timeout);
    }
    Ok(bridge)
}

/// CLI flag first, then the shared resolution chain.
fn secret_with_flag(
    flag: Option<&str>,
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
) -> Result<SecretString, CliError> {
    if let Some(value) = flag.filter(|v| !v.trim().is_empty()) {
        return Ok(SecretString::from(value.to_owned()));
    }
    Ok(resolve_secret(profile, profile_name, kind)?)
}

pub fn profile_not_found(name: &str, config: &Config) -> CliError {
    let mut available: Vec<_> = config.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name: name.into(),
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}
