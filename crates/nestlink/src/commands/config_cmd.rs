//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Select};
use nestlink_config::SecretKind;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

// ── Helpers ─────────────────────────────────────────────────────────

/// Mask the plaintext secrets of every profile.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.issue_token.is_some() {
            profile.issue_token = Some("****".into());
        }
        if profile.cookie.is_some() {
            profile.cookie = Some("****".into());
        }
    }
    cfg
}

/// TOML-ish rendering for `config show` in table mode.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out, "\n[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "timeout = {}", d.timeout);
    let _ = writeln!(out, "poll_minutes = {}", d.poll_minutes);
    let _ = writeln!(out, "eco_when_away = {}", d.eco_when_away);
    let _ = writeln!(out, "error_cooldown_hours = {}", d.error_cooldown_hours);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out, "\n[profiles.{name}]");
        if let Some(ref token) = p.issue_token {
            let _ = writeln!(out, "issue_token = \"{token}\"");
        }
        if let Some(ref env) = p.issue_token_env {
            let _ = writeln!(out, "issue_token_env = \"{env}\"");
        }
        if let Some(ref cookie) = p.cookie {
            let _ = writeln!(out, "cookie = \"{cookie}\"");
        }
        if let Some(ref env) = p.cookie_env {
            let _ = writeln!(out, "cookie_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(minutes) = p.poll_minutes {
            let _ = writeln!(out, "poll_minutes = {minutes}");
        }
        if let Some(eco) = p.eco_when_away {
            let _ = writeln!(out, "eco_when_away = {eco}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out.trim_end().to_owned()
}

/// Prompt for a secret and either store it in the keyring (returns `None`)
/// or hand it back for the plaintext config.
fn prompt_secret(profile_name: &str, kind: SecretKind, prompt: &str) -> Result<Option<String>, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    let secret = secret.trim().to_owned();
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: kind.to_string(),
            reason: "value cannot be empty".into(),
        });
    }

    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {kind}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_secret(profile_name, kind, &secret)?;
        eprintln!("   ✓ {kind} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let format = config::output_format(global, &cfg);
            let out = match format {
                OutputFormat::Plain => cfg
                    .profiles
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => output::render_single(format, &cfg, format_config, |_| String::new()),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("nestlink configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());
    eprintln!("   Sign in at https://home.nest.com in a browser, open the developer");
    eprintln!("   tools network tab and find the `iframerpc?action=issueToken` request.");
    eprintln!("   You need its full URL and the `cookie` request header.\n");

    let mut cfg = config::load_config_or_default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(config::active_profile_name(global, &cfg))
        .interact_text()
        .map_err(prompt_err)?;

    let issue_token = prompt_secret(&profile_name, SecretKind::IssueToken, "Issue-token URL: ")?;
    let cookie = prompt_secret(&profile_name, SecretKind::Cookie, "Cookie: ")?;

    let poll_minutes: u64 = Input::new()
        .with_prompt("Minutes between refreshes in `watch`")
        .default(cfg.defaults.poll_minutes)
        .interact_text()
        .map_err(prompt_err)?;

    let eco_when_away = Confirm::new()
        .with_prompt("Switch thermostats to eco when away?")
        .default(cfg.defaults.eco_when_away)
        .interact()
        .map_err(prompt_err)?;

    let profile = Profile {
        issue_token,
        cookie,
        poll_minutes: (poll_minutes != cfg.defaults.poll_minutes).then_some(poll_minutes),
        eco_when_away: (eco_when_away != cfg.defaults.eco_when_away).then_some(eco_when_away),
        ..Profile::default()
    };
    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: nestlink status --profile {profile_name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_secrets() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                issue_token: Some("https://accounts.google.com/o/oauth2/iframerpc?secret".into()),
                cookie: Some("SID=secret".into()),
                cookie_env: Some("HOME_COOKIE".into()),
                ..Profile::default()
            },
        );

        let text = format_config(&redacted(&cfg));
        assert!(!text.contains("secret"));
        assert!(text.contains("[profiles.home]"));
        assert!(text.contains("cookie = \"****\""));
        assert!(text.contains("cookie_env = \"HOME_COOKIE\""));
    }
}
