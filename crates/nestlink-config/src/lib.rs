//! Configuration for the nestlink CLI.
//!
//! TOML profiles, login secret resolution (env + keyring + plaintext),
//! and translation to `nestlink_core::BridgeConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use nestlink_core::BridgeConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const KEYRING_SERVICE: &str = "nestlink";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured for profile '{profile}'")]
    NoCredentials { profile: String, secret: SecretKind },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named Nest account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Minutes between refreshes in `watch`. Zero disables polling.
    #[serde(default = "default_poll_minutes")]
    pub poll_minutes: u64,

    #[serde(default = "default_true")]
    pub eco_when_away: bool,

    #[serde(default = "default_error_cooldown_hours")]
    pub error_cooldown_hours: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            poll_minutes: default_poll_minutes(),
            eco_when_away: true,
            error_cooldown_hours: default_error_cooldown_hours(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_minutes() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_error_cooldown_hours() -> u64 {
    12
}

/// A named Nest account profile.
///
/// Both secrets come from a browser session on home.nest.com: the
/// `iframerpc?action=issueToken` request URL and the cookie sent with it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Issue-token URL (plaintext; prefer keyring or env var).
    pub issue_token: Option<String>,

    /// Environment variable name containing the issue-token URL.
    pub issue_token_env: Option<String>,

    /// Cookie (plaintext; prefer keyring or env var).
    pub cookie: Option<String>,

    /// Environment variable name containing the cookie.
    pub cookie_env: Option<String>,

    /// Path to an extra CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    pub poll_minutes: Option<u64>,
    pub eco_when_away: Option<bool>,
    pub timeout: Option<u64>,
}

/// The two login secrets a profile needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    IssueToken,
    Cookie,
}

impl SecretKind {
    /// Well-known environment variable, checked after the profile's own.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::IssueToken => "NEST_ISSUE_TOKEN",
            Self::Cookie => "NEST_COOKIE",
        }
    }

    /// Keyring entry name for `profile`.
    pub fn keyring_key(self, profile: &str) -> String {
        match self {
            Self::IssueToken => format!("{profile}/issue-token"),
            Self::Cookie => format!("{profile}/cookie"),
        }
    }

    fn profile_env(self, profile: &Profile) -> Option<&str> {
        match self {
            Self::IssueToken => profile.issue_token_env.as_deref(),
            Self::Cookie => profile.cookie_env.as_deref(),
        }
    }

    fn plaintext(self, profile: &Profile) -> Option<&str> {
        match self {
            Self::IssueToken => profile.issue_token.as_deref(),
            Self::Cookie => profile.cookie.as_deref(),
        }
    }
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::IssueToken => "issue token",
            Self::Cookie => "cookie",
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "nestlink", "nestlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("nestlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, layered over defaults and under `NESTLINK_*` env vars
/// (nested keys split on `__`, e.g. `NESTLINK_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NESTLINK_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file is missing or unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Store a login secret in the system keyring under `<profile>/<kind>`.
pub fn store_secret(profile_name: &str, kind: SecretKind, value: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_key(profile_name))?;
    entry.set_password(value)?;
    Ok(())
}

// ── Secret resolution (without CLI flags) ───────────────────────────

/// Resolve one login secret from the credential chain.
///
/// Order: the profile's `*_env` variable, the well-known `NEST_*`
/// variable, the system keyring, plaintext in the config file.
pub fn resolve_secret(
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
) -> Result<SecretString, ConfigError> {
    resolve_secret_with(
        profile,
        profile_name,
        kind,
        |name| std::env::var(name).ok(),
        |key| {
            keyring::Entry::new(KEYRING_SERVICE, key)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_secret_with(
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // A blank value at any step counts as unset and falls through.
    let found = kind
        .profile_env(profile)
        .and_then(&env)
        .filter(|v| is_set(v))
        .or_else(|| env(kind.env_var()).filter(|v| is_set(v)))
        .or_else(|| keyring(&kind.keyring_key(profile_name)).filter(|v| is_set(v)))
        .or_else(|| {
            kind.plaintext(profile)
                .filter(|v| is_set(v))
                .map(str::to_owned)
        });

    found
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            secret: kind,
        })
}

fn is_set(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Build a `BridgeConfig` from a profile, falling back to `defaults`.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let issue_token = resolve_secret(profile, profile_name, SecretKind::IssueToken)?;
    let cookie = resolve_secret(profile, profile_name, SecretKind::Cookie)?;
    apply_profile(BridgeConfig::new(issue_token, cookie), profile, defaults)
}

/// Apply a profile's tuning (and `defaults` where it is silent) to `config`.
pub fn apply_profile(
    mut config: BridgeConfig,
    profile: &Profile,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    config.timeout = Duration::from_secs(timeout);
    config.poll_interval = scaled_secs(
        profile.poll_minutes.unwrap_or(defaults.poll_minutes),
        60,
        "poll_minutes",
    )?;
    config.eco_when_away = profile.eco_when_away.unwrap_or(defaults.eco_when_away);
    config.error_cooldown =
        scaled_secs(defaults.error_cooldown_hours, 60 * 60, "error_cooldown_hours")?;
    config.ca_cert.clone_from(&profile.ca_cert);
    Ok(config)
}

/// `value * unit` seconds, rejecting values that overflow.
pub fn scaled_secs(value: u64, unit: u64, field: &str) -> Result<Duration, ConfigError> {
    value
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Validation {
            field: field.into(),
            reason: format!("{value} is too large"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn none(_: &str) -> Option<String> {
        None
    }

    fn profile() -> Profile {
        Profile {
            issue_token: Some("https://accounts.google.com/iframerpc?x=1".into()),
            issue_token_env: Some("HOME_NEST_TOKEN".into()),
            cookie: Some("SID=plain".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn profile_env_wins_over_everything() {
        let env = |name: &str| match name {
            "HOME_NEST_TOKEN" => Some("from-profile-env".to_owned()),
            "NEST_ISSUE_TOKEN" => Some("from-well-known-env".to_owned()),
            _ => None,
        };
        let secret =
            resolve_secret_with(&profile(), "home", SecretKind::IssueToken, env, |_| {
                Some("from-keyring".into())
            })
            .unwrap();
        assert_eq!(secret.expose_secret(), "from-profile-env");
    }

    #[test]
    fn keyring_wins_over_plaintext() {
        let secret = resolve_secret_with(&profile(), "home", SecretKind::Cookie, none, |key| {
            (key == "home/cookie").then(|| "SID=keyring".to_owned())
        })
        .unwrap();
        assert_eq!(secret.expose_secret(), "SID=keyring");
    }

    #[test]
    fn falls_back_to_plaintext() {
        let secret =
            resolve_secret_with(&profile(), "home", SecretKind::Cookie, none, none).unwrap();
        assert_eq!(secret.expose_secret(), "SID=plain");
    }

    #[test]
    fn missing_secret_names_profile_and_kind() {
        let err = resolve_secret_with(&Profile::default(), "away", SecretKind::Cookie, none, none)
            .unwrap_err();
        assert_eq!(err.to_string(), "no cookie configured for profile 'away'");
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let blank = Profile {
            cookie: Some("   ".into()),
            ..Profile::default()
        };
        let err =
            resolve_secret_with(&blank, "p", SecretKind::Cookie, none, none).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn blank_env_var_falls_through_to_plaintext() {
        let env = |name: &str| match name {
            "NEST_COOKIE" => Some(String::new()),
            _ => None,
        };
        let secret =
            resolve_secret_with(&profile(), "home", SecretKind::Cookie, env, none).unwrap();
        assert_eq!(secret.expose_secret(), "SID=plain");
    }

    #[test]
    fn blank_profile_env_falls_through_to_keyring() {
        let env = |name: &str| match name {
            "HOME_NEST_TOKEN" => Some("  ".into()),
            _ => None,
        };
        let secret = resolve_secret_with(&profile(), "home", SecretKind::IssueToken, env, |_| {
            Some("https://accounts.google.com/iframerpc?from=keyring".into())
        })
        .unwrap();
        assert_eq!(
            secret.expose_secret(),
            "https://accounts.google.com/iframerpc?from=keyring"
        );
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let base = || BridgeConfig::new(SecretString::from("t"), SecretString::from("c"));
        let huge_poll = Profile {
            poll_minutes: Some(u64::MAX),
            ..Profile::default()
        };
        let err = apply_profile(base(), &huge_poll, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "poll_minutes"));

        let defaults = Defaults {
            error_cooldown_hours: u64::MAX / 60,
            ..Defaults::default()
        };
        let err = apply_profile(base(), &Profile::default(), &defaults).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "error_cooldown_hours")
        );
    }

    #[test]
    fn profile_overrides_defaults() {
        let base = BridgeConfig::new(SecretString::from("t"), SecretString::from("c"));
        let overrides = Profile {
            poll_minutes: Some(0),
            eco_when_away: Some(false),
            timeout: Some(3),
            ..Profile::default()
        };
        let cfg = apply_profile(base, &overrides, &Defaults::default()).unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert!(cfg.poll_interval.is_zero());
        assert!(!cfg.eco_when_away);
        assert_eq!(cfg.error_cooldown, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn defaults_apply_when_profile_is_silent() {
        let base = BridgeConfig::new(SecretString::from("t"), SecretString::from("c"));
        let cfg = apply_profile(base, &Profile::default(), &Defaults::default()).unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.poll_interval, Duration::from_secs(300));
        assert!(cfg.eco_when_away);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let base = BridgeConfig::new(SecretString::from("t"), SecretString::from("c"));
        let bad = Profile {
            timeout: Some(0),
            ..Profile::default()
        };
        let err = apply_profile(base, &bad, &Defaults::default()).unwrap_err();
        assert_eq!(err.to_string(), "invalid timeout: must be at least 1 second");
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.defaults.output = "json".into();
        cfg.profiles.insert("home".into(), profile());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.defaults.output, "json");
        assert_eq!(loaded.profiles["home"], profile());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.defaults, Defaults::default());
        assert_eq!(loaded.default_profile.as_deref(), Some("default"));
    }

    #[test]
    fn partial_profile_table_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_profile = \"cabin\"\n\n[profiles.cabin]\ncookie_env = \"CABIN_COOKIE\"\npoll_minutes = 15\n",
        )
        .unwrap();

        let loaded = load_config_from(&path).unwrap();
        let cabin = &loaded.profiles["cabin"];
        assert_eq!(loaded.default_profile.as_deref(), Some("cabin"));
        assert_eq!(cabin.cookie_env.as_deref(), Some("CABIN_COOKIE"));
        assert_eq!(cabin.poll_minutes, Some(15));
        assert_eq!(loaded.defaults.timeout, 10);
    }
}
