//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use nestlink_config::ConfigError;
use nestlink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Nest service")]
    #[diagnostic(
        code(nestlink::connection_failed),
        help("Check your network connection.\nDetail: {reason}")
    )]
    ConnectionFailed { reason: String },

    #[error("{message}")]
    #[diagnostic(
        code(nestlink::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Nest login failed: {message}")]
    #[diagnostic(
        code(nestlink::login_required),
        help(
            "The issue token or cookie has expired. Capture fresh values from a\n\
             signed-in home.nest.com browser session and run: nestlink config init"
        )
    )]
    LoginRequired { message: String },

    #[error("No {secret} configured for profile '{profile}'")]
    #[diagnostic(
        code(nestlink::no_credentials),
        help(
            "Configure credentials with: nestlink config init\n\
             Or set the NEST_ISSUE_TOKEN and NEST_COOKIE environment variables."
        )
    )]
    NoCredentials { profile: String, secret: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(nestlink::not_found),
        help("Run: nestlink {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Nest API error: {message}")]
    #[diagnostic(code(nestlink::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    #[error("{message}")]
    #[diagnostic(code(nestlink::internal))]
    Internal { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nestlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(nestlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: nestlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(nestlink::config))]
    Config(Box<ConfigError>),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::LoginRequired { .. }
            | Self::NoCredentials { .. }
            | Self::ApiError {
                status: Some(401 | 403),
                ..
            } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile, secret } => CliError::NoCredentials {
                profile,
                secret: secret.to_string(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LoginRequired { message } => CliError::LoginRequired { message },

            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::Timeout { message } => CliError::Timeout { message },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "thermostat".into(),
                identifier,
                list_command: "status".into(),
            },

            CoreError::Api { message, status } => CliError::ApiError { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            err @ (CoreError::NotStarted | CoreError::Stopped | CoreError::Internal(_)) => {
                CliError::Internal {
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_errors_exit_with_auth_code() {
        let err = CliError::from(CoreError::LoginRequired {
            message: "API returned error: No active session found.".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn unknown_device_points_at_status() {
        let err = CliError::from(CoreError::DeviceNotFound {
            identifier: "Attic".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "thermostat 'Attic' not found");
    }

    #[test]
    fn missing_secret_maps_to_no_credentials() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "home".into(),
            secret: nestlink_config::SecretKind::Cookie,
        });
        assert_eq!(err.to_string(), "No cookie configured for profile 'home'");
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
