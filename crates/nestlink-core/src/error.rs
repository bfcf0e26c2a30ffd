// ── Core error types ──
//
// User-facing errors from nestlink-core. The `From<nestlink_api::Error>`
// impl folds transport-level detail into a handful of actionable cases;
// the exact upstream wording stays available through the bridge's
// `last_error()`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    /// The issue token / cookie pair no longer works.
    #[error("Login required: {message}")]
    LoginRequired { message: String },

    #[error("Cannot reach Nest: {reason}")]
    ConnectionFailed { reason: String },

    #[error("{message}")]
    Timeout { message: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Upstream ─────────────────────────────────────────────────────
    #[error("Nest API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Bridge has not been started")]
    NotStarted,

    #[error("Bridge is stopped")]
    Stopped,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether fresh login material has to be captured to recover.
    pub fn requires_new_login(&self) -> bool {
        matches!(self, Self::LoginRequired { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<nestlink_api::Error> for CoreError {
    fn from(err: nestlink_api::Error) -> Self {
        use nestlink_api::Error as Api;

        match err {
            Api::LoggedOut { .. } | Api::InvalidIssueToken { .. } | Api::NotAuthenticated => {
                CoreError::LoginRequired {
                    message: err.to_string(),
                }
            }
            Api::RequestTimedOut | Api::Timeout => CoreError::Timeout {
                message: err.to_string(),
            },
            Api::RequestConnection | Api::Connection(_) => CoreError::ConnectionFailed {
                reason: err.to_string(),
            },
            Api::RequestFailed { status }
            | Api::Status { status }
            | Api::DeviceStatus { status } => CoreError::Api {
                message: err.to_string(),
                status: Some(status),
            },
            Api::Transport(ref e) => CoreError::Api {
                message: err.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            Api::InvalidResponse { .. } => CoreError::Api {
                message: err.to_string(),
                status: None,
            },
            Api::UnknownDevice { id } => CoreError::DeviceNotFound { identifier: id },
            Api::Cancelled => CoreError::Stopped,
            Api::InvalidUrl(_) | Api::InvalidHeader { .. } | Api::Tls(_) => CoreError::Config {
                message: err.to_string(),
            },
        }
    }
}
