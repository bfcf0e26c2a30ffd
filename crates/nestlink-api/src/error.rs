use thiserror::Error;

/// Top-level error type for the `nestlink-api` crate.
///
/// The `Display` text of each variant doubles as the operator-facing
/// "access error" string recorded in [`AccessError`](crate::AccessError),
/// so the wording is kept short and stable.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session exchange ────────────────────────────────────────────
    /// The Google session behind the issue token has been logged out.
    /// Fresh issue-token / cookie values have to be captured again.
    #[error("API returned error: {detail}")]
    LoggedOut { detail: String },

    /// The token endpoint rejected the issue token or cookie.
    #[error("Invalid IssueToken/Cookie: {error} ({detail})")]
    InvalidIssueToken { error: String, detail: String },

    /// The token exchange request timed out.
    #[error("API request timed out")]
    RequestTimedOut,

    /// The token exchange request could not reach the server.
    #[error("Connection error API request")]
    RequestConnection,

    /// The token exchange returned a non-success status.
    #[error("API request failed (status {status})")]
    RequestFailed { status: u16 },

    /// No usable session; the caller has to establish one first.
    #[error("No valid Nest session")]
    NotAuthenticated,

    // ── Retrying transport ──────────────────────────────────────────
    /// A request attempt timed out (connect or read).
    #[error("Connection timeout")]
    Timeout,

    /// A request attempt failed to connect.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A request completed with a non-200 status.
    #[error("API response status code {status}")]
    Status { status: u16 },

    /// The status endpoint answered with a non-200 status.
    #[error("Error getting device information (http status {status})")]
    DeviceStatus { status: u16 },

    /// The owning session was stopped; no further attempts are made.
    #[error("Request cancelled: session is shutting down")]
    Cancelled,

    /// Any other HTTP client failure (request building, body streaming).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header value could not be encoded.
    #[error("Invalid value for header {name}")]
    InvalidHeader { name: String },

    /// TLS / client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// The response body was not the JSON shape we expected.
    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },

    /// A command named a device that is not in the current snapshot.
    #[error("Unknown device: {id}")]
    UnknownDevice { id: String },
}

impl Error {
    /// Returns `true` if another attempt of the same request may succeed.
    ///
    /// Timeouts, connection failures and 5xx statuses are transient;
    /// 4xx statuses and malformed bodies are terminal for the call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) => true,
            Self::Status { status } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the issue token / cookie pair must be replaced.
    /// This system cannot recover from these on its own.
    pub fn requires_new_login(&self) -> bool {
        matches!(self, Self::LoggedOut { .. } | Self::InvalidIssueToken { .. })
    }

    /// The HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status }
            | Self::RequestFailed { status }
            | Self::DeviceStatus { status } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
