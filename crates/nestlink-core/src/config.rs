// ── Runtime bridge configuration ──
//
// Describes *how* to talk to Nest and how often. Carries the captured
// login material and tuning knobs, but never touches disk: the CLI builds
// a `BridgeConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use nestlink_api::{Endpoints, IssueCredentials, TransportConfig};
use secrecy::SecretString;

/// Configuration for one Nest account bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Issue-token request URL captured from the browser.
    pub issue_token: SecretString,
    /// Google `oauth2/iframe` cookie captured from the browser.
    pub cookie: SecretString,
    pub endpoints: Endpoints,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Pause between retry attempts.
    pub retry_backoff: Duration,
    /// Extra root certificate (PEM).
    pub ca_cert: Option<PathBuf>,
    /// Time between periodic refreshes. Zero disables the poller; the
    /// caller then drives refreshes itself.
    pub poll_interval: Duration,
    /// Switch thermostats to eco when the structure is set away.
    pub eco_when_away: bool,
    /// Minimum time between two operator-visible error reports.
    pub error_cooldown: Duration,
    /// How long shutdown waits for the worker to exit.
    pub shutdown_grace: Duration,
}

impl BridgeConfig {
    pub fn new(issue_token: SecretString, cookie: SecretString) -> Self {
        Self {
            issue_token,
            cookie,
            endpoints: Endpoints::default(),
            timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(500),
            ca_cert: None,
            poll_interval: Duration::from_secs(5 * 60),
            eco_when_away: true,
            error_cooldown: Duration::from_secs(12 * 60 * 60),
            shutdown_grace: Duration::from_secs(70),
        }
    }

    pub(crate) fn login(&self) -> IssueCredentials {
        IssueCredentials {
            issue_token: self.issue_token.clone(),
            cookie: self.cookie.clone(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            ca_cert: self.ca_cert.clone(),
            ..TransportConfig::default()
        }
        .with_timeout(self.timeout)
        .with_retry_backoff(self.retry_backoff)
    }
}
