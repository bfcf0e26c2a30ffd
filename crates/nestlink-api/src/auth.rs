// Session establishment
//
// Three sequential exchanges turn the long-lived issue-token URL and Google
// cookie into a usable Nest session:
//
//   1. issue-token + cookie   -> short-lived bearer token
//   2. bearer token           -> Nest user id + session JWT + expiry
//   3. session JWT            -> transport URL + user bucket key
//
// The resulting `Credentials` are committed only when all three succeed,
// so a failed refresh never overwrites a previous session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderName, HeaderValue, REFERER};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::endpoints::Endpoints;
use crate::models::{AppLaunchResponse, IssueTokenResponse, JwtResponse};
use crate::retry::{HttpRequest, RetryingHttpClient};

/// Attempts for the JWT and app-launch steps.
const EXCHANGE_RETRIES: u32 = 2;

const ISSUE_TOKEN_REFERER: &str = "https://accounts.google.com/o/oauth2/iframe";
const LOGGED_OUT: &str = "USER_LOGGED_OUT";

// ── Inputs ──────────────────────────────────────────────────────────

/// The externally captured Google login material.
///
/// Obtained once from a browser session; this system can use it but never
/// renew it.
#[derive(Debug, Clone)]
pub struct IssueCredentials {
    /// Full `iframerpc` issue-token request URL.
    pub issue_token: SecretString,
    /// The `oauth2/iframe` cookie header value.
    pub cookie: SecretString,
}

impl IssueCredentials {
    pub fn new(issue_token: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            issue_token: SecretString::from(issue_token.into()),
            cookie: SecretString::from(cookie.into()),
        }
    }
}

// ── Session material ────────────────────────────────────────────────

/// A complete, time-boxed Nest session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub bearer_token: SecretString,
    pub bearer_token_type: String,
    pub id_token: SecretString,
    pub user_id: String,
    /// Session JWT, sent as `Authorization: Basic <token>`.
    pub session_token: SecretString,
    pub transport_url: String,
    /// Canonical user bucket key, e.g. `user.123456`.
    pub user_bucket: String,
    /// Server expiry expressed in the local offset at fetch time.
    pub expiry: DateTime<FixedOffset>,
}

impl Credentials {
    /// Whether the session is still usable at `now`.
    pub fn is_valid_at(&self, now: &DateTime<FixedOffset>) -> bool {
        *now < self.expiry
    }

    /// Add the Nest session headers to `request`.
    pub fn authorize(&self, request: HttpRequest) -> Result<HttpRequest, Error> {
        authorize(request, &self.user_id, &self.session_token)
    }
}

fn authorize(
    request: HttpRequest,
    user_id: &str,
    session_token: &SecretString,
) -> Result<HttpRequest, Error> {
    let has_body = request.body.is_some();
    let request = request
        .header(HeaderName::from_static("x-nl-protocol-version"), "1")?
        .header(HeaderName::from_static("x-nl-user-id"), user_id)?
        .sensitive_header(
            AUTHORIZATION,
            &format!("Basic {}", session_token.expose_secret()),
        )?;
    if has_body {
        request.header(reqwest::header::CONTENT_TYPE, "text/json")
    } else {
        Ok(request)
    }
}

/// Lifecycle of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable session (initial, or the last refresh failed).
    Unauthenticated,
    /// A refresh is in progress.
    Authenticating,
    Authenticated,
    /// Shut down; no further requests are made.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Stopped => "stopped",
        })
    }
}

// ── Clock ───────────────────────────────────────────────────────────

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        DateTime::<FixedOffset>::from(Local::now())
    }
}

// ── Exchange intermediates ──────────────────────────────────────────

struct BearerToken {
    token: SecretString,
    token_type: String,
    id_token: SecretString,
}

struct IssuedJwt {
    user_id: String,
    session_token: SecretString,
    expiration_time: String,
}

struct UserLaunch {
    transport_url: String,
    user_bucket: String,
}

// ── SessionManager ──────────────────────────────────────────────────

/// Owns the credential exchange and the expiry-tracked session cache.
#[derive(Debug)]
pub struct SessionManager {
    login: IssueCredentials,
    endpoints: Endpoints,
    http: RetryingHttpClient,
    clock: Arc<dyn Clock>,
    credentials: Option<Credentials>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(login: IssueCredentials, endpoints: Endpoints, http: RetryingHttpClient) -> Self {
        Self {
            login,
            endpoints,
            http,
            clock: Arc::new(SystemClock),
            credentials: None,
            state: SessionState::Unauthenticated,
        }
    }

    /// Replace the clock used for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The last successfully established session, possibly expired.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// `true` when no session exists yet or `now >= expiry`.
    pub fn needs_refresh(&self) -> bool {
        let now = self.clock.now();
        self.credentials
            .as_ref()
            .is_none_or(|creds| !creds.is_valid_at(&now))
    }

    /// Make sure a valid session exists, running the exchange if needed.
    ///
    /// A valid cached session is reused without any request. On failure the
    /// error is recorded in the shared access-error slot and any previous
    /// credentials are left exactly as they were.
    pub async fn ensure_session(&mut self) -> Result<(), Error> {
        if self.http.is_cancelled() {
            self.state = SessionState::Stopped;
            return Err(Error::Cancelled);
        }
        if !self.needs_refresh() {
            self.state = SessionState::Authenticated;
            return Ok(());
        }

        debug!("session missing or expired, refreshing");
        self.state = SessionState::Authenticating;

        match self.refresh().await {
            Ok(creds) => {
                info!(user_id = %creds.user_id, expiry = %creds.expiry, "Nest session established");
                self.credentials = Some(creds);
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Err(err) => {
                self.http.access_error().record(&err);
                self.state = if matches!(err, Error::Cancelled) {
                    SessionState::Stopped
                } else {
                    SessionState::Unauthenticated
                };
                warn!(error = %err, "session refresh failed");
                Err(err)
            }
        }
    }

    /// Signal shutdown: in-flight and future requests abort.
    pub fn stop(&mut self) {
        self.http.cancellation_token().cancel();
        self.state = SessionState::Stopped;
    }

    /// Drop the cached session (best-effort teardown; Nest has no logout call).
    pub fn forget(&mut self) {
        if self.credentials.take().is_some() {
            debug!("session credentials discarded");
        }
        if self.state != SessionState::Stopped {
            self.state = SessionState::Unauthenticated;
        }
    }

    async fn refresh(&self) -> Result<Credentials, Error> {
        let bearer = self.fetch_bearer_token().await?;
        let jwt = self.issue_jwt(&bearer).await?;
        let launch = self.app_launch(&jwt).await?;

        let now = self.clock.now();
        let expiry = parse_expiry(&jwt.expiration_time, now.offset())?;

        Ok(Credentials {
            bearer_token: bearer.token,
            bearer_token_type: bearer.token_type,
            id_token: bearer.id_token,
            user_id: jwt.user_id,
            session_token: jwt.session_token,
            transport_url: launch.transport_url,
            user_bucket: launch.user_bucket,
            expiry,
        })
    }

    /// Step 1: issue-token URL + cookie -> bearer token.
    ///
    /// Sent once (no retry). Each failure mode maps to its own message.
    async fn fetch_bearer_token(&self) -> Result<BearerToken, Error> {
        if self.http.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let url = Url::parse(self.login.issue_token.expose_secret())?;
        let mut cookie =
            HeaderValue::from_str(self.login.cookie.expose_secret()).map_err(|_| {
                Error::InvalidHeader {
                    name: COOKIE.to_string(),
                }
            })?;
        cookie.set_sensitive(true);

        debug!("requesting bearer token");

        let request = self
            .http
            .http()
            .get(url)
            .header("Sec-Fetch-Mode", "cors")
            .header("X-Requested-With", "XmlHttpRequest")
            .header(REFERER, ISSUE_TOKEN_REFERER)
            .header(COOKIE, cookie)
            .timeout(self.http.timeout());

        let exchange = async {
            let resp = request.send().await.map_err(classify_exchange)?;
            let status = resp.status();
            if status.is_client_error() || status.is_server_error() {
                return Err(Error::RequestFailed {
                    status: status.as_u16(),
                });
            }
            resp.text().await.map_err(classify_exchange)
        };
        let body = tokio::select! {
            biased;
            () = self.http.cancellation_token().cancelled() => return Err(Error::Cancelled),
            body = exchange => body?,
        };
        let token: IssueTokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::invalid_response(format!("issue token: {e}")))?;

        if let (Some(error), Some(detail)) = (token.error, token.detail) {
            let detail = match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(if error == LOGGED_OUT {
                Error::LoggedOut { detail }
            } else {
                Error::InvalidIssueToken { error, detail }
            });
        }

        match (token.access_token, token.token_type, token.id_token) {
            (Some(access), Some(token_type), Some(id_token)) => {
                self.http.access_error().clear();
                debug!("got bearer token");
                Ok(BearerToken {
                    token: SecretString::from(access),
                    token_type,
                    id_token: SecretString::from(id_token),
                })
            }
            _ => Err(Error::invalid_response(
                "issue token: missing access_token, token_type or id_token",
            )),
        }
    }

    /// Step 2: bearer token -> user id, session JWT, expiry text.
    async fn issue_jwt(&self, bearer: &BearerToken) -> Result<IssuedJwt, Error> {
        let body = json!({
            "embed_google_oauth_access_token": true,
            "expire_after": "3600s",
            "google_oauth_access_token": bearer.token.expose_secret(),
            "policy_id": "authproxy-oauth-policy",
        });
        let request = HttpRequest::post_json(self.endpoints.jwt_url.clone(), body)
            .sensitive_header(
                AUTHORIZATION,
                &format!("{} {}", bearer.token_type, bearer.token.expose_secret()),
            )?
            .header(
                HeaderName::from_static("x-goog-api-key"),
                &self.endpoints.api_key,
            )?
            .header(REFERER, self.endpoints.referer())?;

        let resp: JwtResponse = self.http.send_json(&request, EXCHANGE_RETRIES).await?;
        debug!("got access token and user id");

        Ok(IssuedJwt {
            user_id: resp.claims.subject.nest_id.id,
            session_token: SecretString::from(resp.jwt),
            expiration_time: resp.claims.expiration_time,
        })
    }

    /// Step 3: session JWT -> transport URL and user bucket.
    async fn app_launch(&self, jwt: &IssuedJwt) -> Result<UserLaunch, Error> {
        let url = self.endpoints.app_launch_url(&jwt.user_id)?;
        let body = json!({
            "known_bucket_types": ["user"],
            "known_bucket_versions": [],
        });
        let request = authorize(
            HttpRequest::post_json(url, body),
            &jwt.user_id,
            &jwt.session_token,
        )?;

        let resp: AppLaunchResponse = self.http.send_json(&request, EXCHANGE_RETRIES).await?;
        let user_bucket = resp.user_bucket(&jwt.user_id);
        debug!(%user_bucket, "got user");

        Ok(UserLaunch {
            transport_url: resp.service_urls.urls.transport_url,
            user_bucket,
        })
    }
}

fn classify_exchange(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::RequestTimedOut
    } else if err.is_connect() {
        Error::RequestConnection
    } else if let Some(status) = err.status() {
        Error::RequestFailed {
            status: status.as_u16(),
        }
    } else {
        Error::Transport(err)
    }
}

/// Parse the server's UTC expiry text and express it in `offset`.
fn parse_expiry(text: &str, offset: &FixedOffset) -> Result<DateTime<FixedOffset>, Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(offset))
        .map_err(|e| Error::invalid_response(format!("expirationTime {text:?}: {e}")))
}
