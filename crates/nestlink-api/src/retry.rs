// Bounded-retry HTTP wrapper
//
// Every call to the Nest endpoints after the initial token exchange goes
// through `RetryingHttpClient::send`. Failures are classified uniformly:
// 5xx and timeouts are retried after a fixed pause, 4xx aborts at once,
// and a stop signal prevents any further attempt.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::access_error::AccessError;
use crate::error::Error;
use crate::transport::TransportConfig;

/// A single request description, replayable across attempts.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    /// Overrides the client's per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post_json(url: Url, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body),
            timeout: None,
        }
    }

    /// Add a header. Fails if the value contains bytes HTTP does not allow.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, Error> {
        let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader {
            name: name.to_string(),
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add a header whose value must never show up in debug output.
    pub fn sensitive_header(mut self, name: HeaderName, value: &str) -> Result<Self, Error> {
        let mut value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader {
            name: name.to_string(),
        })?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client with bounded retries and uniform failure classification.
///
/// Cheap to clone: the underlying `reqwest::Client`, the stop token and the
/// access-error slot are all shared handles.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    http: reqwest::Client,
    timeout: Duration,
    backoff: Duration,
    cancel: CancellationToken,
    access_error: AccessError,
}

impl RetryingHttpClient {
    /// Build a client from a `TransportConfig`.
    pub fn new(
        transport: &TransportConfig,
        cancel: CancellationToken,
        access_error: AccessError,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, transport, cancel, access_error))
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        transport: &TransportConfig,
        cancel: CancellationToken,
        access_error: AccessError,
    ) -> Self {
        Self {
            http,
            timeout: transport.timeout,
            backoff: transport.retry_backoff,
            cancel,
            access_error,
        }
    }

    /// The underlying HTTP client (for calls that classify failures themselves).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn access_error(&self) -> &AccessError {
        &self.access_error
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send `request`, making at most `max_retries` attempts in total
    /// (the first attempt counts; `0` is treated as `1`).
    ///
    /// - HTTP 200: returns the response and clears the access error.
    /// - HTTP >= 500, timeout, connect failure: waits the fixed backoff and
    ///   tries again while attempts remain.
    /// - HTTP 4xx (and any other non-200 below 500): records the status and
    ///   returns immediately.
    /// - Stop signalled: returns [`Error::Cancelled`] without touching the
    ///   access error, abandoning an attempt that is still in flight.
    pub async fn send(
        &self,
        request: &HttpRequest,
        max_retries: u32,
    ) -> Result<reqwest::Response, Error> {
        let attempts = max_retries.max(1);
        let mut last_error = Error::Cancelled;

        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                debug!(url = %request.url, "stop requested, not sending");
                return Err(Error::Cancelled);
            }
            if attempt > 1 {
                debug!(attempt, url = %request.url, "retrying API request");
            }

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!(url = %request.url, "stop requested, abandoning request");
                    return Err(Error::Cancelled);
                }
                outcome = self.attempt(request) => outcome,
            };

            match outcome {
                Ok(resp) => {
                    self.access_error.clear();
                    return Ok(resp);
                }
                Err(err) => {
                    self.access_error.record(&err);
                    if !err.is_retryable() {
                        warn!(url = %request.url, error = %err, "request failed, not retrying");
                        return Err(err);
                    }
                    warn!(attempt, attempts, url = %request.url, error = %err, "request attempt failed");
                    last_error = err;
                }
            }

            if attempt < attempts {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(self.backoff) => {}
                }
            }
        }

        Err(last_error)
    }

    /// Send and decode a JSON body into `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &HttpRequest,
        max_retries: u32,
    ) -> Result<T, Error> {
        let resp = self.send(request, max_retries).await?;
        read_json(resp).await
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<reqwest::Response, Error> {
        trace!(method = %request.method, url = %request.url, "sending");

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(request.timeout.unwrap_or(self.timeout));
        if let Some(ref body) = request.body {
            // `json` keeps an explicit Content-Type already present in `headers`.
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(classify)?;
        match resp.status() {
            StatusCode::OK => Ok(resp),
            status => Err(Error::Status {
                status: status.as_u16(),
            }),
        }
    }
}

/// Map a reqwest send failure onto the retry taxonomy.
fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_connect() {
        Error::Connection(err.to_string())
    } else {
        Error::Transport(err)
    }
}

/// Read a response body and decode it as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(e)
        }
    })?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::invalid_response(format!("{e} (body preview: {preview:?})"))
    })
}
