// Nest status client
//
// Wraps the session manager and the retrying transport: fetches the status
// snapshot, keeps the discovered device lists, and answers projection
// queries. Mutations live in `mutations.rs`.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::access_error::AccessError;
use crate::auth::{Clock, Credentials, IssueCredentials, SessionManager, SessionState};
use crate::endpoints::{Endpoints, transport_endpoint};
use crate::error::Error;
use crate::retry::{HttpRequest, RetryingHttpClient, read_json};
use crate::snapshot::{DeviceInfo, Discovery, ProtectInfo, SchemaVariant, Snapshot};
use crate::transport::TransportConfig;

/// Attempts for a snapshot fetch; the caller's poll cadence is the retry.
const FETCH_RETRIES: u32 = 1;
/// Default attempts for a mutation POST.
const MUTATION_RETRIES: u32 = 1;

/// Client for one Nest account.
///
/// Not internally synchronized: exactly one task is expected to drive it.
#[derive(Debug)]
pub struct NestClient {
    pub(crate) session: SessionManager,
    pub(crate) http: RetryingHttpClient,
    pub(crate) snapshot: Snapshot,
    discovery: Discovery,
    pub(crate) mutation_retries: u32,
}

impl NestClient {
    /// Build a client with its own HTTP client, stop token and error slot.
    pub fn new(
        login: IssueCredentials,
        transport: &TransportConfig,
        endpoints: Endpoints,
    ) -> Result<Self, Error> {
        let http = RetryingHttpClient::new(transport, CancellationToken::new(), AccessError::new())?;
        Ok(Self::with_http(login, endpoints, http))
    }

    /// Build a client around an existing retrying transport.
    pub fn with_http(login: IssueCredentials, endpoints: Endpoints, http: RetryingHttpClient) -> Self {
        Self {
            session: SessionManager::new(login, endpoints, http.clone()),
            http,
            snapshot: Snapshot::default(),
            discovery: Discovery::default(),
            mutation_retries: MUTATION_RETRIES,
        }
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: self.session.with_clock(clock),
            ..self
        }
    }

    /// Attempts per mutation POST (the first attempt counts).
    pub fn with_mutation_retries(mut self, retries: u32) -> Self {
        self.mutation_retries = retries;
        self
    }

    /// Token that aborts in-flight and future requests when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.http.cancellation_token().clone()
    }

    pub fn access_error(&self) -> &AccessError {
        self.http.access_error()
    }

    /// The last recorded error text, or `"All good"`.
    pub fn last_error(&self) -> String {
        self.http.access_error().message()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.session.credentials()
    }

    pub async fn ensure_session(&mut self) -> Result<(), Error> {
        self.session.ensure_session().await
    }

    /// Clear the last error, then fetch a fresh snapshot.
    pub async fn update_devices(&mut self) -> Result<&Discovery, Error> {
        self.http.access_error().clear();
        self.fetch_snapshot().await
    }

    /// Fetch the status snapshot and rebuild the device lists.
    ///
    /// Succeeds whenever the HTTP call does, even if no known layout
    /// matched (the lists are then empty).
    pub async fn fetch_snapshot(&mut self) -> Result<&Discovery, Error> {
        self.session.ensure_session().await?;
        let raw = self.get_status().await;
        let raw = self.recorded(raw)?;

        let user_id = self
            .session
            .credentials()
            .map(|c| c.user_id.clone())
            .unwrap_or_default();
        self.snapshot = Snapshot::new(raw);
        self.discovery = self.snapshot.discover(&user_id);

        info!(
            variant = ?self.discovery.variant,
            devices = self.discovery.devices.len(),
            protects = self.discovery.protects.len(),
            "got devices and status"
        );
        Ok(&self.discovery)
    }

    async fn get_status(&self) -> Result<Value, Error> {
        let creds = self.session.credentials().ok_or(Error::NotAuthenticated)?;
        let url = transport_endpoint(
            &creds.transport_url,
            &format!("v3/mobile/{}", creds.user_bucket),
        )?;
        let request = creds.authorize(HttpRequest::get(url))?;

        debug!(bucket = %creds.user_bucket, "fetching status snapshot");
        let resp = self
            .http
            .send(&request, FETCH_RETRIES)
            .await
            .map_err(|err| match err {
                Error::Status { status } => Error::DeviceStatus { status },
                other => other,
            })?;
        read_json(resp).await
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Thermostat ids, in snapshot order.
    pub fn device_list(&self) -> &[String] {
        &self.discovery.devices
    }

    /// Protect ids, in snapshot order.
    pub fn protect_list(&self) -> &[String] {
        &self.discovery.protects
    }

    pub fn schema_variant(&self) -> Option<SchemaVariant> {
        self.discovery.variant
    }

    pub fn device_info(&self, device: &str) -> Option<DeviceInfo> {
        self.snapshot.device_info(device)
    }

    pub fn protect_info(&self, protect: &str) -> Option<ProtectInfo> {
        self.snapshot.protect_info(protect)
    }

    /// Stop all network activity. Later calls fail with [`Error::Cancelled`].
    pub fn shutdown(&mut self) {
        self.session.stop();
    }

    /// Forget the cached session; the next call re-runs the exchange.
    pub fn logout(&mut self) {
        self.session.forget();
    }

    /// Record a failure in the access-error slot and pass it on.
    pub(crate) fn recorded<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(ref err) = result {
            self.http.access_error().record(err);
        }
        result
    }
}
