// nestlink-api: Async Rust client for the Nest cloud API
//
// Session exchange (issue token -> bearer -> JWT -> transport URL), a
// bounded-retry transport, status snapshot parsing, and thermostat commands.

pub mod access_error;
pub mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
mod models;
pub mod mutations;
pub mod retry;
pub mod rooms;
pub mod snapshot;
pub mod transport;

pub use access_error::{AccessError, NO_ERROR};
pub use auth::{Clock, Credentials, IssueCredentials, SessionManager, SessionState, SystemClock};
pub use client::NestClient;
pub use endpoints::Endpoints;
pub use error::Error;
pub use mutations::{EcoMode, ThermostatMode};
pub use retry::{HttpRequest, RetryingHttpClient};
pub use snapshot::{DeviceInfo, Discovery, ProtectInfo, SchemaVariant, Snapshot};
pub use transport::TransportConfig;
