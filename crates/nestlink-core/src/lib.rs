//! Host-facing layer between `nestlink-api` and a home-automation host.
//!
//! - **[`Bridge`]**: context object for one Nest account. A single worker
//!   task drains a FIFO queue of refreshes and commands, so every Nest call
//!   runs in order and the client needs no locking. A ticker queues periodic
//!   refreshes; [`Bridge::oneshot()`] runs a single request-response cycle
//!   for CLI use.
//!
//! - **[`BridgeState`]**: the published, read-only projections from the last
//!   good refresh, with a `stale` marker when the latest refresh failed.
//!
//! - **[`Command`]**: typed thermostat changes routed through the queue.
//!
//! - **[`ErrorReporter`]**: cooldown that keeps a persistent failure from
//!   being reported on every poll.

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod model;
pub mod reporter;

pub use bridge::Bridge;
pub use command::{Command, CommandResult};
pub use config::BridgeConfig;
pub use error::CoreError;
pub use model::{BridgeState, Protect, Thermostat};
pub use reporter::ErrorReporter;

pub use nestlink_api::{DeviceInfo, EcoMode, ProtectInfo, SchemaVariant, ThermostatMode};
