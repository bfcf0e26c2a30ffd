// ── Bridge ──
//
// Context object for one Nest account. All Nest traffic happens on a single
// worker task that drains a FIFO task queue: periodic refreshes from the
// ticker and commands from callers are executed strictly in enqueue order,
// so the client and its session need no locking. Readers get the published
// `BridgeState` through a watch channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nestlink_api::{AccessError, NestClient};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::model::{BridgeState, Protect, Thermostat};
use crate::reporter::ErrorReporter;

const TASK_QUEUE_SIZE: usize = 64;

type RefreshReply = oneshot::Sender<Result<Arc<BridgeState>, CoreError>>;

enum Task {
    Refresh {
        /// Set for caller-requested refreshes.
        reply: Option<RefreshReply>,
        /// Scheduled by the ticker (drives the error-report cooldown).
        periodic: bool,
    },
    Command(CommandEnvelope),
    /// Poison: tear the session down and exit.
    Stop,
}

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Owns the worker and ticker
/// tasks; [`start()`](Self::start) spawns them, [`shutdown()`](Self::shutdown)
/// stops them.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    task_tx: mpsc::Sender<Task>,
    task_rx: Mutex<Option<mpsc::Receiver<Task>>>,
    /// Moved into the worker on start.
    client: Mutex<Option<NestClient>>,
    cancel: CancellationToken,
    access_error: AccessError,
    state: watch::Sender<Arc<BridgeState>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a bridge from configuration. Does NOT start it.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let client = NestClient::new(config.login(), &config.transport(), config.endpoints.clone())?;
        Ok(Self::with_client(config, client))
    }

    /// Create a bridge around a pre-built client (custom clock, endpoints).
    pub fn with_client(config: BridgeConfig, client: NestClient) -> Self {
        let (task_tx, task_rx) = mpsc::channel(TASK_QUEUE_SIZE);
        let (state, _) = watch::channel(Arc::new(BridgeState::default()));

        Self {
            inner: Arc::new(BridgeInner {
                cancel: client.shutdown_token(),
                access_error: client.access_error().clone(),
                config,
                task_tx,
                task_rx: Mutex::new(Some(task_rx)),
                client: Mutex::new(Some(client)),
                state,
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the worker and, when polling is enabled, the ticker.
    ///
    /// With polling enabled the first refresh is queued immediately.
    pub async fn start(&self) -> Result<(), CoreError> {
        let rx = self.inner.task_rx.lock().await.take();
        let client = self.inner.client.lock().await.take();
        let (Some(rx), Some(client)) = (rx, client) else {
            return Err(CoreError::Internal("bridge already started".into()));
        };
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }

        let mut handles = self.inner.handles.lock().await;
        handles.push(tokio::spawn(worker_task(self.clone(), client, rx)));

        let poll = self.inner.config.poll_interval;
        if !poll.is_zero() {
            self.enqueue(Task::Refresh {
                reply: None,
                periodic: true,
            })
            .await?;
            handles.push(tokio::spawn(ticker_task(
                self.inner.task_tx.clone(),
                poll,
                self.inner.cancel.clone(),
            )));
        }

        info!(poll_secs = poll.as_secs(), "bridge started");
        Ok(())
    }

    /// Stop the bridge: cancel in-flight requests, send the poison task and
    /// wait (bounded by `shutdown_grace`) for the background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let grace = self.inner.config.shutdown_grace;
        let handles: Vec<_> = self.inner.handles.lock().await.drain(..).collect();
        if handles.is_empty() {
            debug!("bridge was never started");
            return;
        }

        let drain = async {
            let _ = self.inner.task_tx.send(Task::Stop).await;
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "bridge task ended abnormally");
                }
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                grace_secs = grace.as_secs(),
                "bridge worker still running after shutdown grace period"
            );
        } else {
            debug!("bridge stopped");
        }
    }

    /// One-shot: start without polling, run closure, shut down.
    pub async fn oneshot<F, Fut, T>(config: BridgeConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Bridge) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval = Duration::ZERO;

        let bridge = Bridge::new(cfg)?;
        bridge.start().await?;
        let result = f(bridge.clone()).await;
        bridge.shutdown().await;
        result
    }

    // ── Tasks ────────────────────────────────────────────────────

    /// Queue a refresh and wait for its result.
    pub async fn refresh(&self) -> Result<Arc<BridgeState>, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Task::Refresh {
            reply: Some(tx),
            periodic: false,
        })
        .await?;
        rx.await.map_err(|_| CoreError::Stopped)?
    }

    /// Queue a command and wait for its result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Task::Command(CommandEnvelope {
            command: cmd,
            response_tx: tx,
        }))
        .await?;
        rx.await.map_err(|_| CoreError::Stopped)?
    }

    async fn enqueue(&self, task: Task) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }
        if self.inner.task_rx.lock().await.is_some() {
            return Err(CoreError::NotStarted);
        }
        self.inner
            .task_tx
            .send(task)
            .await
            .map_err(|_| CoreError::Stopped)
    }

    // ── State observation ────────────────────────────────────────

    /// The current published state.
    pub fn state(&self) -> Arc<BridgeState> {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BridgeState>> {
        self.inner.state.subscribe()
    }

    /// The last access error, or `"All good"`.
    pub fn last_error(&self) -> String {
        self.inner.access_error.message()
    }

    fn publish(&self, state: BridgeState) -> Arc<BridgeState> {
        let state = Arc::new(state);
        self.inner.state.send_replace(Arc::clone(&state));
        state
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Queue a periodic refresh every `interval` until cancelled.
async fn ticker_task(tx: mpsc::Sender<Task>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // the start-up refresh is queued by `start()`

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let task = Task::Refresh { reply: None, periodic: true };
                if tx.send(task).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Drain the task queue. The only place the client is touched.
async fn worker_task(bridge: Bridge, mut client: NestClient, mut rx: mpsc::Receiver<Task>) {
    let config = &bridge.inner.config;
    let mut reporter = ErrorReporter::new(config.error_cooldown);

    while let Some(task) = rx.recv().await {
        match task {
            Task::Refresh { reply, periodic } => {
                if periodic {
                    reporter.tick(config.poll_interval);
                }
                let result = refresh(&bridge, &mut client, &mut reporter, periodic).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Task::Command(envelope) => {
                let result = route_command(&mut client, envelope.command, config.eco_when_away).await;
                let _ = envelope.response_tx.send(result);
            }
            Task::Stop => {
                client.logout();
                break;
            }
        }
    }
    client.shutdown();
    debug!("bridge worker exited");
}

async fn refresh(
    bridge: &Bridge,
    client: &mut NestClient,
    reporter: &mut ErrorReporter,
    periodic: bool,
) -> Result<Arc<BridgeState>, CoreError> {
    let result = client.update_devices().await.map(|_| ());
    if let Err(err) = result {
        let message = client.last_error();
        let previous = bridge.state();
        bridge.publish(BridgeState {
            stale: true,
            last_error: Some(message.clone()),
            ..(*previous).clone()
        });

        if matches!(err, nestlink_api::Error::Cancelled) {
            debug!("refresh cancelled");
        } else if !periodic {
            // The caller gets the error back and reports it.
            debug!(error = %message, "requested refresh failed");
        } else if reporter.on_failure() {
            error!(error = %message, "Nest update failed");
        } else {
            debug!(
                error = %message,
                cooldown_secs = reporter.remaining().as_secs(),
                "Nest update failed (report suppressed)"
            );
        }
        return Err(err.into());
    }

    reporter.on_success();
    let state = project(client);
    debug!(
        thermostats = state.thermostats.len(),
        protects = state.protects.len(),
        "refresh complete"
    );
    Ok(bridge.publish(state))
}

/// Build the published state from the client's current snapshot.
///
/// A listed device whose projection fails is skipped and reported as an
/// unforeseen error; the rest of the refresh is kept.
fn project(client: &NestClient) -> BridgeState {
    let mut thermostats = Vec::with_capacity(client.device_list().len());
    for id in client.device_list() {
        match client.device_info(id) {
            Some(info) => thermostats.push(Thermostat {
                id: id.clone(),
                info,
            }),
            None => unforeseen(client, "thermostat", id),
        }
    }

    let mut protects = Vec::with_capacity(client.protect_list().len());
    for id in client.protect_list() {
        match client.protect_info(id) {
            Some(info) => protects.push(Protect {
                id: id.clone(),
                info,
            }),
            None => unforeseen(client, "protect", id),
        }
    }

    BridgeState {
        thermostats,
        protects,
        schema: client.schema_variant(),
        refreshed_at: Some(Utc::now()),
        stale: false,
        last_error: client.access_error().get(),
    }
}

fn unforeseen(client: &NestClient, kind: &str, id: &str) {
    let message = format!("Unforeseen error: incomplete status for {kind} {id}");
    warn!(kind, id, "skipping device with incomplete status");
    client.access_error().set(message);
}

/// Route a command to the matching client call.
async fn route_command(
    client: &mut NestClient,
    cmd: Command,
    eco_when_away: bool,
) -> Result<CommandResult, CoreError> {
    let device = cmd.device().to_owned();
    debug!(?cmd, "executing command");

    match cmd {
        Command::SetTemperature { device, target } => {
            client.set_temperature(&device, target).await?;
        }
        Command::SetAway {
            device,
            away,
            eco_when_away: eco,
        } => {
            client
                .set_away(&device, away, eco.unwrap_or(eco_when_away))
                .await?;
        }
        Command::SetEcoMode { device, mode } => {
            client.set_eco_mode(&device, mode).await?;
        }
        Command::SetThermostatMode { device, mode } => {
            client.set_thermostat_mode(&device, mode).await?;
        }
    }

    Ok(CommandResult::Applied { device })
}
