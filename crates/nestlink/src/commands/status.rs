//! `status` and `watch` handlers.

use tabled::Tabled;
use tracing::{debug, info};

use nestlink_core::{Bridge, BridgeConfig, BridgeState, Protect, Thermostat};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ThermostatRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Structure")]
    structure: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Humidity")]
    humidity: String,
    #[tabled(rename = "Heating")]
    heating: String,
    #[tabled(rename = "Eco")]
    eco: String,
    #[tabled(rename = "Away")]
    away: String,
}

impl From<&Thermostat> for ThermostatRow {
    fn from(t: &Thermostat) -> Self {
        let info = &t.info;
        let scale = &info.temperature_scale;
        let target = if info.target_mode == "range" {
            format!(
                "{:.1}-{:.1}°{scale}",
                info.target_temperature_low, info.target_temperature_high
            )
        } else {
            format!("{:.1}°{scale}", info.target_temperature)
        };
        Self {
            id: t.id.clone(),
            room: info.where_name.clone(),
            structure: info.structure_name.clone(),
            current: format!("{:.1}°{scale}", info.current_temperature),
            target,
            mode: info.target_mode.clone(),
            humidity: format!("{:.0}%", info.humidity),
            heating: yes_no(info.heating),
            eco: yes_no(info.eco),
            away: yes_no(info.away),
        }
    }
}

#[derive(Tabled)]
struct ProtectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Smoke")]
    smoke: String,
    #[tabled(rename = "CO peak")]
    co_peak: i64,
    #[tabled(rename = "Battery")]
    battery: String,
}

impl From<&Protect> for ProtectRow {
    fn from(p: &Protect) -> Self {
        let info = &p.info;
        let battery = if info.battery_health_state == 0 {
            format!("{}%", info.battery_percent())
        } else {
            format!("{}% (replace)", info.battery_percent())
        };
        Self {
            id: p.id.clone(),
            room: info.where_name.clone(),
            serial: info.serial_number.clone(),
            smoke: if info.smoke_detected() {
                output::warn_text("DETECTED")
            } else {
                "ok".into()
            },
            co_peak: info.co_previous_peak,
            battery,
        }
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes".into() } else { "no".into() }
}

// ── Rendering ───────────────────────────────────────────────────────

fn detail(state: &BridgeState) -> String {
    let mut sections = Vec::new();

    sections.push(output::heading("Thermostats"));
    if state.thermostats.is_empty() {
        sections.push("  (none)".into());
    } else {
        let rows: Vec<ThermostatRow> = state.thermostats.iter().map(Into::into).collect();
        sections.push(output::render_table(&rows));
    }

    sections.push(output::heading("Protects"));
    if state.protects.is_empty() {
        sections.push("  (none)".into());
    } else {
        let rows: Vec<ProtectRow> = state.protects.iter().map(Into::into).collect();
        sections.push(output::render_table(&rows));
    }

    if let Some(at) = state.refreshed_at {
        sections.push(format!("Updated {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if state.stale {
        sections.push(output::warn_text("Data is stale: the latest refresh failed"));
    }
    if let Some(ref err) = state.last_error {
        sections.push(output::warn_text(&format!("Last error: {err}")));
    }
    sections.join("\n")
}

fn ids(state: &BridgeState) -> String {
    state
        .thermostats
        .iter()
        .map(|t| t.id.as_str())
        .chain(state.protects.iter().map(|p| p.id.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render(format: OutputFormat, state: &BridgeState) -> String {
    output::render_single(format, state, detail, ids)
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn status(
    config: BridgeConfig,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let state = Bridge::oneshot(config, |bridge| async move { bridge.refresh().await }).await?;
    output::print_output(&render(format, &state), global.quiet);
    Ok(())
}

pub async fn watch(
    mut config: BridgeConfig,
    args: &WatchArgs,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(minutes) = args.interval {
        config.poll_interval = nestlink_config::scaled_secs(minutes, 60, "interval")?;
    }
    if config.poll_interval.is_zero() {
        return Err(CliError::Validation {
            field: "poll_minutes".into(),
            reason: "polling is disabled for this profile; pass --interval".into(),
        });
    }

    let bridge = Bridge::new(config)?;
    let mut updates = bridge.subscribe();
    bridge.start().await?;
    info!(
        poll_secs = bridge.config().poll_interval.as_secs(),
        "watching, Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupt received");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                output::print_output(&render(format, &state), global.quiet);
            }
        }
    }

    bridge.shutdown().await;
    Ok(())
}
