// ── Published bridge state ──
//
// What external readers see: the projections from the last good refresh,
// plus a staleness marker when the latest refresh failed.

use chrono::{DateTime, Utc};
use nestlink_api::{DeviceInfo, ProtectInfo, SchemaVariant};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thermostat {
    pub id: String,
    #[serde(flatten)]
    pub info: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Protect {
    pub id: String,
    #[serde(flatten)]
    pub info: ProtectInfo,
}

/// Read-only view of the account, replaced wholesale by the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeState {
    pub thermostats: Vec<Thermostat>,
    pub protects: Vec<Protect>,
    /// Snapshot layout the last successful refresh matched.
    pub schema: Option<SchemaVariant>,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// The latest refresh failed; the data above is from an earlier one.
    pub stale: bool,
    pub last_error: Option<String>,
}

impl BridgeState {
    /// Look a thermostat up by id or by room name (case-insensitive).
    pub fn find_thermostat(&self, key: &str) -> Option<&Thermostat> {
        self.thermostats
            .iter()
            .find(|t| t.id == key)
            .or_else(|| {
                self.thermostats
                    .iter()
                    .find(|t| t.info.where_name.eq_ignore_ascii_case(key))
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn thermostat(id: &str, room: &str) -> Thermostat {
        Thermostat {
            id: id.into(),
            info: DeviceInfo {
                structure_name: "Home".into(),
                away: false,
                target_temperature: 20.0,
                current_temperature: 19.0,
                temperature_scale: "C".into(),
                humidity: 40.0,
                eco: false,
                heating: false,
                target_mode: "heat".into(),
                target_temperature_low: 18.0,
                target_temperature_high: 24.0,
                where_name: room.into(),
            },
        }
    }

    #[test]
    fn find_by_id_or_room() {
        let state = BridgeState {
            thermostats: vec![thermostat("A1", "Living Room"), thermostat("B2", "Office")],
            ..BridgeState::default()
        };
        assert_eq!(state.find_thermostat("B2").unwrap().info.where_name, "Office");
        assert_eq!(state.find_thermostat("living room").unwrap().id, "A1");
        assert!(state.find_thermostat("Attic").is_none());
    }

    #[test]
    fn thermostat_serializes_flat() {
        let value = serde_json::to_value(thermostat("A1", "Den")).unwrap();
        assert_eq!(value["id"], "A1");
        assert_eq!(value["where_name"], "Den");
        assert!(value.get("info").is_none());
    }
}
