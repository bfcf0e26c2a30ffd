// Status snapshot parsing
//
// The `/v3/mobile/<user bucket>` endpoint returns one large JSON object
// keyed by bucket type (`user`, `structure`, `device`, `shared`, `link`,
// `topaz`, ...). Its layout is undocumented and has changed over time, so
// device discovery is done by a small set of known layouts tried in order,
// and every projection is an `Option` that is `None` as soon as a required
// key is missing.

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::debug;

use crate::rooms::room_name;

const STRUCTURE_PREFIX: &str = "structure.";
const DEVICE_PREFIX: &str = "device.";

/// Snapshot layout that device discovery matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SchemaVariant {
    /// `user.<id>.structures` -> `structure.<id>.devices`.
    StructureDevices,
    /// Every key of the top-level `device` bucket.
    DeviceBuckets,
}

/// Result of walking a snapshot for device identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// `None` when no known layout matched; both lists are then empty.
    pub variant: Option<SchemaVariant>,
    pub devices: Vec<String>,
    pub protects: Vec<String>,
}

/// The full server-reported state, replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    raw: Value,
}

/// Thermostat projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub structure_name: String,
    pub away: bool,
    pub target_temperature: f64,
    pub current_temperature: f64,
    /// `C` or `F`.
    pub temperature_scale: String,
    pub humidity: f64,
    /// Any eco mode other than `schedule`.
    pub eco: bool,
    pub heating: bool,
    /// `heat`, `cool`, `range` or `off`.
    pub target_mode: String,
    pub target_temperature_low: f64,
    pub target_temperature_high: f64,
    pub where_name: String,
}

/// Smoke / CO detector projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectInfo {
    /// Non-zero while smoke is detected.
    pub smoke_status: i64,
    pub serial_number: String,
    pub co_previous_peak: i64,
    pub where_name: String,
    pub battery_health_state: i64,
    pub battery_level: i64,
}

impl ProtectInfo {
    pub fn smoke_detected(&self) -> bool {
        self.smoke_status != 0
    }

    /// Battery level scaled to a 0..=100 percentage.
    pub fn battery_percent(&self) -> u8 {
        u8::try_from((self.battery_level / 100).clamp(0, 100)).unwrap_or(100)
    }
}

impl Snapshot {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Find thermostats and protects, in snapshot order.
    pub fn discover(&self, user_id: &str) -> Discovery {
        let (variant, devices) = match self.structure_devices(user_id) {
            Ok(devices) => (Some(SchemaVariant::StructureDevices), devices),
            Err(missing) => {
                debug!(missing, "structure layout not found, trying device buckets");
                match self.device_buckets() {
                    Some(devices) => (Some(SchemaVariant::DeviceBuckets), devices),
                    None => {
                        debug!("no known snapshot layout matched");
                        (None, Vec::new())
                    }
                }
            }
        };

        let protects = self
            .raw
            .get("topaz")
            .and_then(Value::as_object)
            .map(|topaz| topaz.keys().cloned().collect())
            .unwrap_or_default();

        Discovery {
            variant,
            devices,
            protects,
        }
    }

    /// `user.<id>.structures[]` -> `structure.<id>.devices[]`.
    ///
    /// Any missing key aborts the whole layout so the caller never sees a
    /// partially populated list.
    fn structure_devices(&self, user_id: &str) -> Result<Vec<String>, &'static str> {
        let structures = self
            .raw
            .get("user")
            .ok_or("user")?
            .get(user_id)
            .ok_or("user.<id>")?
            .get("structures")
            .and_then(Value::as_array)
            .ok_or("user.<id>.structures")?;
        let buckets = self.raw.get("structure").ok_or("structure")?;

        let mut devices = Vec::new();
        for structure in structures {
            let key = structure.as_str().ok_or("user.<id>.structures[]")?;
            let id = key.strip_prefix(STRUCTURE_PREFIX).unwrap_or(key);
            let listed = buckets
                .get(id)
                .ok_or("structure.<id>")?
                .get("devices")
                .and_then(Value::as_array)
                .ok_or("structure.<id>.devices")?;
            for device in listed {
                let key = device.as_str().ok_or("structure.<id>.devices[]")?;
                devices.push(key.strip_prefix(DEVICE_PREFIX).unwrap_or(key).to_owned());
            }
        }
        Ok(devices)
    }

    fn device_buckets(&self) -> Option<Vec<String>> {
        let buckets = self.raw.get("device")?.as_object()?;
        Some(buckets.keys().cloned().collect())
    }

    /// Id of the structure a device belongs to, from `link.<device>.structure`.
    pub fn structure_id(&self, device: &str) -> Option<&str> {
        let key = self.raw.get("link")?.get(device)?.get("structure")?.as_str()?;
        Some(key.strip_prefix(STRUCTURE_PREFIX).unwrap_or(key))
    }

    /// Project one thermostat, or `None` if any required key is missing.
    pub fn device_info(&self, device: &str) -> Option<DeviceInfo> {
        let structure = self.raw.get("structure")?.get(self.structure_id(device)?)?;
        let shared = self.raw.get("shared")?.get(device)?;
        let dev = self.raw.get("device")?.get(device)?;

        Some(DeviceInfo {
            structure_name: text(structure.get("name")?),
            away: structure.get("away")?.as_bool()?,
            target_temperature: shared.get("target_temperature")?.as_f64()?,
            current_temperature: shared.get("current_temperature")?.as_f64()?,
            temperature_scale: dev.get("temperature_scale")?.as_str()?.to_owned(),
            humidity: dev.get("current_humidity")?.as_f64()?,
            eco: dev.get("eco")?.get("mode")?.as_str()? != "schedule",
            heating: shared.get("hvac_heater_state")?.as_bool()?,
            target_mode: shared.get("target_temperature_type")?.as_str()?.to_owned(),
            target_temperature_low: shared.get("target_temperature_low")?.as_f64()?,
            target_temperature_high: shared.get("target_temperature_high")?.as_f64()?,
            where_name: room_name(dev.get("where_id")?.as_str()?)?.to_owned(),
        })
    }

    /// Project one protect, or `None` if any required key is missing.
    pub fn protect_info(&self, protect: &str) -> Option<ProtectInfo> {
        let topaz = self.raw.get("topaz")?.get(protect)?;

        Some(ProtectInfo {
            smoke_status: integer(topaz.get("smoke_status")?)?,
            serial_number: text(topaz.get("serial_number")?),
            co_previous_peak: integer(topaz.get("co_previous_peak")?)?,
            where_name: room_name(topaz.get("spoken_where_id")?.as_str()?)?.to_owned(),
            battery_health_state: integer(topaz.get("battery_health_state")?)?,
            battery_level: integer(topaz.get("battery_level")?)?,
        })
    }
}

/// String form of a scalar; strings lose their quotes.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integers, whole floats and booleans.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> Snapshot {
        Snapshot::new(json!({
            "user": { "42": { "structures": ["structure.S1"] } },
            "structure": {
                "S1": {
                    "name": "Home",
                    "away": false,
                    "devices": ["device.T2", "device.T1"]
                }
            },
            "link": {
                "T1": { "structure": "structure.S1" },
                "T2": { "structure": "structure.S1" }
            },
            "shared": {
                "T1": {
                    "target_temperature": 20.5,
                    "current_temperature": 19.75,
                    "hvac_heater_state": true,
                    "target_temperature_type": "heat",
                    "target_temperature_low": 18.0,
                    "target_temperature_high": 24.0
                }
            },
            "device": {
                "T1": {
                    "temperature_scale": "C",
                    "current_humidity": 45,
                    "eco": { "mode": "schedule" },
                    "where_id": "00000000-0000-0000-0000-00010000000c"
                },
                "T2": {}
            },
            "topaz": {
                "P1": {
                    "smoke_status": 0,
                    "serial_number": "06AA01AC",
                    "co_previous_peak": 0,
                    "spoken_where_id": "00000000-0000-0000-0000-00010000000a",
                    "battery_health_state": 0,
                    "battery_level": 5385
                }
            }
        }))
    }

    #[test]
    fn discovers_devices_in_structure_order() {
        let found = sample().discover("42");
        assert_eq!(found.variant, Some(SchemaVariant::StructureDevices));
        assert_eq!(found.devices, vec!["T2", "T1"]);
        assert_eq!(found.protects, vec!["P1"]);
    }

    #[test]
    fn falls_back_to_device_buckets() {
        // Same snapshot but for a user id it does not list.
        let found = sample().discover("7");
        assert_eq!(found.variant, Some(SchemaVariant::DeviceBuckets));
        assert_eq!(found.devices, vec!["T1", "T2"]);
    }

    #[test]
    fn missing_listed_structure_uses_fallback_not_partial_list() {
        let snapshot = Snapshot::new(json!({
            "user": { "42": { "structures": ["structure.S1", "structure.GONE"] } },
            "structure": { "S1": { "devices": ["device.T1"] } },
            "device": { "T9": {} }
        }));
        let found = snapshot.discover("42");
        assert_eq!(found.variant, Some(SchemaVariant::DeviceBuckets));
        assert_eq!(found.devices, vec!["T9"]);
    }

    #[test]
    fn unknown_layout_yields_empty_lists() {
        let found = Snapshot::new(json!({ "something": "else" })).discover("42");
        assert_eq!(found, Discovery::default());
    }

    #[test]
    fn device_projection_reads_all_buckets() {
        let info = sample().device_info("T1").unwrap();
        assert_eq!(info.structure_name, "Home");
        assert!(!info.away);
        assert_eq!(info.target_temperature, 20.5);
        assert_eq!(info.humidity, 45.0);
        assert!(!info.eco);
        assert!(info.heating);
        assert_eq!(info.target_mode, "heat");
        assert_eq!(info.where_name, "Living Room");
    }

    #[test]
    fn device_projection_is_none_when_a_key_is_missing() {
        assert!(sample().device_info("T2").is_none());
        assert!(sample().device_info("nope").is_none());
    }

    #[test]
    fn custom_room_makes_projection_unavailable() {
        let mut raw = sample().raw().clone();
        raw["device"]["T1"]["where_id"] = json!("custom-room");
        assert!(Snapshot::new(raw).device_info("T1").is_none());
    }

    #[test]
    fn protect_projection() {
        let info = sample().protect_info("P1").unwrap();
        assert!(!info.smoke_detected());
        assert_eq!(info.serial_number, "06AA01AC");
        assert_eq!(info.where_name, "Kitchen");
        assert_eq!(info.battery_percent(), 53);
    }

    #[test]
    fn structure_id_strips_prefix() {
        assert_eq!(sample().structure_id("T1"), Some("S1"));
        assert_eq!(sample().structure_id("P1"), None);
    }

    #[test]
    fn schema_variant_names() {
        assert_eq!(SchemaVariant::StructureDevices.to_string(), "structure-devices");
        assert_eq!(
            serde_json::to_value(SchemaVariant::DeviceBuckets).unwrap(),
            json!("device-buckets")
        );
    }
}
