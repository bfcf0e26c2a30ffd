// Thermostat commands
//
// Each command is a single authenticated POST of a small JSON object to
// `{transport}/v2/put/<bucket>.<id>`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::client::NestClient;
use crate::endpoints::transport_endpoint;
use crate::error::Error;
use crate::retry::HttpRequest;

/// `touched_by` value Nest uses for changes made from the web app.
const TOUCHED_BY_WEB: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EcoMode {
    ManualEco,
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ThermostatMode {
    Heat,
    Off,
    Cool,
    Range,
}

impl NestClient {
    pub async fn set_temperature(&mut self, device: &str, target: f64) -> Result<(), Error> {
        let body = json!({
            "target_change_pending": true,
            "target_temperature": target,
        });
        self.put_bucket(&format!("shared.{device}"), body, "temperature set")
            .await
    }

    pub async fn set_thermostat_mode(
        &mut self,
        device: &str,
        mode: ThermostatMode,
    ) -> Result<(), Error> {
        let body = json!({
            "target_change_pending": true,
            "target_temperature_type": mode,
        });
        self.put_bucket(&format!("shared.{device}"), body, "thermostat mode set")
            .await
    }

    /// Set the away flag of the structure `device` belongs to.
    ///
    /// When going away with `eco_when_away`, eco mode is switched on as a
    /// follow-up. The two calls are independent: a failed eco change is
    /// logged and recorded, but the away change still reports success.
    pub async fn set_away(
        &mut self,
        device: &str,
        away: bool,
        eco_when_away: bool,
    ) -> Result<(), Error> {
        let structure = self.snapshot.structure_id(device).map(str::to_owned);
        let structure = self.recorded(structure.ok_or_else(|| Error::UnknownDevice {
            id: device.to_owned(),
        }))?;

        let body = json!({
            "away": away,
            "away_timestamp": self.session.clock().now().timestamp(),
            "away_setter": 0,
        });
        self.put_bucket(&format!("structure.{structure}"), body, "away set")
            .await?;

        if away && eco_when_away {
            if let Err(err) = self.set_eco_mode(device, EcoMode::ManualEco).await {
                warn!(device, error = %err, "away set, but switching to eco failed");
            }
        }
        Ok(())
    }

    pub async fn set_eco_mode(&mut self, device: &str, mode: EcoMode) -> Result<(), Error> {
        let body = json!({
            "eco": {
                "mode": mode,
                "mode_update_timestamp": self.session.clock().now().timestamp(),
                "touched_by": TOUCHED_BY_WEB,
            }
        });
        self.put_bucket(&format!("device.{device}"), body, "eco mode set")
            .await
    }

    async fn put_bucket(&mut self, object_key: &str, body: Value, done: &str) -> Result<(), Error> {
        self.session.ensure_session().await?;
        let result = self.post(object_key, body).await;
        self.recorded(result)?;
        info!(object_key, "{done}");
        Ok(())
    }

    async fn post(&self, object_key: &str, body: Value) -> Result<(), Error> {
        let creds = self.session.credentials().ok_or(Error::NotAuthenticated)?;
        let url = transport_endpoint(&creds.transport_url, &format!("v2/put/{object_key}"))?;
        let request = creds.authorize(HttpRequest::post_json(url, body))?;
        self.http.send(&request, self.mutation_retries).await?;
        Ok(())
    }
}
