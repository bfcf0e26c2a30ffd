// Shared wiremock fixtures for the Nest API tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nestlink_api::{Clock, Endpoints, IssueCredentials, NestClient, TransportConfig};

pub const USER_ID: &str = "42";
pub const JWT: &str = "jwt-token";
pub const ISSUE_PATH: &str = "/iframerpc";
pub const JWT_PATH: &str = "/v1/issue_jwt";
pub const APP_LAUNCH_PATH: &str = "/api/0.1/user/42/app_launch";
pub const STATUS_PATH: &str = "/v3/mobile/user.42";

/// Clock the test moves by hand.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<FixedOffset>>);

impl ManualClock {
    pub fn at(rfc3339: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            DateTime::parse_from_rfc3339(rfc3339).unwrap(),
        )))
    }

    pub fn set(&self, rfc3339: &str) {
        *self.0.lock().unwrap() = DateTime::parse_from_rfc3339(rfc3339).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.0.lock().unwrap()
    }
}

pub fn transport() -> TransportConfig {
    TransportConfig::default()
        .with_timeout(Duration::from_millis(500))
        .with_retry_backoff(Duration::from_millis(20))
}

pub fn login(server: &MockServer) -> IssueCredentials {
    IssueCredentials::new(
        format!("{}{ISSUE_PATH}?action=issueToken", server.uri()),
        "SID=abc; HSID=def",
    )
}

pub fn client(server: &MockServer, clock: Arc<ManualClock>) -> NestClient {
    let endpoints = Endpoints::with_base(&Url::parse(&server.uri()).unwrap()).unwrap();
    NestClient::new(login(server), &transport(), endpoints)
        .unwrap()
        .with_clock(clock)
}

pub fn bearer_body() -> Value {
    json!({
        "access_token": "ya29.bearer",
        "token_type": "Bearer",
        "id_token": "id-token",
        "expires_in": 3600
    })
}

pub fn jwt_body(expiration: &str) -> Value {
    json!({
        "jwt": JWT,
        "claims": {
            "subject": { "nestId": { "id": USER_ID } },
            "expirationTime": expiration
        }
    })
}

pub fn app_launch_body(server: &MockServer) -> Value {
    json!({
        "service_urls": { "urls": { "transport_url": format!("{}/", server.uri()) } },
        "updated_buckets": [
            { "object_key": "structure.S1" },
            { "object_key": "user.42" }
        ]
    })
}

/// Mount the three exchange steps, all succeeding.
pub async fn mount_exchange(server: &MockServer, expiration: &str) {
    Mock::given(method("GET"))
        .and(path(ISSUE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(bearer_body()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(JWT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwt_body(expiration)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(APP_LAUNCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_launch_body(server)))
        .mount(server)
        .await;
}

pub fn status_body() -> Value {
    json!({
        "user": { "42": { "structures": ["structure.S1"] } },
        "structure": {
            "S1": { "name": "Home", "away": false, "devices": ["device.T1"] }
        },
        "link": { "T1": { "structure": "structure.S1" } },
        "shared": {
            "T1": {
                "target_temperature": 21.0,
                "current_temperature": 19.5,
                "hvac_heater_state": false,
                "target_temperature_type": "heat",
                "target_temperature_low": 17.0,
                "target_temperature_high": 25.0
            }
        },
        "device": {
            "T1": {
                "temperature_scale": "C",
                "current_humidity": 50,
                "eco": { "mode": "manual-eco" },
                "where_id": "00000000-0000-0000-0000-00010000000e"
            }
        },
        "topaz": {
            "P1": {
                "smoke_status": 0,
                "serial_number": "06AA01AC",
                "co_previous_peak": 0,
                "spoken_where_id": "00000000-0000-0000-0000-000100000002",
                "battery_health_state": 0,
                "battery_level": 5200
            },
            "P2": {
                "smoke_status": 0,
                "serial_number": "06AA01AD",
                "co_previous_peak": 0,
                "spoken_where_id": "00000000-0000-0000-0000-000100000001",
                "battery_health_state": 0,
                "battery_level": 5300
            }
        }
    })
}

pub async fn mount_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .mount(server)
        .await;
}

/// Number of requests the server has seen for `request_path`.
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
