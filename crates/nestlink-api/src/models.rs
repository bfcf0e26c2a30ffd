// Wire shapes for the session exchange.
//
// Only the fields the exchange reads are modelled; serde ignores the rest.
// A missing field is a deserialization error, which surfaces as
// `Error::InvalidResponse` and is never retried.

use serde::Deserialize;

/// Response of the Google issue-token endpoint.
///
/// Either the token triple or an `{error, detail}` pair is present.
#[derive(Debug, Deserialize)]
pub(crate) struct IssueTokenResponse {
    pub error: Option<String>,
    pub detail: Option<serde_json::Value>,
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub id_token: Option<String>,
}

/// Response of the Nest JWT issuance endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct JwtResponse {
    pub jwt: String,
    pub claims: JwtClaims,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JwtClaims {
    pub subject: JwtSubject,
    /// RFC 3339 UTC text, e.g. `2024-01-01T00:00:00.000Z`.
    pub expiration_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JwtSubject {
    pub nest_id: NestId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NestId {
    pub id: String,
}

/// Response of the `app_launch` bucket listing.
#[derive(Debug, Deserialize)]
pub(crate) struct AppLaunchResponse {
    pub service_urls: ServiceUrls,
    #[serde(default)]
    pub updated_buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceUrls {
    pub urls: Urls,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Urls {
    pub transport_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bucket {
    pub object_key: String,
}

impl AppLaunchResponse {
    /// The canonical user bucket key: the first `user.*` bucket,
    /// or `user.<user_id>` when none is listed.
    pub fn user_bucket(&self, user_id: &str) -> String {
        self.updated_buckets
            .iter()
            .find(|b| b.object_key.starts_with("user."))
            .map_or_else(|| format!("user.{user_id}"), |b| b.object_key.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_bucket_prefers_listed_key() {
        let resp: AppLaunchResponse = serde_json::from_value(json!({
            "service_urls": { "urls": { "transport_url": "https://t.example" } },
            "updated_buckets": [
                { "object_key": "structure.abc" },
                { "object_key": "user.12345" }
            ]
        }))
        .unwrap();
        assert_eq!(resp.user_bucket("999"), "user.12345");
    }

    #[test]
    fn user_bucket_falls_back_to_constructed_key() {
        let resp: AppLaunchResponse = serde_json::from_value(json!({
            "service_urls": { "urls": { "transport_url": "https://t.example" } }
        }))
        .unwrap();
        assert_eq!(resp.user_bucket("999"), "user.999");
    }

    #[test]
    fn jwt_claims_use_camel_case() {
        let resp: JwtResponse = serde_json::from_value(json!({
            "jwt": "token",
            "claims": {
                "subject": { "nestId": { "id": "42" } },
                "expirationTime": "2024-01-01T00:00:00.000Z"
            }
        }))
        .unwrap();
        assert_eq!(resp.claims.subject.nest_id.id, "42");
        assert_eq!(resp.claims.expiration_time, "2024-01-01T00:00:00.000Z");
    }
}
