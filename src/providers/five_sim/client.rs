//! 5sim HTTP client.

use crate::errors::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// Default 5sim API root.
pub const DEFAULT_API_URL: &str = "https://5sim.net";

/// Operator segment used when the caller has no preference.
pub const ANY_OPERATOR: &str = "any";

/// Guest country record. Only the fields we consume.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestCountry {
    /// ISO alpha-2 flags, keyed by lowercase code.
    #[serde(default)]
    pub iso: HashMap<String, u8>,
    /// English display name.
    #[serde(default)]
    pub text_en: Option<String>,
}

/// One operator cell of the guest price listing.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriceEntry {
    /// Cost per activation in RUB.
    pub cost: f64,
    /// Numbers currently available.
    #[serde(default)]
    pub count: u32,
}

/// Guest prices: country slug -> product -> operator -> entry.
pub type GuestPrices = HashMap<String, HashMap<String, HashMap<String, PriceEntry>>>;

/// A purchased activation.
#[derive(Debug, Clone, Deserialize)]
pub struct Activation {
    pub id: u64,
    pub phone: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

/// One received message on an activation.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsEntry {
    #[serde(default)]
    pub code: Option<String>,
}

/// Activation state as reported by the check endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckReply {
    pub status: String,
    #[serde(default)]
    pub sms: Vec<SmsEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct Profile {
    balance: f64,
}

/// The buy endpoint reports stock and funds problems as plain-text 400s.
fn map_buy_error(err: ProviderError) -> ProviderError {
    if let ProviderError::Api { ref message, .. } = err {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("no free phones") {
            return ProviderError::NoAvailability;
        }
        if lowered.contains("not enough user balance") || lowered.contains("not enough rating") {
            return ProviderError::InsufficientProviderBalance;
        }
    }
    err
}

/// HTTP client for the 5sim API.
#[derive(Clone)]
pub struct FiveSimClient {
    http: HttpClient,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for FiveSimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiveSimClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl FiveSimClient {
    /// Create a client against the given API root.
    pub fn new(endpoint: Url, api_key: SecretString, http: HttpClient) -> Self {
        Self {
            http,
            api_key,
            endpoint,
        }
    }

    fn url(&self, path: &str) -> ProviderResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| ProviderError::Parse(format!("bad 5sim path {path}: {e}")))
    }

    /// Guest listing of supported countries, keyed by slug.
    pub async fn guest_countries(&self) -> ProviderResult<HashMap<String, GuestCountry>> {
        let url = self.url("/v1/guest/countries")?;
        self.http.get_json(url, None).await
    }

    /// Guest price listing scoped to one country slug.
    pub async fn guest_prices(&self, country: &str) -> ProviderResult<GuestPrices> {
        let mut url = self.url("/v1/guest/prices")?;
        url.query_pairs_mut().append_pair("country", country);
        self.http.get_json(url, None).await
    }

    /// Purchase an activation number.
    #[tracing::instrument(
        name = "FiveSimClient::buy_activation",
        skip_all,
        fields(country, product)
    )]
    pub async fn buy_activation(&self, country: &str, product: &str) -> ProviderResult<Activation> {
        let path = format!("/v1/user/buy/activation/{country}/{ANY_OPERATOR}/{product}");
        let url = self.url(&path)?;
        self.http
            .get_json(url, Some(self.api_key.expose_secret()))
            .await
            .map_err(map_buy_error)
    }

    /// Check an activation for received messages.
    #[tracing::instrument(name = "FiveSimClient::check", skip_all, fields(id))]
    pub async fn check(&self, id: &str) -> ProviderResult<CheckReply> {
        let url = self.url(&format!("/v1/user/check/{id}"))?;
        self.http
            .get_json(url, Some(self.api_key.expose_secret()))
            .await
    }

    /// Cancel an activation.
    #[tracing::instrument(name = "FiveSimClient::cancel", skip_all, fields(id))]
    pub async fn cancel(&self, id: &str) -> ProviderResult<()> {
        let url = self.url(&format!("/v1/user/cancel/{id}"))?;
        let _ignored: serde_json::Value = self
            .http
            .get_json(url, Some(self.api_key.expose_secret()))
            .await?;
        Ok(())
    }

    /// Account balance in RUB.
    pub async fn balance(&self) -> ProviderResult<f64> {
        let url = self.url("/v1/user/profile")?;
        let profile: Profile = self
            .http
            .get_json(url, Some(self.api_key.expose_secret()))
            .await?;
        Ok(profile.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FiveSimClient {
        FiveSimClient::new(
            Url::parse(&server.uri()).unwrap(),
            SecretString::from("test_token"),
            HttpClient::with_defaults().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_guest_countries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/guest/countries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "usa": {"iso": {"us": 1}, "text_en": "USA"},
                "england": {"iso": {"gb": 1}, "text_en": "England"}
            })))
            .mount(&server)
            .await;

        let countries = client(&server).guest_countries().await.unwrap();
        assert!(countries["usa"].iso.contains_key("us"));
        assert_eq!(countries["england"].text_en.as_deref(), Some("England"));
    }

    #[tokio::test]
    async fn test_guest_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/guest/prices"))
            .and(query_param("country", "usa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "usa": {"whatsapp": {"virtual21": {"cost": 18.0, "count": 42}}}
            })))
            .mount(&server)
            .await;

        let prices = client(&server).guest_prices("usa").await.unwrap();
        assert_eq!(prices["usa"]["whatsapp"]["virtual21"].cost, 18.0);
    }

    #[tokio::test]
    async fn test_buy_activation_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/buy/activation/usa/any/whatsapp"))
            .and(bearer_token("test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 630,
                "phone": "+15556667788",
                "price": 18.0,
                "expires": "2026-08-26T12:30:00Z"
            })))
            .mount(&server)
            .await;

        let activation = client(&server).buy_activation("usa", "whatsapp").await.unwrap();
        assert_eq!(activation.id, 630);
        assert_eq!(activation.phone, "+15556667788");
        assert!(activation.expires.is_some());
    }

    #[tokio::test]
    async fn test_check_collects_sms() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/check/630"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "RECEIVED",
                "sms": [{"code": "443556"}]
            })))
            .mount(&server)
            .await;

        let reply = client(&server).check("630").await.unwrap();
        assert_eq!(reply.status, "RECEIVED");
        assert_eq!(reply.sms[0].code.as_deref(), Some("443556"));
    }

    #[tokio::test]
    async fn test_buy_no_free_phones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/buy/activation/usa/any/whatsapp"))
            .respond_with(ResponseTemplate::new(400).set_body_string("no free phones"))
            .mount(&server)
            .await;

        let err = client(&server).buy_activation("usa", "whatsapp").await.unwrap_err();
        assert!(matches!(err, ProviderError::NoAvailability));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/profile"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = client(&server).balance().await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth));
    }
}
