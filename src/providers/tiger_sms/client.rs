//! Tiger SMS HTTP client.

use crate::errors::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use crate::providers::handler_api::{
    AccessNumber, PollReply, guard_error, is_cancel_confirmed, parse_balance,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

const VENDOR: &str = "tiger_sms";

/// Default Tiger SMS handler endpoint.
pub const DEFAULT_API_URL: &str = "https://api.tiger-sms.com/stubs/handler_api.php";

/// One cell of the vendor price map.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriceEntry {
    /// Cost per activation in RUB.
    pub cost: f64,
    /// Numbers currently available.
    #[serde(default)]
    pub count: u32,
}

/// Price map: vendor country id -> service code -> entry.
pub type PriceMap = HashMap<String, HashMap<String, PriceEntry>>;

/// HTTP client for the Tiger SMS handler API.
#[derive(Clone)]
pub struct TigerSmsClient {
    http: HttpClient,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for TigerSmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TigerSmsClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl TigerSmsClient {
    /// Create a client against the given handler endpoint.
    pub fn new(endpoint: Url, api_key: SecretString, http: HttpClient) -> Self {
        Self {
            http,
            api_key,
            endpoint,
        }
    }

    fn build_request_url(&self, action: &str, additional: &[(&str, &str)]) -> ProviderResult<Url> {
        let mut endpoint = self.endpoint.clone();
        let mut params: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.expose_secret()),
            ("action", action),
        ];
        params.extend_from_slice(additional);
        endpoint.set_query(Some(
            &serde_urlencoded::to_string(&params).map_err(ProviderError::BuildRequestUrl)?,
        ));
        Ok(endpoint)
    }

    async fn send(&self, action: &str, additional: &[(&str, &str)]) -> ProviderResult<String> {
        let url = self.build_request_url(action, additional)?;
        let text = self.http.get_text(url).await?;
        guard_error(VENDOR, &text)?;
        Ok(text)
    }

    /// Rent a number; returns the activation id and phone.
    #[tracing::instrument(name = "TigerSmsClient::get_number", skip_all, fields(country, service))]
    pub async fn get_number(&self, country: &str, service: &str) -> ProviderResult<AccessNumber> {
        let text = self
            .send("getNumber", &[("service", service), ("country", country)])
            .await?;
        AccessNumber::from_raw(&text)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected getNumber reply: {text}")))
    }

    /// Check activation status.
    #[tracing::instrument(name = "TigerSmsClient::get_status", skip_all, fields(id))]
    pub async fn get_status(&self, id: &str) -> ProviderResult<PollReply> {
        let text = self.send("getStatus", &[("id", id)]).await?;
        PollReply::from_raw(&text)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected getStatus reply: {text}")))
    }

    /// Cancel an activation; true when the vendor confirms.
    #[tracing::instrument(name = "TigerSmsClient::cancel", skip_all, fields(id))]
    pub async fn cancel(&self, id: &str) -> ProviderResult<bool> {
        let text = self
            .send("setStatus", &[("id", id), ("status", "8")])
            .await?;
        Ok(is_cancel_confirmed(&text))
    }

    /// Account balance in RUB.
    pub async fn get_balance(&self) -> ProviderResult<f64> {
        let text = self.send("getBalance", &[]).await?;
        parse_balance(&text)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected getBalance reply: {text}")))
    }

    /// Price/availability map, optionally scoped to one country.
    pub async fn get_prices(&self, country: Option<&str>) -> ProviderResult<PriceMap> {
        let params: Vec<(&str, &str)> = match country {
            Some(c) => vec![("country", c)],
            None => vec![],
        };
        let text = self.send("getPrices", &params).await?;
        serde_json::from_str(&text).map_err(ProviderError::DeserializeJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TigerSmsClient {
        TigerSmsClient::new(
            Url::parse(&server.uri()).unwrap(),
            SecretString::from("test_key"),
            HttpClient::with_defaults().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_get_number_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getNumber"))
            .and(query_param("service", "wa"))
            .and(query_param("country", "187"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_NUMBER:101:15551234567"))
            .mount(&server)
            .await;

        let n = client(&server).get_number("187", "wa").await.unwrap();
        assert_eq!(n.id, "101");
        assert_eq!(n.phone, "15551234567");
    }

    #[tokio::test]
    async fn test_get_number_no_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getNumber"))
            .respond_with(ResponseTemplate::new(200).set_body_string("NO_NUMBERS"))
            .mount(&server)
            .await;

        let err = client(&server).get_number("187", "wa").await.unwrap_err();
        assert!(matches!(err, ProviderError::NoAvailability));
    }

    #[tokio::test]
    async fn test_get_status_variants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string("STATUS_OK:123456"))
            .mount(&server)
            .await;

        let reply = client(&server).get_status("101").await.unwrap();
        assert_eq!(reply, PollReply::Ok("123456".into()));
    }

    #[tokio::test]
    async fn test_get_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getBalance"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_BALANCE:154.30"))
            .mount(&server)
            .await;

        assert_eq!(client(&server).get_balance().await.unwrap(), 154.30);
    }

    #[tokio::test]
    async fn test_get_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getPrices"))
            .and(query_param("country", "187"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "187": {"wa": {"cost": 22.5, "count": 140}}
            })))
            .mount(&server)
            .await;

        let prices = client(&server).get_prices(Some("187")).await.unwrap();
        let entry = prices["187"]["wa"];
        assert_eq!(entry.cost, 22.5);
        assert_eq!(entry.count, 140);
    }
}
