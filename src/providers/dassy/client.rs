//! Dassy HTTP client.

use crate::errors::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use crate::providers::handler_api::{
    AccessNumber, PollReply, guard_error, is_cancel_confirmed, parse_balance,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

const VENDOR: &str = "dassy";

/// Default Dassy handler endpoint.
pub const DEFAULT_API_URL: &str = "https://daisysms.com/stubs/handler_api.php";

/// One cell of the vendor price map.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriceEntry {
    /// Cost per activation in USD.
    pub cost: f64,
    /// Numbers currently available.
    #[serde(default)]
    pub count: u32,
}

/// Price map: service code -> vendor country id -> entry.
///
/// Note the inverted nesting relative to Tiger SMS.
pub type PriceMap = HashMap<String, HashMap<String, PriceEntry>>;

/// HTTP client for the Dassy handler API.
#[derive(Clone)]
pub struct DassyClient {
    http: HttpClient,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for DassyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DassyClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl DassyClient {
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
    #[tracing::instrument(name = "DassyClient::get_number", skip_all, fields(country, service))]
    pub async fn get_number(&self, country: &str, service: &str) -> ProviderResult<AccessNumber> {
        let text = self
            .send("getNumber", &[("service", service), ("country", country)])
            .await?;
        AccessNumber::from_raw(&text)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected getNumber reply: {text}")))
    }

    /// Check activation status.
    #[tracing::instrument(name = "DassyClient::get_status", skip_all, fields(id))]
    pub async fn get_status(&self, id: &str) -> ProviderResult<PollReply> {
        let text = self.send("getStatus", &[("id", id)]).await?;
        PollReply::from_raw(&text)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected getStatus reply: {text}")))
    }

    /// Cancel an activation; true when the vendor confirms.
    #[tracing::instrument(name = "DassyClient::cancel", skip_all, fields(id))]
    pub async fn cancel(&self, id: &str) -> ProviderResult<bool> {
        let text = self
            .send("setStatus", &[("id", id), ("status", "8")])
            .await?;
        Ok(is_cancel_confirmed(&text))
    }

    /// Account balance in USD.
    pub async fn get_balance(&self) -> ProviderResult<f64> {
        let text = self.send("getBalance", &[]).await?;
        parse_balance(&text)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected getBalance reply: {text}")))
    }

    /// Price/availability map for the whole catalogue.
    pub async fn get_prices(&self) -> ProviderResult<PriceMap> {
        let text = self.send("getPrices", &[]).await?;
        serde_json::from_str(&text).map_err(ProviderError::DeserializeJson)
    }
}
