//! SmsPool HTTP client.

use crate::errors::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use url::Url;

/// Default SmsPool API root.
pub const DEFAULT_API_URL: &str = "https://api.smspool.net";

/// Order is waiting for a message.
pub const STATUS_PENDING: u8 = 1;
/// Order has expired on the vendor side.
pub const STATUS_EXPIRED: u8 = 2;
/// A message has been received.
pub const STATUS_COMPLETED: u8 = 3;
/// Order was cancelled and refunded by the vendor.
pub const STATUS_REFUNDED: u8 = 6;

/// Numeric fields arrive as either JSON numbers or quoted strings.
fn de_flex_f64<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flex {
        Num(f64),
        Str(String),
    }
    match Flex::deserialize(de)? {
        Flex::Num(n) => Ok(n),
        Flex::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn de_flex_f64_opt<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "de_flex_f64")] f64);
    Ok(Option::<Wrap>::deserialize(de)?.map(|w| w.0))
}

fn de_flex_string_opt<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flex {
        Num(i64),
        Str(String),
    }
    Ok(Option::<Flex>::deserialize(de)?.map(|f| match f {
        Flex::Num(n) => n.to_string(),
        Flex::Str(s) => s,
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseReply {
    pub success: u8,
    #[serde(default, deserialize_with = "de_flex_string_opt")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "de_flex_string_opt")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "de_flex_f64_opt")]
    pub cost: Option<f64>,
    /// Seconds until the order expires.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckReply {
    pub status: u8,
    #[serde(default, deserialize_with = "de_flex_string_opt")]
    pub sms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CancelReply {
    success: u8,
}

#[derive(Debug, Clone, Deserialize)]
struct BalanceReply {
    #[serde(deserialize_with = "de_flex_f64")]
    balance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryEntry {
    #[serde(rename = "ID")]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingEntry {
    #[serde(default, deserialize_with = "de_flex_string_opt")]
    pub service: Option<String>,
    #[serde(deserialize_with = "de_flex_f64")]
    pub price: f64,
    #[serde(default)]
    pub amount: u32,
}

/// HTTP client for the SmsPool API.
#[derive(Clone)]
pub struct SmsPoolClient {
    http: HttpClient,
    api_key: SecretString,
    endpoint: Url,
}

impl std::fmt::Debug for SmsPoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsPoolClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl SmsPoolClient {
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
            .map_err(|e| ProviderError::Parse(format!("bad smspool path {path}: {e}")))
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        mut form: Vec<(&'static str, String)>,
    ) -> ProviderResult<T> {
        form.push(("key", self.api_key.expose_secret().to_string()));
        let url = self.url(path)?;
        self.http.post_form(url, &form).await
    }

    /// Purchase a one-time SMS number.
    #[tracing::instrument(name = "SmsPoolClient::purchase", skip_all, fields(country, service))]
    pub async fn purchase(&self, country: &str, service: &str) -> ProviderResult<PurchaseReply> {
        self.post(
            "/purchase/sms",
            vec![
                ("country", country.to_string()),
                ("service", service.to_string()),
            ],
        )
        .await
    }

    /// Check an order for a received message.
    #[tracing::instrument(name = "SmsPoolClient::check", skip_all, fields(order_id))]
    pub async fn check(&self, order_id: &str) -> ProviderResult<CheckReply> {
        self.post("/sms/check", vec![("orderid", order_id.to_string())])
            .await
    }

    /// Cancel an order; true when the vendor accepts.
    #[tracing::instrument(name = "SmsPoolClient::cancel", skip_all, fields(order_id))]
    pub async fn cancel(&self, order_id: &str) -> ProviderResult<bool> {
        let reply: CancelReply = self
            .post("/sms/cancel", vec![("orderid", order_id.to_string())])
            .await?;
        Ok(reply.success == 1)
    }

    /// Account balance in USD.
    pub async fn balance(&self) -> ProviderResult<f64> {
        let reply: BalanceReply = self.post("/request/balance", vec![]).await?;
        Ok(reply.balance)
    }

    /// Every country the vendor serves.
    pub async fn countries(&self) -> ProviderResult<Vec<CountryEntry>> {
        self.post("/country/retrieve_all", vec![]).await
    }

    /// Price listing scoped to one country.
    pub async fn pricing(&self, country: &str) -> ProviderResult<Vec<PricingEntry>> {
        self.post("/request/pricing", vec![("country", country.to_string())])
            .await
    }
}
