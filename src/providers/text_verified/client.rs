//! TextVerified HTTP client.

use crate::errors::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use url::Url;

/// Default TextVerified API root.
pub const DEFAULT_API_URL: &str = "https://www.textverified.com";

/// Refresh the bearer this long before it actually expires.
const TOKEN_SLACK_SECONDS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthReply {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(TOKEN_SLACK_SECONDS) > now
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVerification<'a> {
    service_name: &'a str,
    capability: &'a str,
}

/// Reply to a verification create call; the href addresses the order.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedVerification {
    pub href: String,
}

/// Verification details fetched from its href.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub id: String,
    #[serde(alias = "phoneNumber")]
    pub number: String,
    pub state: String,
    #[serde(default, alias = "price")]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

/// One entry in the vendor's service listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub service_name: String,
    #[serde(default)]
    pub capability: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PricingQuery<'a> {
    service_name: &'a str,
    number_type: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerificationPricing {
    price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmsMessage {
    #[serde(default)]
    parsed_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SmsPage {
    #[serde(default)]
    data: Vec<SmsMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    current_balance: f64,
}

/// HTTP client for the TextVerified API, with bearer caching.
#[derive(Clone)]
pub struct TextVerifiedClient {
    http: HttpClient,
    api_key: SecretString,
    username: String,
    endpoint: Url,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl std::fmt::Debug for TextVerifiedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextVerifiedClient")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl TextVerifiedClient {
    /// Create a client against the given API root.
    pub fn new(endpoint: Url, api_key: SecretString, username: String, http: HttpClient) -> Self {
        Self {
            http,
            api_key,
            username,
            endpoint,
            token: Arc::new(Mutex::new(None)),
        }
    }

    fn url(&self, path: &str) -> ProviderResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| ProviderError::Parse(format!("bad textverified path {path}: {e}")))
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|t| t.is_fresh(Utc::now()))
            .map(|t| t.token.clone())
    }

    /// Current bearer token, exchanging the API key for a fresh one
    /// when the cached token is absent or about to expire.
    async fn bearer(&self) -> ProviderResult<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        let url = self.url("/api/pub/v2/auth")?;
        let reply: AuthReply = self
            .http
            .post_json(
                url,
                None,
                &[
                    ("X-API-KEY", self.api_key.expose_secret()),
                    ("X-API-USERNAME", &self.username),
                ],
                None::<&serde_json::Value>,
            )
            .await?;
        let expires_at = reply
            .expires_at
            .unwrap_or_else(|| Utc::now() + Duration::minutes(15));
        let token = reply.token;
        let mut guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    /// Services purchasable for SMS verification.
    pub async fn list_services(&self) -> ProviderResult<Vec<ServiceEntry>> {
        let token = self.bearer().await?;
        let mut url = self.url("/api/pub/v2/services")?;
        url.query_pairs_mut()
            .append_pair("numberType", "mobile")
            .append_pair("reservationType", "verification");
        self.http.get_json(url, Some(&token)).await
    }

    /// Current verification price for a service, in USD.
    pub async fn verification_price(&self, service: &str) -> ProviderResult<f64> {
        let token = self.bearer().await?;
        let url = self.url("/api/pub/v2/pricing/verifications")?;
        let body = PricingQuery {
            service_name: service,
            number_type: "mobile",
        };
        let pricing: VerificationPricing = self
            .http
            .post_json(url, Some(&token), &[], Some(&body))
            .await?;
        Ok(pricing.price)
    }

    /// Create a verification for a service; returns its href.
    #[tracing::instrument(name = "TextVerifiedClient::create_verification", skip_all, fields(service))]
    pub async fn create_verification(&self, service: &str) -> ProviderResult<CreatedVerification> {
        let token = self.bearer().await?;
        let url = self.url("/api/pub/v2/verifications")?;
        let body = CreateVerification {
            service_name: service,
            capability: "sms",
        };
        self.http
            .post_json(url, Some(&token), &[], Some(&body))
            .await
    }

    /// Fetch verification details from its href.
    pub async fn get_verification(&self, href: &str) -> ProviderResult<Verification> {
        let token = self.bearer().await?;
        let url =
            Url::parse(href).map_err(|e| ProviderError::Parse(format!("bad href {href}: {e}")))?;
        self.http.get_json(url, Some(&token)).await
    }

    /// Parsed codes received for a verification, oldest first.
    pub async fn list_codes(&self, verification_id: &str) -> ProviderResult<Vec<String>> {
        let token = self.bearer().await?;
        let mut url = self.url("/api/pub/v2/sms")?;
        url.query_pairs_mut()
            .append_pair("reservationId", verification_id);
        let page: SmsPage = self.http.get_json(url, Some(&token)).await?;
        Ok(page.data.into_iter().filter_map(|m| m.parsed_code).collect())
    }

    /// Cancel a verification; true when the vendor accepts.
    #[tracing::instrument(name = "TextVerifiedClient::cancel", skip_all)]
    pub async fn cancel(&self, href: &str) -> ProviderResult<bool> {
        let token = self.bearer().await?;
        let url = Url::parse(&format!("{href}/cancel"))
            .map_err(|e| ProviderError::Parse(format!("bad href {href}: {e}")))?;
        let status = self.http.post_status(url, Some(&token)).await?;
        Ok(status.is_success())
    }

    /// Account balance in USD.
    pub async fn balance(&self) -> ProviderResult<f64> {
        let token = self.bearer().await?;
        let url = self.url("/api/pub/v2/account/me")?;
        let account: Account = self.http.get_json(url, Some(&token)).await?;
        Ok(account.current_balance)
    }
}
