//! SmsPool adapter.

use super::client::{self, SmsPoolClient};
use crate::catalog::Catalog;
use crate::config::ProviderId;
use crate::errors::{ProviderError, ProviderResult};
use crate::providers::traits::{ProviderOrder, SmsProvider};
use crate::types::{Country, CountryCode, PhoneNumber, PriceQuote, ProviderOrderId, ServiceCode, SmsCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Order lifetime when the vendor omits `expires_in`.
const DEFAULT_ORDER_TTL_MINUTES: i64 = 10;

/// Adapter for SmsPool.
#[derive(Debug, Clone)]
pub struct SmsPoolProvider {
    client: SmsPoolClient,
    catalog: Arc<Catalog>,
    order_ttl: Duration,
}

impl SmsPoolProvider {
    /// Create the adapter.
    pub fn new(client: SmsPoolClient, catalog: Arc<Catalog>) -> Self {
        Self {
            client,
            catalog,
            order_ttl: Duration::minutes(DEFAULT_ORDER_TTL_MINUTES),
        }
    }

    /// Override the fallback order lifetime.
    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    fn vendor_country(&self, country: &CountryCode) -> String {
        // The vendor accepts ISO short names directly, so the catalog
        // alias is only needed for exceptions.
        self.catalog
            .vendor_country(ProviderId::SmsPool, country)
            .unwrap_or_else(|| country.as_str().to_string())
    }

    fn vendor_service(&self, service: &ServiceCode) -> String {
        self.catalog
            .vendor_service(ProviderId::SmsPool, service)
            .unwrap_or_else(|| service.as_str().to_string())
    }
}

/// Failed purchases come back `success: 0` with a free-text message.
fn map_purchase_failure(message: Option<String>) -> ProviderError {
    let text = message.unwrap_or_default();
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("balance") || lowered.contains("funds") {
        ProviderError::InsufficientProviderBalance
    } else if lowered.contains("no number") || lowered.contains("out of stock") || lowered.contains("unavailable") {
        ProviderError::NoAvailability
    } else {
        ProviderError::Api {
            code: "purchase_failed".to_string(),
            message: text,
        }
    }
}

impl SmsProvider for SmsPoolProvider {
    fn id(&self) -> ProviderId {
        ProviderId::SmsPool
    }

    async fn list_countries(&self) -> Vec<Country> {
        let entries = match self.client.countries().await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "smspool country listing failed, returning empty");
                return Vec::new();
            }
        };
        let mut countries: Vec<Country> = entries
            .into_iter()
            .filter_map(|entry| {
                let code = CountryCode::new(entry.short_name.as_deref()?).ok()?;
                Some(Country {
                    code,
                    name: entry.name,
                })
            })
            .collect();
        countries.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        countries
    }

    #[tracing::instrument(name = "SmsPoolProvider::list_services", skip_all, fields(country = %country))]
    async fn list_services(&self, country: &CountryCode) -> ProviderResult<Vec<PriceQuote>> {
        let vendor_code = self.vendor_country(country);
        let entries = self.client.pricing(&vendor_code).await?;
        let mut quotes: Vec<PriceQuote> = entries
            .into_iter()
            .filter_map(|entry| {
                let raw = entry.service?;
                let service = match ServiceCode::new(&raw) {
                    Ok(s) => s,
                    Err(_) => {
                        debug!(raw, "skipping unparsable service code");
                        return None;
                    }
                };
                let name = self.catalog.service_name(&service);
                Some(PriceQuote {
                    service,
                    name,
                    cost: entry.price,
                    available: entry.amount,
                    currency: None,
                })
            })
            .collect();
        quotes.sort_by(|a, b| a.service.as_str().cmp(b.service.as_str()));
        Ok(quotes)
    }

    #[tracing::instrument(
        name = "SmsPoolProvider::create_order",
        skip_all,
        fields(country = %country, service = %service)
    )]
    async fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> ProviderResult<ProviderOrder> {
        let vendor_country = self.vendor_country(country);
        let vendor_service = self.vendor_service(service);
        let reply = self.client.purchase(&vendor_country, &vendor_service).await?;
        if reply.success != 1 {
            return Err(map_purchase_failure(reply.message));
        }
        let order_id = reply
            .order_id
            .ok_or_else(|| ProviderError::Parse("purchase reply missing order_id".to_string()))?;
        let number = reply
            .number
            .ok_or_else(|| ProviderError::Parse("purchase reply missing number".to_string()))?;
        let expires_at = match reply.expires_in {
            Some(seconds) if seconds > 0 => Utc::now() + Duration::seconds(seconds),
            _ => Utc::now() + self.order_ttl,
        };
        Ok(ProviderOrder {
            provider_order_id: ProviderOrderId::from(order_id),
            phone_number: PhoneNumber::from(number),
            native_cost: reply.cost.filter(|cost| *cost > 0.0),
            native_currency: None,
            expires_at,
        })
    }

    async fn poll_code(&self, order: &ProviderOrderId) -> ProviderResult<Option<SmsCode>> {
        let reply = self.client.check(order.as_str()).await?;
        if reply.status == client::STATUS_COMPLETED {
            Ok(reply.sms.map(SmsCode::from))
        } else {
            Ok(None)
        }
    }

    async fn cancel_order(&self, order: &ProviderOrderId) -> ProviderResult<bool> {
        match self.client.cancel(order.as_str()).await {
            Ok(accepted) => Ok(accepted),
            Err(ProviderError::Api { code, .. }) => {
                debug!(code, "smspool declined cancellation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_balance(&self) -> f64 {
        match self.client.balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "smspool balance check failed");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use secrecy::SecretString;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> SmsPoolProvider {
        let client = SmsPoolClient::new(
            Url::parse(&server.uri()).unwrap(),
            SecretString::from("test_key"),
            HttpClient::with_defaults().unwrap(),
        );
        SmsPoolProvider::new(client, Arc::new(Catalog::empty()))
    }

    #[tokio::test]
    async fn test_create_order_uses_vendor_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/purchase/sms"))
            .and(body_string_contains("country=US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": 1,
                "order_id": "ABC123",
                "number": "15551112222",
                "cost": "0.45",
                "expires_in": 600
            })))
            .mount(&server)
            .await;

        let country = CountryCode::new("US").unwrap();
        let service = ServiceCode::new("whatsapp").unwrap();
        let order = provider(&server).create_order(&country, &service).await.unwrap();

        assert_eq!(order.provider_order_id.as_str(), "ABC123");
        assert_eq!(order.native_cost, Some(0.45));
        let ttl = order.expires_at - Utc::now();
        assert!(ttl > Duration::minutes(9) && ttl <= Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_purchase_failure_maps_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/purchase/sms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": 0,
                "message": "There are no numbers available for this service."
            })))
            .mount(&server)
            .await;

        let country = CountryCode::new("US").unwrap();
        let service = ServiceCode::new("whatsapp").unwrap();
        let err = provider(&server).create_order(&country, &service).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoAvailability));
    }

    #[tokio::test]
    async fn test_poll_code_pending_then_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = ProviderOrderId::from("ABC123");
        assert!(provider(&server).poll_code(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refunded_order_has_no_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 6
            })))
            .mount(&server)
            .await;

        let id = ProviderOrderId::from("ABC123");
        assert!(provider(&server).poll_code(&id).await.unwrap().is_none());
    }
}
