//! TextVerified adapter.

use super::client::TextVerifiedClient;
use crate::catalog::Catalog;
use crate::config::ProviderId;
use crate::errors::{ProviderError, ProviderResult};
use crate::providers::traits::{ProviderOrder, SmsProvider};
use crate::types::{Country, CountryCode, PhoneNumber, PriceQuote, ProviderOrderId, ServiceCode, SmsCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::warn;

/// Verification lifetime when the vendor omits an expiry.
const DEFAULT_ORDER_TTL_MINUTES: i64 = 10;

/// Vendor states in which a code may still arrive.
const PENDING_STATES: &[&str] = &["verificationPending", "verificationInProgress"];

/// Adapter for TextVerified. United States numbers only, named service
/// slugs ("whatsapp", not "wa").
#[derive(Debug, Clone)]
pub struct TextVerifiedProvider {
    client: TextVerifiedClient,
    catalog: Arc<Catalog>,
    order_ttl: Duration,
}

impl TextVerifiedProvider {
    /// Create the adapter.
    pub fn new(client: TextVerifiedClient, catalog: Arc<Catalog>) -> Self {
        Self {
            client,
            catalog,
            order_ttl: Duration::minutes(DEFAULT_ORDER_TTL_MINUTES),
        }
    }

    /// Override the fallback verification lifetime.
    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    fn service_slug(&self, service: &ServiceCode) -> String {
        self.catalog
            .vendor_service(ProviderId::TextVerified, service)
            .unwrap_or_else(|| service.as_str().to_string())
    }
}

impl SmsProvider for TextVerifiedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::TextVerified
    }

    fn check_request(&self, country: &CountryCode, service: &ServiceCode) -> ProviderResult<()> {
        if country.as_str() != "US" {
            return Err(ProviderError::Unsupported {
                reason: format!("textverified serves US numbers only, got {country}"),
            });
        }
        // The vendor addresses services by name, so a bare numeric code
        // cannot be resolved without a catalog alias.
        if service.is_numeric() && self.catalog.vendor_service(ProviderId::TextVerified, service).is_none() {
            return Err(ProviderError::Unsupported {
                reason: format!("textverified has no service name for {service}"),
            });
        }
        Ok(())
    }

    async fn list_countries(&self) -> Vec<Country> {
        let code = match CountryCode::new("US") {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        let name = self.catalog.country_name(&code);
        vec![Country { code, name }]
    }

    #[tracing::instrument(name = "TextVerifiedProvider::list_services", skip_all, fields(country = %country))]
    async fn list_services(&self, country: &CountryCode) -> ProviderResult<Vec<PriceQuote>> {
        if country.as_str() != "US" {
            return Ok(Vec::new());
        }
        let entries = self.client.list_services().await?;
        let mut quotes = Vec::new();
        for entry in entries {
            let sms_capable = entry
                .capability
                .as_deref()
                .is_none_or(|c| c.eq_ignore_ascii_case("sms"));
            if !sms_capable {
                continue;
            }
            // Vendor names map back to caller-facing codes through the
            // catalog; unmapped names are kept as-is when they parse.
            let service = match self
                .catalog
                .service_from_vendor(ProviderId::TextVerified, &entry.service_name)
                .or_else(|| ServiceCode::new(&entry.service_name).ok())
            {
                Some(service) => service,
                None => continue,
            };
            let cost = match self.client.verification_price(&entry.service_name).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(service = %entry.service_name, error = %e, "pricing lookup failed, service skipped");
                    continue;
                }
            };
            let name = self.catalog.service_name(&service);
            // Stock depth is not reported; a listed service is
            // purchasable.
            quotes.push(PriceQuote {
                service,
                name,
                cost,
                available: 1,
                currency: None,
            });
        }
        quotes.sort_by(|a, b| a.service.as_str().cmp(b.service.as_str()));
        Ok(quotes)
    }

    #[tracing::instrument(
        name = "TextVerifiedProvider::create_order",
        skip_all,
        fields(country = %country, service = %service)
    )]
    async fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> ProviderResult<ProviderOrder> {
        self.check_request(country, service)?;
        let slug = self.service_slug(service);
        let created = self.client.create_verification(&slug).await?;
        let details = self.client.get_verification(&created.href).await?;
        let native_cost = details.total_cost.filter(|cost| *cost > 0.0);
        Ok(ProviderOrder {
            provider_order_id: ProviderOrderId::from(created.href),
            phone_number: PhoneNumber::from(details.number),
            native_cost,
            native_currency: None,
            expires_at: details
                .ends_at
                .unwrap_or_else(|| Utc::now() + self.order_ttl),
        })
    }

    async fn poll_code(&self, order: &ProviderOrderId) -> ProviderResult<Option<SmsCode>> {
        let details = self.client.get_verification(order.as_str()).await?;
        if PENDING_STATES.contains(&details.state.as_str()) {
            return Ok(None);
        }
        let codes = self.client.list_codes(&details.id).await?;
        Ok(codes.into_iter().next_back().map(SmsCode::from))
    }

    async fn cancel_order(&self, order: &ProviderOrderId) -> ProviderResult<bool> {
        self.client.cancel(order.as_str()).await
    }

    async fn get_balance(&self) -> f64 {
        match self.client.balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "textverified balance check failed");
                0.0
            }
        }
    }
}
