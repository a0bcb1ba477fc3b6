//! 5sim adapter.

use super::client::FiveSimClient;
use crate::catalog::Catalog;
use crate::config::ProviderId;
use crate::errors::{ProviderError, ProviderResult};
use crate::providers::traits::{ProviderOrder, SmsProvider};
use crate::types::{Country, CountryCode, PhoneNumber, PriceQuote, ProviderOrderId, ServiceCode, SmsCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rental lifetime when the vendor omits an expiry.
const DEFAULT_ORDER_TTL_MINUTES: i64 = 15;

/// Adapter for 5sim.
#[derive(Debug, Clone)]
pub struct FiveSimProvider {
    client: FiveSimClient,
    catalog: Arc<Catalog>,
    order_ttl: Duration,
}

impl FiveSimProvider {
    /// Create the adapter.
    pub fn new(client: FiveSimClient, catalog: Arc<Catalog>) -> Self {
        Self {
            client,
            catalog,
            order_ttl: Duration::minutes(DEFAULT_ORDER_TTL_MINUTES),
        }
    }

    /// Override the fallback rental lifetime.
    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    fn country_slug(&self, country: &CountryCode) -> String {
        self.catalog
            .vendor_country(ProviderId::FiveSim, country)
            .unwrap_or_else(|| country.as_str().to_ascii_lowercase())
    }

    fn service_slug(&self, service: &ServiceCode) -> String {
        self.catalog
            .vendor_service(ProviderId::FiveSim, service)
            .unwrap_or_else(|| service.as_str().to_string())
    }

    /// The slug must exist in the guest country listing before a buy is
    /// attempted, otherwise the vendor returns an opaque 400.
    async fn ensure_known_slug(&self, slug: &str, country: &CountryCode) -> ProviderResult<()> {
        let known = self.client.guest_countries().await?;
        if known.contains_key(slug) {
            Ok(())
        } else {
            Err(ProviderError::Unsupported {
                reason: format!("5sim has no country slug for {country}"),
            })
        }
    }
}

impl SmsProvider for FiveSimProvider {
    fn id(&self) -> ProviderId {
        ProviderId::FiveSim
    }

    async fn list_countries(&self) -> Vec<Country> {
        let known = match self.client.guest_countries().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "5sim country listing failed, returning empty");
                return Vec::new();
            }
        };
        let mut countries: Vec<Country> = known
            .into_iter()
            .filter_map(|(slug, entry)| {
                let code = self
                    .catalog
                    .country_from_vendor(ProviderId::FiveSim, &slug)
                    .or_else(|| {
                        let iso = entry.iso.keys().next()?;
                        CountryCode::new(iso).ok()
                    })?;
                let name = entry
                    .text_en
                    .unwrap_or_else(|| self.catalog.country_name(&code));
                Some(Country { code, name })
            })
            .collect();
        countries.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        countries
    }

    #[tracing::instrument(name = "FiveSimProvider::list_services", skip_all, fields(country = %country))]
    async fn list_services(&self, country: &CountryCode) -> ProviderResult<Vec<PriceQuote>> {
        let slug = self.country_slug(country);
        let prices = self.client.guest_prices(&slug).await?;
        let products = prices.get(&slug).cloned().unwrap_or_default();
        let mut quotes: Vec<PriceQuote> = products
            .into_iter()
            .filter_map(|(product, operators)| {
                // Cheapest operator with stock wins the quote.
                let best = operators
                    .values()
                    .filter(|entry| entry.count > 0)
                    .min_by(|a, b| a.cost.total_cmp(&b.cost))?;
                let service = match ServiceCode::new(&product) {
                    Ok(s) => s,
                    Err(_) => {
                        debug!(product, "skipping unparsable product code");
                        return None;
                    }
                };
                let name = self.catalog.service_name(&service);
                Some(PriceQuote {
                    service,
                    name,
                    cost: best.cost,
                    available: best.count,
                    currency: None,
                })
            })
            .collect();
        quotes.sort_by(|a, b| a.service.as_str().cmp(b.service.as_str()));
        Ok(quotes)
    }

    #[tracing::instrument(
        name = "FiveSimProvider::create_order",
        skip_all,
        fields(country = %country, service = %service)
    )]
    async fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> ProviderResult<ProviderOrder> {
        let slug = self.country_slug(country);
        self.ensure_known_slug(&slug, country).await?;
        let product = self.service_slug(service);
        let activation = self.client.buy_activation(&slug, &product).await?;
        let native_cost = (activation.price > 0.0).then_some(activation.price);
        Ok(ProviderOrder {
            provider_order_id: ProviderOrderId::from(activation.id.to_string()),
            phone_number: PhoneNumber::from(activation.phone),
            native_cost,
            native_currency: None,
            expires_at: activation
                .expires
                .unwrap_or_else(|| Utc::now() + self.order_ttl),
        })
    }

    async fn poll_code(&self, order: &ProviderOrderId) -> ProviderResult<Option<SmsCode>> {
        let reply = self.client.check(order.as_str()).await?;
        match reply.status.as_str() {
            "RECEIVED" | "FINISHED" => Ok(reply
                .sms
                .into_iter()
                .filter_map(|entry| entry.code)
                .next_back()
                .map(SmsCode::from)),
            // PENDING keeps waiting; terminal vendor states surface as
            // no code and are resolved by the expiry sweep.
            _ => Ok(None),
        }
    }

    async fn cancel_order(&self, order: &ProviderOrderId) -> ProviderResult<bool> {
        match self.client.cancel(order.as_str()).await {
            Ok(()) => Ok(true),
            Err(ProviderError::Api { code, .. }) => {
                debug!(code, "5sim declined cancellation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_balance(&self) -> f64 {
        match self.client.balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "5sim balance check failed");
                0.0
            }
        }
    }
}
