//! Tiger SMS adapter.

use super::client::TigerSmsClient;
use crate::catalog::Catalog;
use crate::config::ProviderId;
use crate::errors::{ProviderError, ProviderResult};
use crate::providers::handler_api::PollReply;
use crate::providers::traits::{ProviderOrder, SmsProvider};
use crate::types::{Country, CountryCode, PhoneNumber, PriceQuote, ProviderOrderId, ServiceCode, SmsCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rental lifetime when the vendor reports none.
const DEFAULT_ORDER_TTL_MINUTES: i64 = 20;

/// Adapter for Tiger SMS.
#[derive(Debug, Clone)]
pub struct TigerSmsProvider {
    client: TigerSmsClient,
    catalog: Arc<Catalog>,
    order_ttl: Duration,
}

impl TigerSmsProvider {
    /// Create the adapter.
    pub fn new(client: TigerSmsClient, catalog: Arc<Catalog>) -> Self {
        Self {
            client,
            catalog,
            order_ttl: Duration::minutes(DEFAULT_ORDER_TTL_MINUTES),
        }
    }

    /// Override the default rental lifetime.
    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    fn vendor_country(&self, country: &CountryCode) -> String {
        self.catalog
            .vendor_country(ProviderId::TigerSms, country)
            .unwrap_or_else(|| country.as_str().to_string())
    }
}

impl SmsProvider for TigerSmsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::TigerSms
    }

    async fn list_countries(&self) -> Vec<Country> {
        let prices = match self.client.get_prices(None).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "tiger_sms country listing failed, returning empty");
                return Vec::new();
            }
        };
        let mut countries: Vec<Country> = prices
            .keys()
            .filter_map(|vendor_code| {
                let code = self
                    .catalog
                    .country_from_vendor(ProviderId::TigerSms, vendor_code)?;
                let name = self.catalog.country_name(&code);
                Some(Country { code, name })
            })
            .collect();
        countries.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        countries
    }

    #[tracing::instrument(name = "TigerSmsProvider::list_services", skip_all, fields(country = %country))]
    async fn list_services(&self, country: &CountryCode) -> ProviderResult<Vec<PriceQuote>> {
        let vendor_code = self.vendor_country(country);
        let prices = self.client.get_prices(Some(&vendor_code)).await?;
        let services = prices.get(&vendor_code).cloned().unwrap_or_default();
        let mut quotes: Vec<PriceQuote> = services
            .into_iter()
            .filter_map(|(code, entry)| {
                let service = match ServiceCode::new(&code) {
                    Ok(s) => s,
                    Err(_) => {
                        debug!(code, "skipping unparsable service code");
                        return None;
                    }
                };
                let name = self.catalog.service_name(&service);
                Some(PriceQuote {
                    service,
                    name,
                    cost: entry.cost,
                    available: entry.count,
                    currency: None,
                })
            })
            .collect();
        quotes.sort_by(|a, b| a.service.as_str().cmp(b.service.as_str()));
        Ok(quotes)
    }

    #[tracing::instrument(
        name = "TigerSmsProvider::create_order",
        skip_all,
        fields(country = %country, service = %service)
    )]
    async fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> ProviderResult<ProviderOrder> {
        let vendor_code = self.vendor_country(country);
        let number = self.client.get_number(&vendor_code, service.as_str()).await?;
        // getNumber carries no price; the dispatcher resolves cost from
        // the price map.
        Ok(ProviderOrder {
            provider_order_id: ProviderOrderId::from(number.id),
            phone_number: PhoneNumber::from(number.phone),
            native_cost: None,
            native_currency: None,
            expires_at: Utc::now() + self.order_ttl,
        })
    }

    async fn poll_code(&self, order: &ProviderOrderId) -> ProviderResult<Option<SmsCode>> {
        match self.client.get_status(order.as_str()).await? {
            PollReply::Ok(code) => Ok(Some(SmsCode::from(code))),
            PollReply::Waiting | PollReply::Cancelled => Ok(None),
        }
    }

    async fn cancel_order(&self, order: &ProviderOrderId) -> ProviderResult<bool> {
        match self.client.cancel(order.as_str()).await {
            Ok(confirmed) => Ok(confirmed),
            // Vendor-reported rejection (already completed, too early):
            // cancellation refused, not a failure.
            Err(ProviderError::Api { code, .. }) => {
                debug!(code, "tiger_sms declined cancellation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_balance(&self) -> f64 {
        match self.client.get_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "tiger_sms balance check failed");
                0.0
            }
        }
    }
}
