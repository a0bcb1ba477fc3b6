//! Dassy adapter.

use super::client::DassyClient;
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
const DEFAULT_ORDER_TTL_MINUTES: i64 = 15;

/// Vendor id for the United States in the handler dialect.
const US_VENDOR_CODE: &str = "187";

/// Adapter for Dassy. United States numbers only.
#[derive(Debug, Clone)]
pub struct DassyProvider {
    client: DassyClient,
    catalog: Arc<Catalog>,
    order_ttl: Duration,
}

impl DassyProvider {
    /// Create the adapter.
    pub fn new(client: DassyClient, catalog: Arc<Catalog>) -> Self {
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

    fn us_code(&self) -> CountryCode {
        CountryCode::new("US").unwrap_or_else(|_| unreachable!())
    }

    fn vendor_country(&self) -> String {
        self.catalog
            .vendor_country(ProviderId::Dassy, &self.us_code())
            .unwrap_or_else(|| US_VENDOR_CODE.to_string())
    }
}

impl SmsProvider for DassyProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Dassy
    }

    fn check_request(&self, country: &CountryCode, _service: &ServiceCode) -> ProviderResult<()> {
        if country.as_str() != "US" {
            return Err(ProviderError::Unsupported {
                reason: format!("dassy serves US numbers only, got {country}"),
            });
        }
        Ok(())
    }

    async fn list_countries(&self) -> Vec<Country> {
        let code = self.us_code();
        let name = self.catalog.country_name(&code);
        vec![Country { code, name }]
    }

    #[tracing::instrument(name = "DassyProvider::list_services", skip_all, fields(country = %country))]
    async fn list_services(&self, country: &CountryCode) -> ProviderResult<Vec<PriceQuote>> {
        if country.as_str() != "US" {
            return Err(ProviderError::Unsupported {
                reason: format!("dassy serves US numbers only, got {country}"),
            });
        }
        let vendor_code = self.vendor_country();
        let prices = self.client.get_prices().await?;
        let mut quotes: Vec<PriceQuote> = prices
            .into_iter()
            .filter_map(|(code, by_country)| {
                let entry = by_country.get(&vendor_code).copied()?;
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
        name = "DassyProvider::create_order",
        skip_all,
        fields(country = %country, service = %service)
    )]
    async fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> ProviderResult<ProviderOrder> {
        self.check_request(country, service)?;
        let vendor_code = self.vendor_country();
        let number = self.client.get_number(&vendor_code, service.as_str()).await?;
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
            Err(ProviderError::Api { code, .. }) => {
                debug!(code, "dassy declined cancellation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_balance(&self) -> f64 {
        match self.client.get_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "dassy balance check failed");
                0.0
            }
        }
    }
}
