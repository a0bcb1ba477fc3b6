//! Closed adapter set with enum dispatch.
//!
//! The dispatcher holds one [`ProviderAdapter`] per configured vendor in
//! a map built at startup; nothing outside this module constructs a
//! concrete adapter.

use crate::catalog::Catalog;
use crate::config::{ProviderConfig, ProviderId};
use crate::errors::{ProviderError, ProviderResult};
use crate::http::{HttpClient, HttpTimeouts};
use crate::providers::dassy::{DassyClient, DassyProvider};
use crate::providers::five_sim::{FiveSimClient, FiveSimProvider};
use crate::providers::sms_pool::{SmsPoolClient, SmsPoolProvider};
use crate::providers::text_verified::{TextVerifiedClient, TextVerifiedProvider};
use crate::providers::tiger_sms::{TigerSmsClient, TigerSmsProvider};
use crate::providers::traits::{ProviderOrder, SmsProvider};
use crate::types::{Country, CountryCode, PriceQuote, ProviderOrderId, ServiceCode, SmsCode};
use std::sync::Arc;

/// One vendor adapter behind a uniform surface.
#[derive(Debug, Clone)]
pub enum ProviderAdapter {
    TigerSms(TigerSmsProvider),
    FiveSim(FiveSimProvider),
    Dassy(DassyProvider),
    TextVerified(TextVerifiedProvider),
    SmsPool(SmsPoolProvider),
}

impl ProviderAdapter {
    /// Build the adapter a config describes.
    pub fn from_config(config: &ProviderConfig, catalog: Arc<Catalog>) -> ProviderResult<Self> {
        let timeouts = match config.settings.request_timeout {
            Some(total) => HttpTimeouts::default().with_total(total),
            None => HttpTimeouts::default(),
        };
        let http = HttpClient::new(timeouts)?;
        let api_key = config.credentials.api_key.clone();
        let base_url = config.base_url.clone();
        let order_ttl = config
            .settings
            .order_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok());

        let adapter = match config.id {
            ProviderId::TigerSms => {
                let mut provider =
                    TigerSmsProvider::new(TigerSmsClient::new(base_url, api_key, http), catalog);
                if let Some(ttl) = order_ttl {
                    provider = provider.with_order_ttl(ttl);
                }
                ProviderAdapter::TigerSms(provider)
            }
            ProviderId::FiveSim => {
                let mut provider =
                    FiveSimProvider::new(FiveSimClient::new(base_url, api_key, http), catalog);
                if let Some(ttl) = order_ttl {
                    provider = provider.with_order_ttl(ttl);
                }
                ProviderAdapter::FiveSim(provider)
            }
            ProviderId::Dassy => {
                let mut provider =
                    DassyProvider::new(DassyClient::new(base_url, api_key, http), catalog);
                if let Some(ttl) = order_ttl {
                    provider = provider.with_order_ttl(ttl);
                }
                ProviderAdapter::Dassy(provider)
            }
            ProviderId::TextVerified => {
                let username = config.credentials.username.clone().ok_or_else(|| {
                    ProviderError::Unsupported {
                        reason: "textverified requires a username credential".to_string(),
                    }
                })?;
                let mut provider = TextVerifiedProvider::new(
                    TextVerifiedClient::new(base_url, api_key, username, http),
                    catalog,
                );
                if let Some(ttl) = order_ttl {
                    provider = provider.with_order_ttl(ttl);
                }
                ProviderAdapter::TextVerified(provider)
            }
            ProviderId::SmsPool => {
                let mut provider =
                    SmsPoolProvider::new(SmsPoolClient::new(base_url, api_key, http), catalog);
                if let Some(ttl) = order_ttl {
                    provider = provider.with_order_ttl(ttl);
                }
                ProviderAdapter::SmsPool(provider)
            }
        };
        Ok(adapter)
    }
}

macro_rules! dispatch {
    ($self:expr, $provider:pat => $body:expr) => {
        match $self {
            ProviderAdapter::TigerSms($provider) => $body,
            ProviderAdapter::FiveSim($provider) => $body,
            ProviderAdapter::Dassy($provider) => $body,
            ProviderAdapter::TextVerified($provider) => $body,
            ProviderAdapter::SmsPool($provider) => $body,
        }
    };
}

impl SmsProvider for ProviderAdapter {
    fn id(&self) -> ProviderId {
        dispatch!(self, p => p.id())
    }

    fn check_request(&self, country: &CountryCode, service: &ServiceCode) -> ProviderResult<()> {
        dispatch!(self, p => p.check_request(country, service))
    }

    async fn list_countries(&self) -> Vec<Country> {
        dispatch!(self, p => p.list_countries().await)
    }

    async fn list_services(&self, country: &CountryCode) -> ProviderResult<Vec<PriceQuote>> {
        dispatch!(self, p => p.list_services(country).await)
    }

    async fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> ProviderResult<ProviderOrder> {
        dispatch!(self, p => p.create_order(country, service).await)
    }

    async fn poll_code(&self, order: &ProviderOrderId) -> ProviderResult<Option<SmsCode>> {
        dispatch!(self, p => p.poll_code(order).await)
    }

    async fn cancel_order(&self, order: &ProviderOrderId) -> ProviderResult<bool> {
        dispatch!(self, p => p.cancel_order(order).await)
    }

    async fn get_balance(&self) -> f64 {
        dispatch!(self, p => p.get_balance().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;
    use url::Url;

    fn base_config(id: ProviderId) -> ProviderConfig {
        ProviderConfig::new(
            id,
            Url::parse("http://localhost:9").unwrap(),
            ProviderCredentials::api_key("k"),
        )
    }

    #[test]
    fn test_from_config_builds_matching_variant() {
        let catalog = Arc::new(Catalog::empty());
        for id in [ProviderId::TigerSms, ProviderId::FiveSim, ProviderId::Dassy, ProviderId::SmsPool] {
            let adapter = ProviderAdapter::from_config(&base_config(id), catalog.clone()).unwrap();
            assert_eq!(adapter.id(), id);
        }
    }

    #[test]
    fn test_textverified_requires_username() {
        let catalog = Arc::new(Catalog::empty());
        let config = base_config(ProviderId::TextVerified);
        let err = ProviderAdapter::from_config(&config, catalog.clone()).unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { .. }));

        let mut config = base_config(ProviderId::TextVerified);
        config.credentials = ProviderCredentials::api_key("k").with_username("u@example.com");
        let adapter = ProviderAdapter::from_config(&config, catalog).unwrap();
        assert_eq!(adapter.id(), ProviderId::TextVerified);
    }
}
