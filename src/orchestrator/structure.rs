//! The dispatcher: provider selection, failover and order lifecycle.

use crate::cache::TtlCache;
use crate::catalog::Catalog;
use crate::config::{ProviderConfig, ProviderHealth, ProviderId, ProviderStats};
use crate::order::{OrderStatus, SmsOrder};
use crate::orchestrator::config::SmsServiceConfig;
use crate::orchestrator::error::{ServiceError, ServiceResult};
use crate::pricing::normalize;
use crate::providers::adapter::ProviderAdapter;
use crate::providers::traits::{ProviderOrder, SmsProvider};
use crate::store::{OrderStore, StoreError};
use crate::types::{
    AccountId, Country, CountryCode, OrderId, PriceQuote, SelectionMode, ServiceCode, SmsCode,
};
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An order request from the caller.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Requested country.
    pub country: CountryCode,
    /// Requested service.
    pub service: ServiceCode,
    /// Auto failover or a pinned provider.
    pub mode: SelectionMode,
    /// The pinned provider; required in manual mode.
    pub provider: Option<ProviderId>,
}

impl OrderRequest {
    /// Auto-mode request.
    pub fn auto(country: CountryCode, service: ServiceCode) -> Self {
        Self {
            country,
            service,
            mode: SelectionMode::Auto,
            provider: None,
        }
    }

    /// Manual-mode request pinned to one provider.
    pub fn manual(country: CountryCode, service: ServiceCode, provider: ProviderId) -> Self {
        Self {
            country,
            service,
            mode: SelectionMode::Manual,
            provider: Some(provider),
        }
    }
}

/// Result of a code check.
#[derive(Debug, Clone, Serialize)]
pub struct CodeStatus {
    /// The code, once received.
    pub code: Option<SmsCode>,
    /// Current order state.
    pub status: OrderStatus,
}

/// One purchasable service at one provider, priced in the billing
/// currency.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceOffer {
    /// Offering provider.
    pub provider: ProviderId,
    /// Service code.
    pub service: ServiceCode,
    /// Display name.
    pub name: String,
    /// Billed cost per order.
    pub cost: f64,
    /// Numbers currently available.
    pub available: u32,
}

struct ProviderEntry {
    config: ProviderConfig,
    adapter: ProviderAdapter,
    stats: Arc<ProviderStats>,
}

/// Provider-agnostic fulfillment service.
///
/// Owns the adapter registry, the listing caches and the order
/// lifecycle. Provider selection is priority-ordered with random
/// tie-breaking; a failed candidate is skipped, never retried within
/// the same request.
pub struct SmsService<S: OrderStore> {
    entries: HashMap<ProviderId, ProviderEntry>,
    store: S,
    config: SmsServiceConfig,
    countries_cache: TtlCache<ProviderId, Vec<Country>>,
    services_cache: TtlCache<(ProviderId, CountryCode), Vec<PriceQuote>>,
}

impl<S: OrderStore> SmsService<S> {
    /// Build the service from provider configs.
    ///
    /// Inactive providers still get an entry (so manual pinning can
    /// report them as inactive rather than unknown); they are skipped
    /// by auto selection.
    pub fn new(
        providers: Vec<ProviderConfig>,
        catalog: Arc<Catalog>,
        store: S,
        config: SmsServiceConfig,
    ) -> ServiceResult<Self> {
        let mut entries = HashMap::new();
        for provider_config in providers {
            let adapter = ProviderAdapter::from_config(&provider_config, catalog.clone())
                .map_err(|e| ServiceError::Validation {
                    reason: format!("cannot build {} adapter: {e}", provider_config.id),
                })?;
            entries.insert(
                provider_config.id,
                ProviderEntry {
                    config: provider_config,
                    adapter,
                    stats: Arc::new(ProviderStats::new()),
                },
            );
        }
        let cache_ttl = config.cache_ttl;
        Ok(Self {
            entries,
            store,
            config,
            countries_cache: TtlCache::new(cache_ttl),
            services_cache: TtlCache::new(cache_ttl),
        })
    }

    /// Direct access to the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn entry(&self, provider: ProviderId) -> ServiceResult<&ProviderEntry> {
        self.entries
            .get(&provider)
            .ok_or_else(|| ServiceError::Validation {
                reason: format!("provider {provider} is not configured"),
            })
    }

    /// Active providers, best priority first.
    fn active_by_priority(&self) -> Vec<&ProviderEntry> {
        let mut active: Vec<&ProviderEntry> = self
            .entries
            .values()
            .filter(|entry| entry.config.is_active)
            .collect();
        active.sort_by_key(|entry| entry.config.priority);
        active
    }

    async fn provider_countries(&self, entry: &ProviderEntry) -> Vec<Country> {
        let provider = entry.config.id;
        if let Some(cached) = self.countries_cache.get(&provider) {
            return cached;
        }
        let countries = entry.adapter.list_countries().await;
        if !countries.is_empty() {
            self.countries_cache.insert(provider, countries.clone());
        }
        countries
    }

    /// Countries on offer, cached per provider.
    ///
    /// With no filter, the union across all active providers.
    pub async fn list_countries(
        &self,
        provider: Option<ProviderId>,
    ) -> ServiceResult<Vec<Country>> {
        match provider {
            Some(provider) => Ok(self.provider_countries(self.entry(provider)?).await),
            None => {
                let mut merged: Vec<Country> = Vec::new();
                for entry in self.active_by_priority() {
                    for country in self.provider_countries(entry).await {
                        if !merged.iter().any(|known| known.code == country.code) {
                            merged.push(country);
                        }
                    }
                }
                merged.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
                Ok(merged)
            }
        }
    }

    async fn raw_services(
        &self,
        entry: &ProviderEntry,
        country: &CountryCode,
    ) -> ServiceResult<Vec<PriceQuote>> {
        let key = (entry.config.id, country.clone());
        if let Some(cached) = self.services_cache.get(&key) {
            return Ok(cached);
        }
        let quotes = entry
            .adapter
            .list_services(country)
            .await
            .map_err(|source| ServiceError::Provider {
                provider: entry.config.id,
                source,
            })?;
        self.services_cache.insert(key, quotes.clone());
        Ok(quotes)
    }

    fn offers(&self, provider: ProviderId, quotes: Vec<PriceQuote>) -> Vec<ServiceOffer> {
        quotes
            .into_iter()
            .map(|quote| ServiceOffer {
                provider,
                service: quote.service,
                name: quote.name,
                cost: normalize(quote.cost, provider, quote.currency, &self.config.pricing),
                available: quote.available,
            })
            .collect()
    }

    /// Services on offer in a country, priced in the billing currency.
    ///
    /// With no filter, the aggregate across all active providers; a
    /// provider whose listing fails is skipped instead of failing the
    /// whole aggregate.
    pub async fn list_services(
        &self,
        provider: Option<ProviderId>,
        country: &CountryCode,
    ) -> ServiceResult<Vec<ServiceOffer>> {
        match provider {
            Some(provider) => {
                let entry = self.entry(provider)?;
                let quotes = self.raw_services(entry, country).await?;
                Ok(self.offers(provider, quotes))
            }
            None => {
                let mut offers = Vec::new();
                for entry in self.active_by_priority() {
                    match self.raw_services(entry, country).await {
                        Ok(quotes) => offers.extend(self.offers(entry.config.id, quotes)),
                        Err(e) => {
                            warn!(provider = %entry.config.id, error = %e, "listing failed, provider skipped");
                        }
                    }
                }
                Ok(offers)
            }
        }
    }

    /// Candidates for an order, best first.
    fn candidates(&self, request: &OrderRequest) -> ServiceResult<Vec<&ProviderEntry>> {
        match (request.mode, request.provider) {
            (SelectionMode::Manual, Some(provider)) => {
                let entry = self.entry(provider)?;
                if !entry.config.is_active {
                    return Err(ServiceError::Validation {
                        reason: format!("provider {provider} is inactive"),
                    });
                }
                Ok(vec![entry])
            }
            (SelectionMode::Manual, None) => Err(ServiceError::Validation {
                reason: "manual mode requires a provider".to_string(),
            }),
            (SelectionMode::Auto, Some(_)) => Err(ServiceError::Validation {
                reason: "a provider may only be pinned in manual mode".to_string(),
            }),
            (SelectionMode::Auto, None) => {
                let mut active: Vec<&ProviderEntry> = self
                    .entries
                    .values()
                    .filter(|entry| entry.config.is_active)
                    .collect();
                // Shuffle first so equal priorities rotate; the sort is
                // stable, preserving the shuffle within each tier.
                active.shuffle(&mut rand::thread_rng());
                active.sort_by_key(|entry| entry.config.priority);
                Ok(active)
            }
        }
    }

    /// Billed cost for a fresh rental, in the billing currency.
    ///
    /// The vendor-reported purchase price wins; vendors that do not
    /// price at purchase time fall back to their listing.
    async fn billed_cost(
        &self,
        entry: &ProviderEntry,
        request: &OrderRequest,
        placed: &ProviderOrder,
    ) -> Option<f64> {
        if let Some(cost) = placed.native_cost.filter(|c| *c > 0.0) {
            return Some(normalize(
                cost,
                entry.config.id,
                placed.native_currency,
                &self.config.pricing,
            ));
        }
        let quotes = self.raw_services(entry, &request.country).await.ok()?;
        let quote = quotes
            .into_iter()
            .find(|quote| quote.service == request.service)
            .filter(|quote| quote.cost > 0.0)?;
        Some(normalize(
            quote.cost,
            entry.config.id,
            quote.currency,
            &self.config.pricing,
        ))
    }

    /// Place an order, failing over across providers in auto mode.
    #[tracing::instrument(
        name = "SmsService::create_order",
        skip_all,
        fields(account = %account, country = %request.country, service = %request.service, mode = %request.mode)
    )]
    pub async fn create_order(
        &self,
        account: &AccountId,
        request: OrderRequest,
    ) -> ServiceResult<SmsOrder> {
        let candidates = self.candidates(&request)?;

        let available = self.store.balance(account).await?;
        if available <= 0.0 {
            return Err(ServiceError::InsufficientBalance { available });
        }

        for entry in &candidates {
            let provider = entry.config.id;
            if let Err(e) = entry.adapter.check_request(&request.country, &request.service) {
                debug!(%provider, error = %e, "provider rejected request preconditions");
                entry.stats.record_failure();
                continue;
            }
            let placed = match entry
                .adapter
                .create_order(&request.country, &request.service)
                .await
            {
                Ok(placed) => placed,
                Err(e) => {
                    warn!(%provider, error = %e, "provider failed to place order");
                    entry.stats.record_failure();
                    continue;
                }
            };
            let Some(cost) = self.billed_cost(entry, &request, &placed).await else {
                warn!(%provider, "no resolvable price for rental, releasing it");
                self.release_rental(entry, &placed).await;
                entry.stats.record_failure();
                continue;
            };

            let order = SmsOrder {
                id: OrderId::new(),
                account: account.clone(),
                provider,
                provider_order_id: placed.provider_order_id.clone(),
                phone_number: placed.phone_number.clone(),
                country: request.country.clone(),
                service: request.service.clone(),
                mode: request.mode,
                cost,
                status: OrderStatus::Active,
                sms_code: None,
                created_at: Utc::now(),
                expires_at: placed.expires_at,
                received_at: None,
                provider_name: entry.config.display_name.clone(),
                provider_success_rate: entry.stats.success_rate(),
            };

            if let Err(e) = self.store.commit_order(&order).await {
                self.release_rental(entry, &placed).await;
                return Err(e.into());
            }
            entry.stats.record_success();
            info!(%provider, order = %order.id, cost, "order placed");
            return Ok(order);
        }

        match request.mode {
            SelectionMode::Manual => {
                // Candidate resolution guarantees a pinned provider here.
                let provider = request.provider.ok_or(ServiceError::AllProvidersExhausted)?;
                Err(ServiceError::PinnedProviderUnavailable(provider))
            }
            SelectionMode::Auto => Err(ServiceError::AllProvidersExhausted),
        }
    }

    /// Best-effort release of a rental that will not be billed.
    async fn release_rental(&self, entry: &ProviderEntry, placed: &ProviderOrder) {
        if let Err(e) = entry.adapter.cancel_order(&placed.provider_order_id).await {
            warn!(provider = %entry.config.id, error = %e, "failed to release unbilled rental");
        }
    }

    /// Replay the stored state after losing a write race with another
    /// request.
    async fn stored_status(&self, id: &OrderId) -> ServiceResult<CodeStatus> {
        let stored = self
            .store
            .order(id)
            .await?
            .ok_or(ServiceError::OrderNotFound(*id))?;
        Ok(CodeStatus {
            code: stored.sms_code,
            status: stored.status,
        })
    }

    /// Check an order for its code, settling expiry on the way.
    #[tracing::instrument(name = "SmsService::get_code", skip_all, fields(order = %id))]
    pub async fn get_code(&self, id: &OrderId) -> ServiceResult<CodeStatus> {
        let mut order = self
            .store
            .order(id)
            .await?
            .ok_or(ServiceError::OrderNotFound(*id))?;

        if order.status.is_terminal() {
            return Ok(CodeStatus {
                code: order.sms_code,
                status: order.status,
            });
        }

        // Expiry is settled before the vendor round-trip so a dead
        // vendor cannot keep an order active past its deadline.
        if order.is_expired(Utc::now()) {
            if order.expire().is_ok() {
                match self.store.update_order(&order).await {
                    Ok(()) => {}
                    Err(StoreError::OrderNotActive(_)) => return self.stored_status(id).await,
                    Err(e) => return Err(e.into()),
                }
            }
            return Ok(CodeStatus {
                code: None,
                status: order.status,
            });
        }

        let entry = self.entry(order.provider)?;
        match entry.adapter.poll_code(&order.provider_order_id).await {
            Ok(Some(code)) => {
                if order.complete(code.clone(), Utc::now()).is_ok() {
                    match self.store.update_order(&order).await {
                        Ok(()) => {}
                        Err(StoreError::OrderNotActive(_)) => return self.stored_status(id).await,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(CodeStatus {
                    code: Some(code),
                    status: order.status,
                })
            }
            Ok(None) => Ok(CodeStatus {
                code: None,
                status: order.status,
            }),
            Err(e) => {
                // Transient vendor trouble; the order stays active and
                // the caller polls again.
                warn!(provider = %order.provider, error = %e, "code poll failed");
                Ok(CodeStatus {
                    code: None,
                    status: order.status,
                })
            }
        }
    }

    /// Cancel an active order and refund it.
    ///
    /// The refund happens only after the vendor confirms; a declined
    /// cancellation leaves the order active and the debit in place.
    #[tracing::instrument(name = "SmsService::cancel_order", skip_all, fields(order = %id))]
    pub async fn cancel_order(&self, id: &OrderId) -> ServiceResult<SmsOrder> {
        let mut order = self
            .store
            .order(id)
            .await?
            .ok_or(ServiceError::OrderNotFound(*id))?;
        if order.status.is_terminal() {
            return Err(ServiceError::OrderNotCancellable(*id));
        }

        let entry = self.entry(order.provider)?;
        let confirmed = match entry.adapter.cancel_order(&order.provider_order_id).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                warn!(provider = %order.provider, error = %e, "cancellation call failed");
                false
            }
        };
        if !confirmed {
            return Err(ServiceError::CancellationDeclined(*id));
        }

        order
            .cancel()
            .map_err(|_| ServiceError::OrderNotCancellable(*id))?;
        // The store re-checks the stored status under its own lock; a
        // concurrent cancellation or completion that won the race turns
        // this refund into a rejection instead of a second credit.
        match self.store.refund_order(&order).await {
            Ok(_) => {}
            Err(StoreError::OrderNotActive(_)) => {
                return Err(ServiceError::OrderNotCancellable(*id));
            }
            Err(e) => return Err(e.into()),
        }
        info!(order = %order.id, amount = order.cost, "order cancelled and refunded");
        Ok(order)
    }

    /// Refresh the recorded vendor balance of every provider.
    pub async fn refresh_balances(&self) {
        for entry in self.entries.values() {
            let balance = entry.adapter.get_balance().await;
            entry.stats.record_balance(balance);
        }
    }

    /// Health snapshot of every configured provider, best priority
    /// first.
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        let mut health: Vec<ProviderHealth> = self
            .entries
            .values()
            .map(|entry| ProviderHealth {
                provider: entry.config.id,
                is_active: entry.config.is_active,
                priority: entry.config.priority,
                total_orders: entry.stats.total_orders(),
                successful_orders: entry.stats.successful_orders(),
                success_rate: entry.stats.success_rate(),
                last_balance: entry.stats.last_balance(),
            })
            .collect();
        health.sort_by_key(|h| h.priority);
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;
    use crate::store::MemoryStore;
    use url::Url;

    fn service_with(providers: Vec<ProviderConfig>) -> SmsService<MemoryStore> {
        SmsService::new(
            providers,
            Arc::new(Catalog::empty()),
            MemoryStore::new(),
            SmsServiceConfig::default(),
        )
        .unwrap()
    }

    fn config(id: ProviderId, priority: u8, active: bool) -> ProviderConfig {
        ProviderConfig::new(
            id,
            Url::parse("http://localhost:9").unwrap(),
            ProviderCredentials::api_key("k"),
        )
        .with_priority(priority)
        .with_active(active)
    }

    #[tokio::test]
    async fn test_manual_mode_requires_provider() {
        let service = service_with(vec![config(ProviderId::TigerSms, 1, true)]);
        let request = OrderRequest {
            country: CountryCode::new("US").unwrap(),
            service: ServiceCode::new("wa").unwrap(),
            mode: SelectionMode::Manual,
            provider: None,
        };
        let err = service
            .create_order(&AccountId::from("acct"), request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_manual_mode_rejects_unknown_and_inactive() {
        let service = service_with(vec![config(ProviderId::TigerSms, 1, false)]);
        let country = CountryCode::new("US").unwrap();
        let code = ServiceCode::new("wa").unwrap();

        let err = service
            .create_order(
                &AccountId::from("acct"),
                OrderRequest::manual(country.clone(), code.clone(), ProviderId::SmsPool),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .create_order(
                &AccountId::from("acct"),
                OrderRequest::manual(country, code, ProviderId::TigerSms),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_auto_mode_rejects_pinned_provider() {
        let service = service_with(vec![config(ProviderId::TigerSms, 1, true)]);
        let request = OrderRequest {
            country: CountryCode::new("US").unwrap(),
            service: ServiceCode::new("wa").unwrap(),
            mode: SelectionMode::Auto,
            provider: Some(ProviderId::TigerSms),
        };
        let err = service
            .create_order(&AccountId::from("acct"), request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_zero_balance_fails_before_any_vendor_call() {
        let service = service_with(vec![config(ProviderId::TigerSms, 1, true)]);
        let account = AccountId::from("acct");
        service.store().deposit(&account, 0.0);

        let err = service
            .create_order(
                &account,
                OrderRequest::auto(
                    CountryCode::new("US").unwrap(),
                    ServiceCode::new("wa").unwrap(),
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn test_candidates_ordered_by_priority() {
        let service = service_with(vec![
            config(ProviderId::SmsPool, 30, true),
            config(ProviderId::TigerSms, 1, true),
            config(ProviderId::Dassy, 10, true),
            config(ProviderId::FiveSim, 10, false),
        ]);
        let request = OrderRequest::auto(
            CountryCode::new("US").unwrap(),
            ServiceCode::new("wa").unwrap(),
        );
        let candidates = service.candidates(&request).unwrap();
        let order: Vec<ProviderId> = candidates.iter().map(|e| e.config.id).collect();
        assert_eq!(
            order,
            vec![ProviderId::TigerSms, ProviderId::Dassy, ProviderId::SmsPool]
        );
    }

    #[test]
    fn test_provider_health_sorted_by_priority() {
        let service = service_with(vec![
            config(ProviderId::SmsPool, 30, true),
            config(ProviderId::TigerSms, 1, true),
        ]);
        let health = service.provider_health();
        assert_eq!(health[0].provider, ProviderId::TigerSms);
        assert_eq!(health[1].provider, ProviderId::SmsPool);
        assert_eq!(health[0].success_rate, 1.0);
    }
}
