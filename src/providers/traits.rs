//! Provider capability-set trait.

use crate::errors::ProviderResult;
use crate::types::{Country, CountryCode, PhoneNumber, PriceQuote, ProviderOrderId, ServiceCode, SmsCode};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Result of a successful rental with a vendor.
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    /// The vendor's own order id (opaque; may be an href).
    pub provider_order_id: ProviderOrderId,
    /// The rented number.
    pub phone_number: PhoneNumber,
    /// Native cost if the vendor reported one at purchase time.
    pub native_cost: Option<f64>,
    /// Currency of `native_cost` when the adapter already converted it
    /// to the billing currency. Left unset otherwise so the price
    /// normalizer applies.
    pub native_currency: Option<crate::types::Currency>,
    /// Deadline for code delivery. Adapters fill a per-vendor default
    /// (15-20 minutes) when the vendor does not supply one.
    pub expires_at: DateTime<Utc>,
}

/// Capability set every vendor adapter implements.
///
/// Each adapter is the sole owner of its vendor's URL scheme, auth
/// conventions and response-parsing quirks; nothing vendor-specific
/// leaks through these methods.
///
/// # Note on async methods
///
/// All async methods return `Send` futures, making them compatible with
/// multi-threaded executors.
#[allow(async_fn_in_trait)]
pub trait SmsProvider: Send + Sync {
    /// Which vendor this adapter speaks to.
    fn id(&self) -> crate::config::ProviderId;

    /// Countries the vendor can rent numbers in. Best-effort: failures
    /// are logged and yield an empty list so the dispatcher can move on
    /// to the next provider. Vendors without a dedicated endpoint derive
    /// the set from their price map.
    fn list_countries(&self) -> impl Future<Output = Vec<Country>> + Send;

    /// Services and native prices for one country.
    fn list_services(
        &self,
        country: &CountryCode,
    ) -> impl Future<Output = ProviderResult<Vec<PriceQuote>>> + Send;

    /// Rent a number for the country/service pair.
    fn create_order(
        &self,
        country: &CountryCode,
        service: &ServiceCode,
    ) -> impl Future<Output = ProviderResult<ProviderOrder>> + Send;

    /// Check for a received code.
    ///
    /// Returns `None` (not an error) while the vendor reports waiting,
    /// and permanently `None` once the vendor reports cancelled.
    fn poll_code(
        &self,
        order: &ProviderOrderId,
    ) -> impl Future<Output = ProviderResult<Option<SmsCode>>> + Send;

    /// Cancel the rental. Idempotent; `false` when the vendor rejects
    /// the cancellation (e.g. already completed) rather than an error.
    fn cancel_order(
        &self,
        order: &ProviderOrderId,
    ) -> impl Future<Output = ProviderResult<bool>> + Send;

    /// Our account balance with the vendor. Returns 0 on any failure;
    /// operational health reporting only, never billing.
    fn get_balance(&self) -> impl Future<Output = f64> + Send;

    /// Per-vendor precondition validation, run before any round-trip so
    /// requests certain to fail are rejected locally.
    ///
    /// Default accepts everything.
    fn check_request(&self, country: &CountryCode, service: &ServiceCode) -> ProviderResult<()> {
        let _ = (country, service);
        Ok(())
    }
}
