//! Price normalization.
//!
//! Converts a provider's native cost into the billed amount. Pure and
//! deterministic: all knobs arrive through [`PricingConfig`] at call
//! time, never through ambient settings.

use crate::config::ProviderId;
use crate::types::Currency;
use std::collections::HashMap;

/// Flat surcharge applied when the configured value is absent.
pub const DEFAULT_VAT_NGN: f64 = 700.0;

/// Per-provider pricing overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceOverride {
    /// FX rate override for this provider.
    pub fx_rate: Option<f64>,
    /// Markup percentage override for this provider.
    pub markup_percent: Option<f64>,
}

/// Pricing knobs for the normalizer.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Global FX rate (billing units per native unit).
    pub fx_rate: f64,
    /// Lower bound on any FX rate, guarding against stale feeds
    /// under-pricing orders.
    pub fx_floor: f64,
    /// Global markup percentage.
    pub markup_percent: f64,
    /// Flat surcharge in billing units; falls back to
    /// [`DEFAULT_VAT_NGN`] when unset.
    pub vat: Option<f64>,
    /// Per-provider overrides.
    pub overrides: HashMap<ProviderId, PriceOverride>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fx_rate: 1600.0,
            fx_floor: 1000.0,
            markup_percent: 0.0,
            vat: None,
            overrides: HashMap::new(),
        }
    }
}

impl PricingConfig {
    /// Set the global FX rate.
    pub fn with_fx_rate(mut self, rate: f64) -> Self {
        self.fx_rate = rate;
        self
    }

    /// Set the FX floor.
    pub fn with_fx_floor(mut self, floor: f64) -> Self {
        self.fx_floor = floor;
        self
    }

    /// Set the global markup percentage.
    pub fn with_markup_percent(mut self, markup: f64) -> Self {
        self.markup_percent = markup;
        self
    }

    /// Set the flat surcharge.
    pub fn with_vat(mut self, vat: f64) -> Self {
        self.vat = Some(vat);
        self
    }

    /// Add a per-provider override.
    pub fn with_override(mut self, provider: ProviderId, over: PriceOverride) -> Self {
        self.overrides.insert(provider, over);
        self
    }

    fn fx_rate_for(&self, provider: ProviderId) -> f64 {
        let rate = self
            .overrides
            .get(&provider)
            .and_then(|o| o.fx_rate)
            .unwrap_or(self.fx_rate);
        rate.max(self.fx_floor)
    }

    fn markup_for(&self, provider: ProviderId) -> f64 {
        self.overrides
            .get(&provider)
            .and_then(|o| o.markup_percent)
            .unwrap_or(self.markup_percent)
    }

    fn vat_amount(&self) -> f64 {
        self.vat.unwrap_or(DEFAULT_VAT_NGN)
    }
}

/// Convert a native cost into the billed amount.
///
/// When `native_currency` is already the billing currency the cost
/// passes through unchanged: the adapter normalized it and converting
/// again would double-bill. Otherwise the FX rate (floored), markup and
/// flat surcharge are applied and the result is ceiled so fractional
/// rounding never under-charges.
pub fn normalize(
    native_cost: f64,
    provider: ProviderId,
    native_currency: Option<Currency>,
    config: &PricingConfig,
) -> f64 {
    if native_currency == Some(Currency::BILLING) {
        return native_cost;
    }
    let rate = config.fx_rate_for(provider);
    let markup = config.markup_for(provider);
    let converted = native_cost * rate * (1.0 + markup / 100.0);
    (converted + config.vat_amount()).ceil()
}
