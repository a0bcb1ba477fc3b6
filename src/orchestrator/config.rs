//! Dispatcher tuning knobs.

use crate::pricing::PricingConfig;
use std::time::Duration;

/// How long country and service listings are served from cache.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct SmsServiceConfig {
    /// TTL for the listing caches.
    pub cache_ttl: Duration,
    /// Price normalization parameters.
    pub pricing: PricingConfig,
}

impl Default for SmsServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            pricing: PricingConfig::default(),
        }
    }
}

impl SmsServiceConfig {
    /// Config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listing cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the pricing parameters.
    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }
}
