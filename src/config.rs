//! Provider configuration and per-provider statistics.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

// =============================================================================
// ProviderId
// =============================================================================

/// Closed set of supported vendors.
///
/// The dispatcher resolves a [`ProviderId`] to an adapter through a map
/// built once at startup; nothing outside the adapters branches on the
/// vendor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Tiger SMS (handler-API dialect, RUB).
    TigerSms,
    /// 5Sim (JSON guest + bearer user API, RUB).
    FiveSim,
    /// DaisySMS (handler-API dialect, USD, US-only).
    Dassy,
    /// TextVerified (bearer-token exchange, USD, US-only).
    TextVerified,
    /// SMSPool (form-encoded JSON REST, USD).
    SmsPool,
}

/// Error when parsing a provider id.
#[derive(Debug, Clone, Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl ProviderId {
    /// Stable string code used in configuration and the inbound API.
    pub fn code(&self) -> &'static str {
        match self {
            ProviderId::TigerSms => "tiger_sms",
            ProviderId::FiveSim => "five_sim",
            ProviderId::Dassy => "dassy",
            ProviderId::TextVerified => "text_verified",
            ProviderId::SmsPool => "sms_pool",
        }
    }

    /// All supported providers.
    pub fn all() -> [ProviderId; 5] {
        [
            ProviderId::TigerSms,
            ProviderId::FiveSim,
            ProviderId::Dassy,
            ProviderId::TextVerified,
            ProviderId::SmsPool,
        ]
    }
}

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiger_sms" | "tigersms" => Ok(ProviderId::TigerSms),
            "five_sim" | "5sim" | "fivesim" => Ok(ProviderId::FiveSim),
            "dassy" | "daisysms" => Ok(ProviderId::Dassy),
            "text_verified" | "textverified" => Ok(ProviderId::TextVerified),
            "sms_pool" | "smspool" => Ok(ProviderId::SmsPool),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// Credentials & settings
// =============================================================================

/// Vendor credentials.
///
/// `username` is only needed by vendors that exchange an API key plus
/// username for a short-lived bearer token.
#[derive(Clone)]
pub struct ProviderCredentials {
    /// API key, sent on every request (or exchanged for a token).
    pub api_key: SecretString,
    /// Account username, for bearer-exchange vendors.
    pub username: Option<String>,
    /// Secret used to authenticate inbound webhook pushes.
    pub webhook_secret: Option<SecretString>,
}

impl ProviderCredentials {
    /// Credentials with only an API key.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(key.into()),
            username: None,
            webhook_secret: None,
        }
    }

    /// Attach an account username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach a webhook signing secret.
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(SecretString::from(secret.into()));
        self
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &"[REDACTED]")
            .field("username", &self.username)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Free-form per-provider settings.
///
/// Typed fields cover the knobs the core reads; anything vendor-specific
/// goes into `extra`.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// Override for the per-request total timeout.
    pub request_timeout: Option<Duration>,
    /// Override for the default rental lifetime when the vendor does not
    /// report an expiry.
    pub order_ttl: Option<Duration>,
    /// Vendor-specific toggles, passed through to the adapter.
    pub extra: HashMap<String, String>,
}

// =============================================================================
// ProviderConfig
// =============================================================================

/// Configuration for one vendor, read by the dispatcher on every call.
///
/// Created and updated by configuration management, which is out of
/// scope here.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which vendor this configures.
    pub id: ProviderId,
    /// Human-readable name, denormalized onto orders.
    pub display_name: String,
    /// Base URL of the vendor API.
    pub base_url: Url,
    /// Vendor credentials.
    pub credentials: ProviderCredentials,
    /// Inactive providers are skipped by auto mode and rejected in
    /// manual mode.
    pub is_active: bool,
    /// Lower tries first in auto mode.
    pub priority: u8,
    /// Free-form settings.
    pub settings: ProviderSettings,
}

impl ProviderConfig {
    /// Minimal active config with default settings.
    pub fn new(id: ProviderId, base_url: Url, credentials: ProviderCredentials) -> Self {
        Self {
            id,
            display_name: id.code().to_string(),
            base_url,
            credentials,
            is_active: true,
            priority: 100,
            settings: ProviderSettings::default(),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the priority (lower tries first).
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the provider active or inactive.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Replace the settings map.
    pub fn with_settings(mut self, settings: ProviderSettings) -> Self {
        self.settings = settings;
        self
    }
}

// =============================================================================
// ProviderStats
// =============================================================================

/// Running success/failure counters and last known vendor balance.
///
/// Counters are monotonic; `success_rate` is derived. The balance is
/// operational health data only and never feeds billing.
#[derive(Debug, Default)]
pub struct ProviderStats {
    total_orders: AtomicU64,
    successful_orders: AtomicU64,
    last_balance: Mutex<f64>,
}

impl ProviderStats {
    /// Fresh zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful order attempt.
    pub fn record_success(&self) {
        self.total_orders.fetch_add(1, Ordering::Relaxed);
        self.successful_orders.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed order attempt.
    pub fn record_failure(&self) {
        self.total_orders.fetch_add(1, Ordering::Relaxed);
    }

    /// Store the latest vendor balance reading.
    pub fn record_balance(&self, balance: f64) {
        if let Ok(mut b) = self.last_balance.lock() {
            *b = balance;
        }
    }

    /// Total order attempts routed to this provider.
    pub fn total_orders(&self) -> u64 {
        self.total_orders.load(Ordering::Relaxed)
    }

    /// Successful order attempts.
    pub fn successful_orders(&self) -> u64 {
        self.successful_orders.load(Ordering::Relaxed)
    }

    /// Failed order attempts.
    pub fn failed_orders(&self) -> u64 {
        self.total_orders() - self.successful_orders()
    }

    /// Success ratio in [0, 1]; 1.0 when no attempts were made yet.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_orders();
        if total == 0 {
            return 1.0;
        }
        self.successful_orders() as f64 / total as f64
    }

    /// Last known vendor balance.
    pub fn last_balance(&self) -> f64 {
        self.last_balance.lock().map(|b| *b).unwrap_or(0.0)
    }
}

/// Point-in-time health snapshot of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Provider the snapshot is for.
    pub provider: ProviderId,
    /// Whether the provider is currently active.
    pub is_active: bool,
    /// Priority (lower tries first).
    pub priority: u8,
    /// Total order attempts.
    pub total_orders: u64,
    /// Successful order attempts.
    pub successful_orders: u64,
    /// Derived success ratio.
    pub success_rate: f64,
    /// Last known vendor balance in the vendor's own currency.
    pub last_balance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_codes_roundtrip() {
        for id in ProviderId::all() {
            assert_eq!(id.code().parse::<ProviderId>().unwrap(), id);
        }
    }

    #[test]
    fn test_provider_id_aliases() {
        assert_eq!("5sim".parse::<ProviderId>().unwrap(), ProviderId::FiveSim);
        assert_eq!(
            "DaisySMS".parse::<ProviderId>().unwrap(),
            ProviderId::Dassy
        );
        assert!("nonesuch".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = ProviderCredentials::api_key("topsecret").with_webhook_secret("hush");
        let dump = format!("{:?}", creds);
        assert!(!dump.contains("topsecret"));
        assert!(!dump.contains("hush"));
        assert!(dump.contains("[REDACTED]"));
    }

    #[test]
    fn test_stats_counters_and_rate() {
        let stats = ProviderStats::new();
        assert_eq!(stats.success_rate(), 1.0);

        stats.record_failure();
        stats.record_failure();
        stats.record_success();
        assert_eq!(stats.total_orders(), 3);
        assert_eq!(stats.successful_orders(), 1);
        assert_eq!(stats.failed_orders(), 2);
        assert!((stats.success_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_balance() {
        let stats = ProviderStats::new();
        assert_eq!(stats.last_balance(), 0.0);
        stats.record_balance(12.5);
        assert_eq!(stats.last_balance(), 12.5);
    }
}
