//! Shared error taxonomy for provider adapters.
//!
//! Vendor-specific error strings (`NO_NUMBERS`, `NO_MONEY`,
//! `TOO_MANY_ACTIVE_RENTALS`, ...) are caught at the adapter boundary and
//! re-raised as variants of [`ProviderError`]. Callers of the dispatcher
//! never see vendor-specific error text.

use thiserror::Error;

/// Error produced by a single provider adapter.
///
/// Any of these triggers failover to the next candidate in auto mode;
/// only exhaustion of all candidates is surfaced to callers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Vendor has no numbers for the requested country/service pair.
    #[error("no numbers available")]
    NoAvailability,

    /// Our account with the vendor is out of funds.
    #[error("provider account balance exhausted")]
    InsufficientProviderBalance,

    /// Vendor-side cap on concurrent rentals reached.
    #[error("too many active rentals with provider")]
    TooManyActiveRentals,

    /// Request rejected before any round-trip by a per-vendor constraint.
    #[error("unsupported request: {reason}")]
    Unsupported { reason: String },

    /// Vendor authentication failed (bad key or token exchange).
    #[error("vendor authentication failed")]
    Auth,

    /// Any other vendor-reported error condition.
    #[error("vendor error {code}: {message}")]
    Api { code: String, message: String },

    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// Error building the request URL.
    #[error("error building request URL: {0}")]
    BuildRequestUrl(#[source] serde_urlencoded::ser::Error),

    /// Transport-level failure (timeout, connect error, stalled read).
    #[error("failed to send HTTP request: {0}")]
    HttpRequest(#[from] reqwest_middleware::Error),

    /// Failed to read the response body.
    #[error("failed to read response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    /// Response body did not match the vendor's wire format.
    #[error("malformed vendor response: {0}")]
    Parse(String),

    /// Failed to deserialize a JSON response.
    #[error("failed to deserialize JSON response: {0}")]
    DeserializeJson(#[source] serde_json::Error),
}

impl ProviderError {
    /// Short classification label used in logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NoAvailability => "no_availability",
            ProviderError::InsufficientProviderBalance => "provider_balance",
            ProviderError::TooManyActiveRentals => "too_many_rentals",
            ProviderError::Unsupported { .. } => "unsupported",
            ProviderError::Auth => "auth",
            ProviderError::Api { .. } => "api",
            ProviderError::BuildHttpClient(_) => "build_client",
            ProviderError::BuildRequestUrl(_) => "build_url",
            ProviderError::HttpRequest(_) => "transport",
            ProviderError::ReadBody(_) => "read_body",
            ProviderError::Parse(_) => "parse",
            ProviderError::DeserializeJson(_) => "deserialize",
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ProviderError::NoAvailability.kind(), "no_availability");
        assert_eq!(
            ProviderError::Unsupported {
                reason: "US only".into()
            }
            .kind(),
            "unsupported"
        );
    }

    #[test]
    fn test_display_hides_vendor_noise() {
        let e = ProviderError::NoAvailability;
        assert_eq!(e.to_string(), "no numbers available");
    }
}
