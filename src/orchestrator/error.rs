//! Dispatcher-level errors.

use crate::config::ProviderId;
use crate::store::StoreError;
use crate::types::OrderId;
use thiserror::Error;

/// Error surface of the dispatcher.
///
/// Per-provider failures never escape directly: a single provider going
/// down mid-failover is reported (and counted against its stats) but
/// the caller only ever sees an exhaustion error once every candidate
/// has been tried.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request itself is malformed (unknown provider, inactive
    /// provider pinned, bad codes).
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    /// Caller account cannot cover any order.
    #[error("insufficient balance: {available} available")]
    InsufficientBalance { available: f64 },

    /// Manual mode: the pinned provider could not fill the order.
    #[error("provider {0} unavailable")]
    PinnedProviderUnavailable(ProviderId),

    /// Auto mode: every candidate failed.
    #[error("all providers unavailable")]
    AllProvidersExhausted,

    /// Unknown order id.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Cancellation of an order already in a terminal state.
    #[error("order {0} is no longer cancellable")]
    OrderNotCancellable(OrderId),

    /// Vendor refused the cancellation; the order stays active and no
    /// refund is issued.
    #[error("cancellation of order {0} was declined by the provider")]
    CancellationDeclined(OrderId),

    /// A single provider call failed outside the failover loop
    /// (listings, direct lookups).
    #[error("provider {provider} error: {source}")]
    Provider {
        provider: ProviderId,
        #[source]
        source: crate::errors::ProviderError,
    },

    /// Storage failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds { available, .. } => {
                ServiceError::InsufficientBalance { available }
            }
            other => ServiceError::Store(other),
        }
    }
}

/// Convenience alias for dispatcher results.
pub type ServiceResult<T> = Result<T, ServiceError>;
