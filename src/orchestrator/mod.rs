//! Provider-agnostic order dispatch.
//!
//! The dispatcher sits between callers and the vendor adapters: it
//! picks providers (priority-ordered with random tie-breaking, or
//! pinned in manual mode), fails over on any per-provider error, prices
//! every order in the billing currency and drives the order state
//! machine against the store.

pub mod config;
pub mod error;
pub mod structure;

pub use config::SmsServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use structure::{CodeStatus, OrderRequest, ServiceOffer, SmsService};
