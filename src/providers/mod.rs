//! Vendor adapters.
//!
//! Every vendor is wrapped in an adapter that exposes the same
//! capability set through [`SmsProvider`]: list countries, list
//! services with prices, rent a number, poll for the code, cancel, and
//! read the vendor balance. Vendor-specific errors are folded into
//! [`crate::errors::ProviderError`] so the dispatcher can treat every
//! failure uniformly.

pub mod adapter;
pub mod dassy;
pub mod five_sim;
pub mod handler_api;
pub mod sms_pool;
pub mod text_verified;
pub mod tiger_sms;
pub mod traits;

pub use adapter::ProviderAdapter;
pub use traits::{ProviderOrder, SmsProvider};
