//! TextVerified integration.
//!
//! TextVerified authenticates in two steps: the API key and username
//! are swapped for a short-lived bearer token, which then fronts every
//! call. Verifications are addressed by the href the create call
//! returns rather than by a bare id. United States numbers only.

pub mod client;
pub mod provider;

pub use client::TextVerifiedClient;
pub use provider::TextVerifiedProvider;
