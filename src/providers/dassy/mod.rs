//! Dassy (DaisySMS) integration.
//!
//! Dassy speaks the same colon-delimited handler dialect as Tiger SMS
//! but serves United States numbers only and prices in USD. Its price
//! listing is keyed service first, then country.

pub mod client;
pub mod provider;

pub use client::DassyClient;
pub use provider::DassyProvider;
