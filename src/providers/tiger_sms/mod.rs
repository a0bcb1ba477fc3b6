//! Tiger SMS provider.
//!
//! Speaks the colon-delimited handler-API dialect: GET requests with an
//! `action=` query parameter, plaintext replies, prices in RUB.

pub mod client;
pub mod provider;

pub use client::TigerSmsClient;
pub use provider::TigerSmsProvider;
