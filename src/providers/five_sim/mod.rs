//! 5sim integration.
//!
//! Unlike the handler-dialect vendors, 5sim exposes a JSON API split in
//! two: unauthenticated guest endpoints for countries and prices, and a
//! bearer-authenticated user API for purchases. Countries are addressed
//! by lowercase slug ("usa", "england"), not ISO code.

pub mod client;
pub mod provider;

pub use client::FiveSimClient;
pub use provider::FiveSimProvider;
