//! SmsPool integration.
//!
//! SmsPool takes form-encoded POSTs with the API key as a form field
//! and answers in JSON, with numbers and strings used interchangeably
//! for numeric fields. Failures come back as `{"success": 0}` with a
//! free-text message.

pub mod client;
pub mod provider;

pub use client::SmsPoolClient;
pub use provider::SmsPoolProvider;
