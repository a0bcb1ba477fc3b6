//! # SMS Broker
//!
//! Provider-aggregation and order-fulfillment core for SMS verification
//! numbers. Five vendor APIs sit behind one capability set; a
//! priority-ordered dispatcher fails over between them, prices every
//! order in a single billing currency and drives the order state
//! machine against an atomic store.
//!
//! ## Supported Providers
//!
//! | Provider | Protocol | Native currency | Coverage |
//! |----------|----------|-----------------|----------|
//! | Tiger SMS | handler API (plaintext) | RUB | global |
//! | 5sim | JSON guest + bearer user API | RUB | global |
//! | Dassy | handler API (plaintext) | USD | US only |
//! | TextVerified | bearer-token exchange | USD | US only |
//! | SmsPool | form-encoded JSON | USD | global |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sms_broker::{
//!     AccountId, Catalog, MemoryStore, OrderRequest, ProviderConfig,
//!     ProviderCredentials, ProviderId, SmsService, SmsServiceConfig,
//! };
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let providers = vec![
//!         ProviderConfig::new(
//!             ProviderId::TigerSms,
//!             Url::parse("https://api.tiger-sms.com/stubs/handler_api.php")?,
//!             ProviderCredentials::api_key("tiger_key"),
//!         )
//!         .with_priority(1),
//!         ProviderConfig::new(
//!             ProviderId::Dassy,
//!             Url::parse("https://daisysms.com/stubs/handler_api.php")?,
//!             ProviderCredentials::api_key("dassy_key"),
//!         )
//!         .with_priority(2),
//!     ];
//!
//!     let store = MemoryStore::new();
//!     let account = AccountId::from("acct-1");
//!     store.deposit(&account, 10_000.0);
//!
//!     let service = SmsService::new(
//!         providers,
//!         Arc::new(Catalog::from_path("catalog.json")?),
//!         store,
//!         SmsServiceConfig::default(),
//!     )?;
//!
//!     let order = service
//!         .create_order(&account, OrderRequest::auto("US".parse()?, "wa".parse()?))
//!         .await?;
//!     println!("rented {} for {}", order.phone_number, order.cost);
//!
//!     let status = service.get_code(&order.id).await?;
//!     println!("status {:?}", status);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SmsService<S: OrderStore>         dispatcher, failover, pricing
//!         │
//!         ▼
//! ProviderAdapter                   enum dispatch over the vendor set
//!         │
//!         ▼
//! SmsProvider                       capability set each adapter implements
//!
//! WebhookReceiver<S>                authenticated inbound code pushes
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod http;
pub mod order;
pub mod orchestrator;
pub mod pricing;
pub mod providers;
pub mod store;
pub mod types;
pub mod webhook;

// Re-export the main surface at the crate root.
pub use catalog::Catalog;
pub use config::{ProviderConfig, ProviderCredentials, ProviderHealth, ProviderId, ProviderSettings};
pub use errors::{ProviderError, ProviderResult};
pub use orchestrator::{
    CodeStatus, OrderRequest, ServiceError, ServiceOffer, ServiceResult, SmsService,
    SmsServiceConfig,
};
pub use order::{OrderStatus, SmsOrder};
pub use pricing::PricingConfig;
pub use providers::{ProviderAdapter, ProviderOrder, SmsProvider};
pub use store::{LedgerDirection, LedgerEntry, MemoryStore, OrderMatch, OrderStore, StoreError};
pub use types::{
    AccountId, Country, CountryCode, Currency, OrderId, PhoneNumber, PriceQuote, ProviderOrderId,
    SelectionMode, ServiceCode, SmsCode,
};
pub use webhook::{SIGNATURE_HEADER, WebhookAck, WebhookError, WebhookReceiver, sign_body};
