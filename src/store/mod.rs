//! Order persistence and wallet ledger boundary.
//!
//! The storage technology is out of scope; this module specifies the
//! contract the fulfillment core needs from it. The critical clause is
//! atomicity: `commit_order` and `refund_order` apply the order write,
//! the balance change and the ledger entry as one unit or not at all.
//! A SQL-backed implementation is expected to use a transaction; the
//! in-memory reference holds one lock across the whole commit.

mod memory;

pub use memory::MemoryStore;

use crate::config::ProviderId;
use crate::order::SmsOrder;
use crate::types::{AccountId, OrderId, PhoneNumber, ProviderOrderId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

/// Direction of a balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    /// Balance decreased (order creation).
    Debit,
    /// Balance increased (refund).
    Credit,
}

/// One row per balance-affecting event, with before/after snapshots
/// for auditability.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    /// Entry id.
    pub id: Uuid,
    /// Account affected.
    pub account: AccountId,
    /// Order that caused the event.
    pub order_id: OrderId,
    /// Debit or credit.
    pub direction: LedgerDirection,
    /// Amount moved, in the billing currency.
    pub amount: f64,
    /// Balance before the event.
    pub balance_before: f64,
    /// Balance after the event.
    pub balance_after: f64,
    /// Human-readable reason.
    pub reason: String,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Account balance cannot cover the debit.
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: f64, required: f64 },

    /// Order id not present.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Order id already committed.
    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),

    /// Write attempted against an order whose stored state is already
    /// terminal.
    #[error("order {0} is not active")]
    OrderNotActive(OrderId),

    /// Account id not present.
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// Anything backend-specific.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Key used by the webhook receiver to locate an order.
#[derive(Debug, Clone)]
pub enum OrderMatch {
    /// Match on the vendor's own order id.
    ProviderOrderId(ProviderOrderId),
    /// Match on the rented number.
    PhoneNumber(PhoneNumber),
}

/// Persistence contract for orders, balances and the ledger.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Send + Sync {
    /// Current balance of an account.
    fn balance(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<f64, StoreError>> + Send;

    /// Atomically persist a new order, debit its cost from the owning
    /// account and write a debit ledger entry. All-or-nothing.
    fn commit_order(
        &self,
        order: &SmsOrder,
    ) -> impl Future<Output = Result<LedgerEntry, StoreError>> + Send;

    /// Atomically persist the cancelled order, credit its cost back and
    /// write a credit ledger entry. All-or-nothing.
    ///
    /// The stored order must still be Active: the status check, the
    /// status write and the credit share one atomic section, so two
    /// racing refunds of the same order cannot both credit. Fails with
    /// [`StoreError::OrderNotActive`] when the order already reached a
    /// terminal state.
    fn refund_order(
        &self,
        order: &SmsOrder,
    ) -> impl Future<Output = Result<LedgerEntry, StoreError>> + Send;

    /// Persist a status/code change on an existing order.
    ///
    /// Terminal states are never overwritten; fails with
    /// [`StoreError::OrderNotActive`] when the stored order already
    /// settled.
    fn update_order(
        &self,
        order: &SmsOrder,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch an order by id.
    fn order(
        &self,
        id: &OrderId,
    ) -> impl Future<Output = Result<Option<SmsOrder>, StoreError>> + Send;

    /// Find the unique active order for a provider matching the key.
    fn find_active_order(
        &self,
        provider: ProviderId,
        key: &OrderMatch,
    ) -> impl Future<Output = Result<Option<SmsOrder>, StoreError>> + Send;
}
