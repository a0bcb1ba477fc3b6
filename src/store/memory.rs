//! In-memory reference implementation of the store contract.
//!
//! One mutex guards accounts, orders and the ledger together, so each
//! commit/refund is atomic with respect to every other operation. Used
//! in tests and as the model a database-backed store must match.

use super::{LedgerDirection, LedgerEntry, OrderMatch, OrderStore, StoreError};
use crate::config::ProviderId;
use crate::order::{OrderStatus, SmsOrder};
use crate::types::{AccountId, OrderId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryInner {
    accounts: HashMap<AccountId, f64>,
    orders: HashMap<OrderId, SmsOrder>,
    ledger: Vec<LedgerEntry>,
}

/// Mutex-backed store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account outside the order flow (test setup, top-ups).
    pub fn deposit(&self, account: &AccountId, amount: f64) {
        let mut inner = self.lock();
        *inner.accounts.entry(account.clone()).or_insert(0.0) += amount;
    }

    /// Snapshot of all ledger entries, oldest first.
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.clone()
    }

    /// Directly insert an order without billing. Test setup only.
    pub fn insert_order_unbilled(&self, order: SmsOrder) {
        self.lock().orders.insert(order.id, order);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock means a panic mid-mutation; propagating the
        // panic is the only sound option for an atomicity-critical store.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry(
    order: &SmsOrder,
    direction: LedgerDirection,
    before: f64,
    after: f64,
    reason: &str,
) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        account: order.account.clone(),
        order_id: order.id,
        direction,
        amount: order.cost,
        balance_before: before,
        balance_after: after,
        reason: reason.to_string(),
        created_at: Utc::now(),
    }
}

impl OrderStore for MemoryStore {
    async fn balance(&self, account: &AccountId) -> Result<f64, StoreError> {
        Ok(self.lock().accounts.get(account).copied().unwrap_or(0.0))
    }

    async fn commit_order(&self, order: &SmsOrder) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.lock();
        if inner.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        let before = inner.accounts.get(&order.account).copied().unwrap_or(0.0);
        if before < order.cost {
            return Err(StoreError::InsufficientFunds {
                available: before,
                required: order.cost,
            });
        }
        let after = before - order.cost;
        inner.accounts.insert(order.account.clone(), after);
        inner.orders.insert(order.id, order.clone());
        let entry = entry(order, LedgerDirection::Debit, before, after, "order created");
        inner.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn refund_order(&self, order: &SmsOrder) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.lock();
        // The Active check and the credit sit under the same lock;
        // racing refunds see the Cancelled status the winner wrote.
        match inner.orders.get(&order.id) {
            None => return Err(StoreError::OrderNotFound(order.id)),
            Some(stored) if stored.status != OrderStatus::Active => {
                return Err(StoreError::OrderNotActive(order.id));
            }
            Some(_) => {}
        }
        let before = inner.accounts.get(&order.account).copied().unwrap_or(0.0);
        let after = before + order.cost;
        inner.accounts.insert(order.account.clone(), after);
        inner.orders.insert(order.id, order.clone());
        let entry = entry(
            order,
            LedgerDirection::Credit,
            before,
            after,
            "order cancelled, refund",
        );
        inner.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn update_order(&self, order: &SmsOrder) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.orders.get(&order.id) {
            None => return Err(StoreError::OrderNotFound(order.id)),
            Some(stored) if stored.status.is_terminal() => {
                return Err(StoreError::OrderNotActive(order.id));
            }
            Some(_) => {}
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&self, id: &OrderId) -> Result<Option<SmsOrder>, StoreError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    async fn find_active_order(
        &self,
        provider: ProviderId,
        key: &OrderMatch,
    ) -> Result<Option<SmsOrder>, StoreError> {
        let inner = self.lock();
        let found = inner
            .orders
            .values()
            .find(|o| {
                o.provider == provider
                    && o.status == OrderStatus::Active
                    && match key {
                        OrderMatch::ProviderOrderId(id) => &o.provider_order_id == id,
                        OrderMatch::PhoneNumber(number) => {
                            o.phone_number.digits() == number.digits()
                        }
                    }
            })
            .cloned();
        Ok(found)
    }
}
