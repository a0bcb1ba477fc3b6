//! Rented-number order entity and its state machine.

use crate::config::ProviderId;
use crate::types::{
    AccountId, CountryCode, OrderId, PhoneNumber, ProviderOrderId, SelectionMode, ServiceCode,
    SmsCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Lifecycle state of an order.
///
/// `Active` is the only state with outgoing transitions; the other
/// three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Number rented, waiting for a code.
    Active,
    /// Code delivered.
    Completed,
    /// Caller cancelled and was refunded.
    Cancelled,
    /// Deadline passed with no code; no refund.
    Expired,
}

impl OrderStatus {
    /// True for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Rejected transition out of a terminal state.
///
/// Callers treat this as an idempotent no-op, not a failure: polling a
/// completed order just returns the stored result.
#[derive(Debug, Clone, Error)]
#[error("order is {status} and cannot transition")]
pub struct TerminalState {
    /// The state the order is stuck in.
    pub status: OrderStatus,
}

/// One rented virtual number, from creation to a terminal state.
///
/// Created atomically with a balance debit and a ledger entry; never
/// deleted, only transitioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsOrder {
    /// Caller-facing id.
    pub id: OrderId,
    /// Account billed for this order.
    pub account: AccountId,
    /// Winning provider.
    pub provider: ProviderId,
    /// The vendor's own order id.
    pub provider_order_id: ProviderOrderId,
    /// Rented number.
    pub phone_number: PhoneNumber,
    /// Requested country.
    pub country: CountryCode,
    /// Requested service.
    pub service: ServiceCode,
    /// How the provider was selected.
    pub mode: SelectionMode,
    /// Billed amount in the billing currency, already converted and
    /// marked up.
    pub cost: f64,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Code once received.
    pub sms_code: Option<SmsCode>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Absolute deadline for code delivery.
    pub expires_at: DateTime<Utc>,
    /// When the code arrived.
    pub received_at: Option<DateTime<Utc>>,
    /// Provider display name at order time, for audit.
    pub provider_name: String,
    /// Provider's success rate at order time, for audit.
    pub provider_success_rate: f64,
}

impl SmsOrder {
    /// True when the order is still active but its deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Active && self.expires_at < now
    }

    fn guard_active(&self) -> Result<(), TerminalState> {
        if self.status.is_terminal() {
            return Err(TerminalState {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Active -> Completed: the code arrived, by poll or webhook push.
    pub fn complete(&mut self, code: SmsCode, now: DateTime<Utc>) -> Result<(), TerminalState> {
        self.guard_active()?;
        self.status = OrderStatus::Completed;
        self.sms_code = Some(code);
        self.received_at = Some(now);
        Ok(())
    }

    /// Active -> Cancelled: caller cancelled and the vendor confirmed.
    pub fn cancel(&mut self) -> Result<(), TerminalState> {
        self.guard_active()?;
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Active -> Expired: deadline passed with no code. No refund.
    pub fn expire(&mut self) -> Result<(), TerminalState> {
        self.guard_active()?;
        self.status = OrderStatus::Expired;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order() -> SmsOrder {
        let now = Utc::now();
        SmsOrder {
            id: OrderId::new(),
            account: AccountId::from("acct-1"),
            provider: ProviderId::TigerSms,
            provider_order_id: ProviderOrderId::from("555"),
            phone_number: PhoneNumber::from("+15551230000"),
            country: CountryCode::new("US").unwrap(),
            service: ServiceCode::new("wa").unwrap(),
            mode: SelectionMode::Auto,
            cost: 3100.0,
            status: OrderStatus::Active,
            sms_code: None,
            created_at: now,
            expires_at: now + Duration::minutes(20),
            received_at: None,
            provider_name: "Tiger SMS".into(),
            provider_success_rate: 1.0,
        }
    }

    #[test]
    fn test_complete_sets_code_and_timestamp() {
        let mut o = order();
        o.complete(SmsCode::from("123456"), Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Completed);
        assert_eq!(o.sms_code.as_ref().unwrap().as_str(), "123456");
        assert!(o.received_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut o = order();
        o.cancel().unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);

        assert!(o.complete(SmsCode::from("1"), Utc::now()).is_err());
        assert!(o.cancel().is_err());
        assert!(o.expire().is_err());
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert!(o.sms_code.is_none());
    }

    #[test]
    fn test_completed_cannot_cancel() {
        let mut o = order();
        o.complete(SmsCode::from("9"), Utc::now()).unwrap();
        let err = o.cancel().unwrap_err();
        assert_eq!(err.status, OrderStatus::Completed);
        assert_eq!(o.status, OrderStatus::Completed);
    }

    #[test]
    fn test_expiry_detection() {
        let mut o = order();
        let now = Utc::now();
        assert!(!o.is_expired(now));
        assert!(o.is_expired(now + Duration::minutes(30)));

        o.expire().unwrap();
        assert_eq!(o.status, OrderStatus::Expired);
        // Terminal orders are never "expired" again.
        assert!(!o.is_expired(now + Duration::minutes(30)));
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Active).unwrap(),
            r#""active""#
        );
        let s: OrderStatus = serde_json::from_str(r#""expired""#).unwrap();
        assert_eq!(s, OrderStatus::Expired);
    }
}
