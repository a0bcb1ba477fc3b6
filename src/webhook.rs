//! Inbound webhook receiver for vendor code pushes.
//!
//! Signature first, semantics second: the HMAC is checked over the raw
//! body before anything is parsed, and any post-signature problem
//! (unknown order, duplicate delivery, malformed payload) is
//! acknowledged with `handled: false` so well-behaved senders stop
//! retrying.

use crate::config::ProviderId;
use crate::order::SmsOrder;
use crate::store::{OrderMatch, OrderStore};
use crate::types::{PhoneNumber, ProviderOrderId, SmsCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Scheme prefix on the header value.
const SIGNATURE_PREFIX: &str = "HMAC-SHA512=";

/// Event name for a received code.
const EVENT_SMS_RECEIVED: &str = "sms.received";

type HmacSha512 = Hmac<Sha512>;

/// Rejected webhook delivery. Maps onto HTTP at the edge: 503 for
/// [`NotConfigured`](WebhookError::NotConfigured), 401 for
/// [`InvalidSignature`](WebhookError::InvalidSignature).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// No webhook secret is configured for this provider; deliveries
    /// cannot be authenticated so none are accepted.
    #[error("webhook receiver is not configured")]
    NotConfigured,
    /// Signature header missing, malformed, or mismatching the body.
    #[error("webhook signature is invalid")]
    InvalidSignature,
}

/// Webhook payload. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    data: WebhookEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WebhookEventData {
    #[serde(default)]
    provider_order_id: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Acknowledgement returned for every authenticated delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    /// Always "ok" for an authenticated delivery.
    pub status: &'static str,
    /// Whether the event completed an order.
    pub handled: bool,
}

impl WebhookAck {
    fn handled(handled: bool) -> Self {
        Self {
            status: "ok",
            handled,
        }
    }
}

/// Compute the signature header value for a body.
///
/// Counterpart of the verification path, for senders and tests.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("{SIGNATURE_PREFIX}{}", BASE64.encode(digest))
}

/// Receiver for one provider's webhook pushes.
pub struct WebhookReceiver<S> {
    provider: ProviderId,
    secret: Option<SecretString>,
    store: S,
}

impl<S: OrderStore> WebhookReceiver<S> {
    /// Build a receiver. `secret` comes from the provider's credentials;
    /// without one every delivery is rejected.
    pub fn new(provider: ProviderId, secret: Option<SecretString>, store: S) -> Self {
        Self {
            provider,
            secret,
            store,
        }
    }

    /// Constant-time signature check over the raw body.
    fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), WebhookError> {
        let secret = self.secret.as_ref().ok_or(WebhookError::NotConfigured)?;
        let value = header.ok_or(WebhookError::InvalidSignature)?;
        let encoded = value
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(WebhookError::InvalidSignature)?;
        let expected = BASE64
            .decode(encoded.trim())
            .map_err(|_| WebhookError::InvalidSignature)?;
        let mut mac = HmacSha512::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| WebhookError::InvalidSignature)
    }

    async fn find_order(&self, data: &WebhookEventData) -> Option<SmsOrder> {
        if let Some(id) = &data.provider_order_id {
            let key = OrderMatch::ProviderOrderId(ProviderOrderId::new(id.clone()));
            if let Ok(Some(order)) = self.store.find_active_order(self.provider, &key).await {
                return Some(order);
            }
        }
        if let Some(number) = &data.phone_number {
            let key = OrderMatch::PhoneNumber(PhoneNumber::new(number));
            if let Ok(Some(order)) = self.store.find_active_order(self.provider, &key).await {
                return Some(order);
            }
        }
        None
    }

    /// Process one delivery: authenticate, then try to complete the
    /// matching order.
    #[tracing::instrument(name = "WebhookReceiver::handle", skip_all, fields(provider = %self.provider))]
    pub async fn handle(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookAck, WebhookError> {
        self.verify(body, signature_header)?;

        let event: WebhookEvent = match serde_json::from_slice(body) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "authenticated webhook body did not parse");
                return Ok(WebhookAck::handled(false));
            }
        };
        if event.event != EVENT_SMS_RECEIVED {
            debug!(event = %event.event, "ignoring webhook event type");
            return Ok(WebhookAck::handled(false));
        }
        let Some(code) = event.data.code.as_deref().filter(|c| !c.is_empty()) else {
            debug!("webhook event carried no code");
            return Ok(WebhookAck::handled(false));
        };
        let Some(mut order) = self.find_order(&event.data).await else {
            // Unknown order or duplicate delivery of an already
            // completed one; acknowledged so the sender stops retrying.
            debug!("no active order matches webhook event");
            return Ok(WebhookAck::handled(false));
        };

        if order.complete(SmsCode::new(code), Utc::now()).is_err() {
            return Ok(WebhookAck::handled(false));
        }
        if let Err(e) = self.store.update_order(&order).await {
            warn!(order = %order.id, error = %e, "failed to persist webhook completion");
            return Ok(WebhookAck::handled(false));
        }
        info!(order = %order.id, "order completed by webhook push");
        Ok(WebhookAck::handled(true))
    }
}
