//! Shared parsing for the colon-delimited "handler API" dialect.
//!
//! Tiger SMS and DaisySMS both speak this protocol family: GET requests
//! with `api_key` and `action` query parameters, plaintext replies with
//! fixed prefixes (`ACCESS_NUMBER:`, `STATUS_OK:`, `ACCESS_BALANCE:`)
//! and plaintext error codes.

use crate::errors::ProviderError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Error codes the handler-API family returns as plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerErrorCode {
    /// No numbers for the requested pair.
    NoNumbers,
    /// Vendor account out of funds.
    NoMoney,
    /// Concurrent-rental cap reached (DaisySMS).
    TooManyActiveRentals,
    /// Requested max price below the vendor's minimum (DaisySMS).
    MaxPriceExceeded,
    /// Invalid API key.
    BadKey,
    /// Incorrect action.
    BadAction,
    /// Incorrect service code.
    BadService,
    /// Incorrect status value.
    BadStatus,
    /// Activation does not exist.
    NoActivation,
    /// Account banned until the given datetime.
    Banned { until: String },
    /// Unrecognized error code.
    Unknown { raw: String },
}

impl HandlerErrorCode {
    /// Parse an error code from a raw response, `None` when the text is
    /// not an error.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let code = match s {
            "NO_NUMBERS" => Self::NoNumbers,
            "NO_MONEY" | "NO_BALANCE" => Self::NoMoney,
            "TOO_MANY_ACTIVE_RENTALS" => Self::TooManyActiveRentals,
            "MAX_PRICE_EXCEEDED" => Self::MaxPriceExceeded,
            "BAD_KEY" => Self::BadKey,
            "BAD_ACTION" => Self::BadAction,
            "BAD_SERVICE" => Self::BadService,
            "BAD_STATUS" => Self::BadStatus,
            "NO_ACTIVATION" => Self::NoActivation,
            _ => return Self::parse_parametrized(s),
        };
        Some(code)
    }

    fn parse_parametrized(s: &str) -> Option<Self> {
        // BANNED:'YYYY-m-d H-i-s'
        static RE_BANNED: Lazy<Regex> =
            Lazy::new(|| Regex::new(r#"^BANNED\s*:\s*['"]?([^'"]+?)['"]?$"#).unwrap());
        if let Some(cap) = RE_BANNED.captures(s) {
            let until = cap.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            return Some(Self::Banned { until });
        }

        if looks_like_error_code(s) {
            return Some(Self::Unknown { raw: s.to_string() });
        }
        None
    }

    /// Map into the adapter-boundary taxonomy; vendor strings stop here.
    pub fn into_provider_error(self) -> ProviderError {
        match self {
            Self::NoNumbers => ProviderError::NoAvailability,
            Self::NoMoney => ProviderError::InsufficientProviderBalance,
            Self::TooManyActiveRentals => ProviderError::TooManyActiveRentals,
            Self::BadKey => ProviderError::Auth,
            Self::MaxPriceExceeded => ProviderError::Api {
                code: "MAX_PRICE_EXCEEDED".into(),
                message: "requested max price below vendor minimum".into(),
            },
            Self::BadAction => ProviderError::Api {
                code: "BAD_ACTION".into(),
                message: "incorrect action".into(),
            },
            Self::BadService => ProviderError::Api {
                code: "BAD_SERVICE".into(),
                message: "incorrect service code".into(),
            },
            Self::BadStatus => ProviderError::Api {
                code: "BAD_STATUS".into(),
                message: "incorrect status".into(),
            },
            Self::NoActivation => ProviderError::Api {
                code: "NO_ACTIVATION".into(),
                message: "activation does not exist".into(),
            },
            Self::Banned { until } => ProviderError::Api {
                code: "BANNED".into(),
                message: format!("account banned until {until}"),
            },
            Self::Unknown { raw } => ProviderError::Api {
                code: raw,
                message: "unrecognized vendor error".into(),
            },
        }
    }
}

fn looks_like_error_code(s: &str) -> bool {
    if s.is_empty() || s.starts_with("ACCESS_") || s.starts_with("STATUS_") {
        return false;
    }
    const ERROR_PREFIXES: [&str; 7] = [
        "NO_", "BAD_", "ERROR_", "WRONG_", "MAX_PRICE", "TOO_MANY", "BANNED",
    ];
    ERROR_PREFIXES.iter().any(|p| s.starts_with(p))
}

/// Reject a response that is a known error code, passing success text
/// through.
pub fn guard_error(vendor: &str, text: &str) -> Result<(), ProviderError> {
    if let Some(code) = HandlerErrorCode::from_raw(text) {
        warn!(vendor, code = ?code, "vendor returned error response");
        return Err(code.into_provider_error());
    }
    Ok(())
}

/// Parsed `ACCESS_NUMBER:<id>:<phone>` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessNumber {
    /// Vendor activation id.
    pub id: String,
    /// Rented phone number.
    pub phone: String,
}

impl AccessNumber {
    /// Parse a getNumber reply.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let rest = raw.trim().strip_prefix("ACCESS_NUMBER:")?;
        let (id, phone) = rest.split_once(':')?;
        if id.is_empty() || phone.is_empty() {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            phone: phone.to_string(),
        })
    }
}

/// Parsed getStatus reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollReply {
    /// Still waiting for an SMS.
    Waiting,
    /// Code received.
    Ok(String),
    /// Activation was cancelled vendor-side.
    Cancelled,
}

impl PollReply {
    /// Parse a getStatus reply.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if let Some(code) = s.strip_prefix("STATUS_OK:") {
            return Some(Self::Ok(code.to_string()));
        }
        if let Some(_last) = s.strip_prefix("STATUS_WAIT_RETRY:") {
            return Some(Self::Waiting);
        }
        match s {
            "STATUS_WAIT_CODE" | "STATUS_WAIT_RESEND" => Some(Self::Waiting),
            "STATUS_CANCEL" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Parse an `ACCESS_BALANCE:<amount>` reply.
pub fn parse_balance(raw: &str) -> Option<f64> {
    raw.trim()
        .strip_prefix("ACCESS_BALANCE:")?
        .parse::<f64>()
        .ok()
}

/// True when a setStatus reply confirms cancellation.
pub fn is_cancel_confirmed(raw: &str) -> bool {
    raw.trim() == "ACCESS_CANCEL"
}
