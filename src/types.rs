//! Core types for number brokerage operations.

use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// OrderId
// =============================================================================

/// Caller-facing identifier for a number rental order.
///
/// Generated internally on order creation; never reuses the provider's
/// own identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Generate a fresh order id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// =============================================================================
// ProviderOrderId
// =============================================================================

/// The vendor's own identifier for a rental.
///
/// Treated as an opaque string: some vendors return numeric ids, one
/// returns a hyperlink to a details resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderOrderId(String);

impl ProviderOrderId {
    /// Create a new ProviderOrderId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderOrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProviderOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ProviderOrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ProviderOrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// PhoneNumber
// =============================================================================

/// Full phone number as reported by the vendor (e.g. "+15551234567").
///
/// Kept as-is apart from whitespace trimming; vendors disagree on
/// whether the leading '+' is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Create a new PhoneNumber.
    pub fn new(number: impl AsRef<str>) -> Self {
        Self(number.as_ref().trim().to_string())
    }

    /// Get the number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number with any leading '+' stripped, for digit-only comparisons.
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for PhoneNumber {
    fn from(number: String) -> Self {
        Self::new(number)
    }
}

impl From<&str> for PhoneNumber {
    fn from(number: &str) -> Self {
        Self::new(number)
    }
}

// =============================================================================
// SmsCode
// =============================================================================

/// SMS verification code (OTP) received on a rented number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsCode(String);

impl SmsCode {
    /// Create a new SmsCode.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SmsCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SmsCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for SmsCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<&str> for SmsCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// =============================================================================
// CountryCode / ServiceCode
// =============================================================================

/// Error when parsing a country or service code.
#[derive(Debug, Clone, Error)]
pub enum CodeError {
    /// Code is empty after trimming.
    #[error("code cannot be empty")]
    Empty,
    /// Code contains characters outside ASCII alphanumerics.
    #[error("code must contain only ASCII letters and digits")]
    InvalidChar,
    /// Code is unreasonably long.
    #[error("code must be at most 16 characters")]
    TooLong,
}

/// Caller-facing country code (e.g. "US", "GB").
///
/// Stored uppercased. Vendor-specific aliases (numeric ids, lowercase
/// slugs) are resolved per provider through the [`Catalog`](crate::catalog::Catalog).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CountryCode(String);

impl CountryCode {
    /// Create a new CountryCode, uppercasing the input.
    pub fn new(s: impl AsRef<str>) -> Result<Self, CodeError> {
        let s = s.as_ref().trim();
        validate_code(s)?;
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CountryCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for CountryCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for CountryCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        CountryCode::new(raw).map_err(de::Error::custom)
    }
}

/// Caller-facing service code (e.g. "wa" for WhatsApp).
///
/// Stored lowercased. Some vendors use named codes instead; the alias
/// is resolved per provider through the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServiceCode(String);

impl ServiceCode {
    /// Create a new ServiceCode, lowercasing the input.
    pub fn new(s: impl AsRef<str>) -> Result<Self, CodeError> {
        let s = s.as_ref().trim();
        validate_code(s)?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the code is entirely numeric.
    ///
    /// Vendors that key services by name reject these outright.
    pub fn is_numeric(&self) -> bool {
        self.0.chars().all(|c| c.is_ascii_digit())
    }
}

impl FromStr for ServiceCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for ServiceCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ServiceCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        ServiceCode::new(raw).map_err(de::Error::custom)
    }
}

fn validate_code(s: &str) -> Result<(), CodeError> {
    if s.is_empty() {
        return Err(CodeError::Empty);
    }
    if s.len() > 16 {
        return Err(CodeError::TooLong);
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CodeError::InvalidChar);
    }
    Ok(())
}

// =============================================================================
// Currency
// =============================================================================

/// Currencies that appear in vendor price feeds and billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Russian rouble.
    Rub,
    /// Nigerian naira.
    Ngn,
}

impl Currency {
    /// The currency every caller is billed in.
    pub const BILLING: Currency = Currency::Ngn;

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Rub => "RUB",
            Currency::Ngn => "NGN",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// =============================================================================
// SelectionMode
// =============================================================================

/// How the dispatcher chooses a provider for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Dispatcher picks by priority with randomized tie-breaking.
    Auto,
    /// Caller pins the request to one named provider.
    Manual,
}

impl Display for SelectionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::Auto => write!(f, "auto"),
            SelectionMode::Manual => write!(f, "manual"),
        }
    }
}

// =============================================================================
// AccountId
// =============================================================================

/// Identifier of the caller account billed for orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new AccountId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Country / PriceQuote
// =============================================================================

/// One country a provider can rent numbers in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Caller-facing country code.
    pub code: CountryCode,
    /// Human-readable name.
    pub name: String,
}

/// Ephemeral price quote produced by an adapter.
///
/// `cost` is in the provider's native unit unless `currency` is set, in
/// which case the adapter already converted and the normalizer must not
/// convert again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Service code the quote is for.
    pub service: ServiceCode,
    /// Display name for the service.
    pub name: String,
    /// Cost in the provider's native unit (or `currency` if set).
    pub cost: f64,
    /// Numbers currently available.
    pub available: u32,
    /// Set only when the adapter already converted the cost.
    pub currency: Option<Currency>,
}
