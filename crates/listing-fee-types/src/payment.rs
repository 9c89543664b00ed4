//! Payment method selection, verification codes, and the listing-fee payment wire payload.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{CreditCardId, Iban, ListingId};

/// Wire discriminator for the payment method of a listing-fee payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodKind {
    CreditCard,
    Transfer,
    #[serde(rename = "EWALLET")]
    EWallet,
}

impl PaymentMethodKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "CREDIT_CARD",
            Self::Transfer => "TRANSFER",
            Self::EWallet => "EWALLET",
        }
    }
}

impl fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payment method currently chosen in the checkout modal.
///
/// Card and transfer selections may exist before a concrete instrument is
/// picked; eligibility decides whether such a selection can be paid with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodSelection {
    CreditCard { card_id: Option<CreditCardId> },
    Transfer { iban: Option<Iban> },
    #[serde(rename = "EWALLET")]
    EWallet,
}

impl PaymentMethodSelection {
    pub fn credit_card(card_id: CreditCardId) -> Self {
        Self::CreditCard {
            card_id: Some(card_id),
        }
    }

    pub fn transfer(iban: Iban) -> Self {
        Self::Transfer { iban: Some(iban) }
    }

    pub const fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::CreditCard { .. } => PaymentMethodKind::CreditCard,
            Self::Transfer { .. } => PaymentMethodKind::Transfer,
            Self::EWallet => PaymentMethodKind::EWallet,
        }
    }
}

/// One-time verification code as typed by the user.
///
/// Only ASCII digits are kept and input is clamped to [`VerificationCode::LEN`]
/// characters. The value is an opaque digit string; leading zeros are significant.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub const LEN: usize = 6;

    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Strips non-digits and truncates. Filtering a filtered value is a no-op.
    pub fn filter(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(char::is_ascii_digit)
                .take(Self::LEN)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.0.len() == Self::LEN
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerificationCode(<{} digits>)", self.0.len())
    }
}

/// Structured error code returned by the payment backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendErrorCode {
    PaymentVerificationRequired,
    Other(String),
}

impl BackendErrorCode {
    pub const PAYMENT_VERIFICATION_REQUIRED: &'static str = "PAYMENT_VERIFICATION_REQUIRED";

    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentVerificationRequired => Self::PAYMENT_VERIFICATION_REQUIRED,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            Self::PAYMENT_VERIFICATION_REQUIRED => Self::PaymentVerificationRequired,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for BackendErrorCode {
    fn from(value: &str) -> Self {
        match value.parse::<Self>() {
            Ok(code) => code,
            Err(never) => match never {},
        }
    }
}

/// Error body of a non-2xx backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Request body of `createListingFeePayment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFeePaymentRequest {
    pub listing_id: ListingId,
    pub payment_method: PaymentMethodKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_card_id: Option<CreditCardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account_id: Option<Iban>,
    pub verification_code: VerificationCode,
}

/// Successful response of `createListingFeePayment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A single submission: listing, payment method, and the code typed so far (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub listing_id: ListingId,
    pub selection: PaymentMethodSelection,
    pub verification_code: VerificationCode,
}

impl PaymentAttempt {
    pub fn new(listing_id: ListingId, selection: PaymentMethodSelection) -> Self {
        Self {
            listing_id,
            selection,
            verification_code: VerificationCode::empty(),
        }
    }

    pub fn with_code(mut self, code: VerificationCode) -> Self {
        self.verification_code = code;
        self
    }

    pub fn to_request(&self) -> Result<ListingFeePaymentRequest, ValidationError> {
        let (credit_card_id, bank_account_id) = match &self.selection {
            PaymentMethodSelection::CreditCard { card_id } => (
                Some(card_id.clone().ok_or(ValidationError::MissingField("creditCardId"))?),
                None,
            ),
            PaymentMethodSelection::Transfer { iban } => (
                None,
                Some(iban.clone().ok_or(ValidationError::MissingField("bankAccountId"))?),
            ),
            PaymentMethodSelection::EWallet => (None, None),
        };
        Ok(ListingFeePaymentRequest {
            listing_id: self.listing_id.clone(),
            payment_method: self.selection.kind(),
            credit_card_id,
            bank_account_id,
            verification_code: self.verification_code.clone(),
        })
    }
}
