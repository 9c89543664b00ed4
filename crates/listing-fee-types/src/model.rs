//! Listings, fee schedule, and stored payment instruments as returned by the backend.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{CreditCardId, Iban, ListingId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Draft,
    Active,
    Inactive,
    Sold,
}

impl ListingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Sold => "SOLD",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "SOLD" => Ok(Self::Sold),
            other => Err(ValidationError::UnknownVariant {
                kind: "listing status",
                value: other.to_string(),
            }),
        }
    }
}

/// A listing owned by the current user. Read-only to the payment workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftListing {
    pub id: ListingId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub status: ListingStatus,
}

impl DraftListing {
    pub fn is_draft(&self) -> bool {
        self.status == ListingStatus::Draft
    }
}

/// Fee schedule for publishing one listing.
///
/// `total_creation_fee` is computed by the backend and is the only value
/// authorization decisions compare against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    pub creation_fee: Decimal,
    pub tax_percentage: Decimal,
    pub total_creation_fee: Decimal,
}

impl FeeConfig {
    /// `creation_fee * (1 + tax_percentage / 100)`, for display cross-checks only.
    pub fn computed_total(&self) -> Decimal {
        self.creation_fee * (Decimal::ONE + self.tax_percentage / Decimal::ONE_HUNDRED)
    }

    pub fn tax_amount(&self) -> Decimal {
        self.total_creation_fee - self.creation_fee
    }

    pub fn display_total(&self, currency: &str) -> String {
        format!("{} {}", self.total_creation_fee.round_dp(2), currency)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.creation_fee.is_sign_negative() || self.total_creation_fee.is_sign_negative() {
            return Err(ValidationError::Message(
                "fee amounts must not be negative".to_string(),
            ));
        }
        if self.tax_percentage < Decimal::ZERO || self.tax_percentage > Decimal::ONE_HUNDRED {
            return Err(ValidationError::Message(format!(
                "tax percentage {} outside 0..=100",
                self.tax_percentage
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCard {
    pub id: CreditCardId,
    pub holder_name: String,
    /// Last digits only, e.g. `**** **** **** 4242`.
    pub masked_number: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub expiry_month: u8,
    pub expiry_year: u16,
}

impl CreditCard {
    pub fn label(&self) -> String {
        match &self.brand {
            Some(brand) => format!("{brand} {}", self.masked_number),
            None => self.masked_number.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub iban: Iban,
    pub bank_name: String,
    pub holder_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EWallet {
    pub balance: Decimal,
    pub currency: String,
}

impl EWallet {
    pub fn covers(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
