//! Local, synchronous go/no-go for paying the listing fee with the selected method.

use std::fmt;

use listing_fee_types::{FeeConfig, PaymentMethodSelection};
use rust_decimal::Decimal;

use crate::registry::RegistrySnapshot;

/// Why the current selection cannot pay the fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    NoPaymentMethod,
    NoCreditCards,
    CardNotSelected,
    NoBankAccounts,
    IbanNotSelected,
    NoEWallet,
    InsufficientBalance { balance: Decimal, required: Decimal },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPaymentMethod => f.write_str("no payment method selected"),
            Self::NoCreditCards => f.write_str("no stored credit cards"),
            Self::CardNotSelected => f.write_str("no credit card selected"),
            Self::NoBankAccounts => f.write_str("no bank accounts"),
            Self::IbanNotSelected => f.write_str("no IBAN selected"),
            Self::NoEWallet => f.write_str("no e-wallet"),
            Self::InsufficientBalance { balance, required } => {
                write!(f, "insufficient e-wallet balance ({balance} < {required})")
            }
        }
    }
}

/// Evaluates the selection against the server-supplied fee total.
pub fn evaluate(
    selection: Option<&PaymentMethodSelection>,
    fee: &FeeConfig,
    registry: &RegistrySnapshot,
) -> Result<(), Ineligibility> {
    let Some(selection) = selection else {
        return Err(Ineligibility::NoPaymentMethod);
    };
    match selection {
        PaymentMethodSelection::CreditCard { card_id } => {
            if registry.credit_cards.is_empty() {
                Err(Ineligibility::NoCreditCards)
            } else if card_id.is_none() {
                Err(Ineligibility::CardNotSelected)
            } else {
                Ok(())
            }
        }
        PaymentMethodSelection::Transfer { iban } => {
            if registry.bank_accounts.is_empty() {
                Err(Ineligibility::NoBankAccounts)
            } else if iban.is_none() {
                Err(Ineligibility::IbanNotSelected)
            } else {
                Ok(())
            }
        }
        PaymentMethodSelection::EWallet => match &registry.ewallet {
            None => Err(Ineligibility::NoEWallet),
            Some(wallet) if wallet.covers(fee.total_creation_fee) => Ok(()),
            Some(wallet) => Err(Ineligibility::InsufficientBalance {
                balance: wallet.balance,
                required: fee.total_creation_fee,
            }),
        },
    }
}

pub fn is_eligible(
    selection: Option<&PaymentMethodSelection>,
    fee: &FeeConfig,
    registry: &RegistrySnapshot,
) -> bool {
    evaluate(selection, fee, registry).is_ok()
}

/// Reason the pay / send-code action is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBlock {
    FeeUnavailable,
    PaymentMethod(Ineligibility),
    Agreements,
    PaymentMethodAndAgreements(Ineligibility),
}

impl SubmitBlock {
    pub fn message(&self) -> String {
        match self {
            Self::FeeUnavailable => {
                "The listing fee could not be loaded. Please try again.".to_string()
            }
            Self::PaymentMethod(Ineligibility::InsufficientBalance { balance, required }) => {
                format!(
                    "Insufficient e-wallet balance: {} available, {} required.",
                    balance.round_dp(2),
                    required.round_dp(2)
                )
            }
            Self::PaymentMethod(_) => "Please select a valid payment method.".to_string(),
            Self::Agreements => "Please accept the required agreements.".to_string(),
            Self::PaymentMethodAndAgreements(Ineligibility::InsufficientBalance {
                balance,
                required,
            }) => format!(
                "Insufficient e-wallet balance: {} available, {} required. \
                 Please also accept the required agreements.",
                balance.round_dp(2),
                required.round_dp(2)
            ),
            Self::PaymentMethodAndAgreements(_) => {
                "Please select a valid payment method and accept the required agreements."
                    .to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitGate {
    Ready,
    Blocked(SubmitBlock),
}

impl SubmitGate {
    /// Combines fee availability, method eligibility, and agreement acceptance.
    pub fn evaluate(
        selection: Option<&PaymentMethodSelection>,
        fee: Option<&FeeConfig>,
        registry: &RegistrySnapshot,
        agreements_accepted: bool,
    ) -> Self {
        let Some(fee) = fee else {
            return Self::Blocked(SubmitBlock::FeeUnavailable);
        };
        match (evaluate(selection, fee, registry), agreements_accepted) {
            (Ok(()), true) => Self::Ready,
            (Ok(()), false) => Self::Blocked(SubmitBlock::Agreements),
            (Err(reason), true) => Self::Blocked(SubmitBlock::PaymentMethod(reason)),
            (Err(reason), false) => {
                Self::Blocked(SubmitBlock::PaymentMethodAndAgreements(reason))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Self::Ready => None,
            Self::Blocked(block) => Some(block.message()),
        }
    }
}
