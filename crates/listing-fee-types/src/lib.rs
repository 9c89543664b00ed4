//! Shared data model for the listing-fee payment workflow.

pub mod error;
pub mod ids;
pub mod model;
pub mod payment;

pub use error::ValidationError;
pub use ids::{CreditCardId, Iban, ListingId};
pub use model::{BankAccount, CreditCard, DraftListing, EWallet, FeeConfig, ListingStatus};
pub use payment::{
    BackendErrorCode, ErrorBody, ListingFeePaymentRequest, PaymentAttempt, PaymentMethodKind,
    PaymentMethodSelection, PaymentReceipt, VerificationCode,
};
