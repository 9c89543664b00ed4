use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use listing_fee_backend_mock::{BackendRejection, MockBackend};
use listing_fee_types::{
    BackendErrorCode, BankAccount, CreditCard, DraftListing, EWallet, FeeConfig,
    ListingFeePaymentRequest, ListingStatus, PaymentReceipt,
};
use thiserror::Error;

/// Shown when the backend gives no usable message for a failed payment.
pub const GENERIC_PAYMENT_FAILURE: &str = "Payment could not be completed. Please try again.";

/// Error model for backend calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: code={code}, message={message}")]
    Rejected {
        code: BackendErrorCode,
        message: String,
    },
    #[error("invalid backend response: {0}")]
    Decode(String),
    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    pub fn rejected(code: impl AsRef<str>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: BackendErrorCode::from(code.as_ref()),
            message: message.into(),
        }
    }

    /// Classified by structured code only, never by HTTP status.
    pub fn is_verification_required(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                code: BackendErrorCode::PaymentVerificationRequired,
                ..
            }
        )
    }

    /// Non-blank message supplied by the backend, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Backend message verbatim when one was supplied, generic fallback otherwise.
    pub fn user_message(&self) -> String {
        self.backend_message()
            .unwrap_or(GENERIC_PAYMENT_FAILURE)
            .to_string()
    }
}

/// Marketplace backend contracts consumed by the listing-fee workflow.
/// Implementations may use the in-memory mock or the REST API.
#[async_trait(?Send)]
pub trait MarketplaceTransport {
    async fn get_my_listings_by_status(
        &self,
        status: ListingStatus,
    ) -> Result<Vec<DraftListing>, TransportError>;

    async fn get_listing_fee_config(&self) -> Result<FeeConfig, TransportError>;

    async fn create_listing_fee_payment(
        &self,
        request: ListingFeePaymentRequest,
    ) -> Result<PaymentReceipt, TransportError>;

    async fn get_credit_cards(&self) -> Result<Vec<CreditCard>, TransportError>;

    async fn get_bank_accounts(&self) -> Result<Vec<BankAccount>, TransportError>;

    async fn get_ewallet(&self) -> Result<Option<EWallet>, TransportError>;
}

/// In-memory transport backed by `MockBackend`, used by tests and the demo.
#[derive(Clone)]
pub struct MockTransport {
    backend: Arc<Mutex<MockBackend>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            latency: None,
        }
    }

    /// Delay every call, so a request stays in flight across other UI events.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Run `f` against the shared backend, e.g. to inspect or script it.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut MockBackend) -> R) -> R {
        let mut lock = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut lock)
    }

    async fn call<R>(
        &self,
        f: impl FnOnce(&mut MockBackend) -> Result<R, BackendRejection>,
    ) -> Result<R, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.with_backend(f).map_err(map_rejection)
    }
}

fn map_rejection(rejection: BackendRejection) -> TransportError {
    if rejection.code == "SERVICE_UNAVAILABLE" {
        TransportError::Unavailable(rejection.message)
    } else {
        TransportError::rejected(rejection.code, rejection.message)
    }
}

#[async_trait(?Send)]
impl MarketplaceTransport for MockTransport {
    async fn get_my_listings_by_status(
        &self,
        status: ListingStatus,
    ) -> Result<Vec<DraftListing>, TransportError> {
        self.call(|backend| backend.get_my_listings_by_status(status))
            .await
    }

    async fn get_listing_fee_config(&self) -> Result<FeeConfig, TransportError> {
        self.call(|backend| backend.get_listing_fee_config()).await
    }

    async fn create_listing_fee_payment(
        &self,
        request: ListingFeePaymentRequest,
    ) -> Result<PaymentReceipt, TransportError> {
        self.call(|backend| backend.create_listing_fee_payment(request))
            .await
    }

    async fn get_credit_cards(&self) -> Result<Vec<CreditCard>, TransportError> {
        self.call(|backend| backend.get_credit_cards()).await
    }

    async fn get_bank_accounts(&self) -> Result<Vec<BankAccount>, TransportError> {
        self.call(|backend| backend.get_bank_accounts()).await
    }

    async fn get_ewallet(&self) -> Result<Option<EWallet>, TransportError> {
        self.call(|backend| backend.get_ewallet()).await
    }
}
