//! MockBackend: in-memory listings, fee schedule, stored instruments, and step-up verification.

use std::collections::HashSet;

use listing_fee_types::{
    BackendErrorCode, BankAccount, CreditCard, DraftListing, EWallet, FeeConfig,
    ListingFeePaymentRequest, ListingStatus, PaymentMethodKind, PaymentReceipt, VerificationCode,
};
use rust_decimal::Decimal;
use tracing::debug;

/// Error returned by the mock in the backend's `{ code, message }` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRejection {
    pub code: String,
    pub message: String,
}

impl BackendRejection {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    fn verification_required() -> Self {
        Self::new(
            BackendErrorCode::PAYMENT_VERIFICATION_REQUIRED,
            "A verification code has been sent. Enter it to complete the payment.",
        )
    }
}

/// Backend endpoints that can be taken offline independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Listings,
    FeeConfig,
    CreateListingFeePayment,
    CreditCards,
    BankAccounts,
    EWallet,
}

/// When the backend demands a one-time code before charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    #[default]
    Never,
    Always,
}

#[derive(Debug, Clone)]
struct IssuedCode {
    code: VerificationCode,
    expired: bool,
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    pub listings: Vec<DraftListing>,
    pub fee_config: FeeConfig,
    pub credit_cards: Vec<CreditCard>,
    pub bank_accounts: Vec<BankAccount>,
    pub ewallet: Option<EWallet>,
    pub verification_policy: VerificationPolicy,
    /// Every payment request received, in order.
    pub payment_requests: Vec<ListingFeePaymentRequest>,
    pub codes_issued: u32,
    outages: HashSet<Endpoint>,
    scripted_failures: Vec<BackendRejection>,
    issued_code: Option<IssuedCode>,
    code_seed: u32,
}

impl MockBackend {
    pub fn new(fee_config: FeeConfig) -> Self {
        Self {
            listings: Vec::new(),
            fee_config,
            credit_cards: Vec::new(),
            bank_accounts: Vec::new(),
            ewallet: None,
            verification_policy: VerificationPolicy::Never,
            payment_requests: Vec::new(),
            codes_issued: 0,
            outages: HashSet::new(),
            scripted_failures: Vec::new(),
            issued_code: None,
            code_seed: 4_217,
        }
    }

    pub fn set_outage(&mut self, endpoint: Endpoint, down: bool) {
        if down {
            self.outages.insert(endpoint);
        } else {
            self.outages.remove(&endpoint);
        }
    }

    /// Queue a rejection returned by the next payment request(s), oldest first.
    pub fn script_failure(&mut self, rejection: BackendRejection) {
        self.scripted_failures.push(rejection);
    }

    /// The code most recently sent to the user, if any.
    pub fn issued_code(&self) -> Option<&VerificationCode> {
        self.issued_code.as_ref().map(|issued| &issued.code)
    }

    pub fn expire_issued_code(&mut self) {
        if let Some(issued) = self.issued_code.as_mut() {
            issued.expired = true;
        }
    }

    pub fn listing_status(&self, listing_id: &str) -> Option<ListingStatus> {
        self.listings
            .iter()
            .find(|listing| listing.id.as_str() == listing_id)
            .map(|listing| listing.status)
    }

    pub fn get_my_listings_by_status(
        &self,
        status: ListingStatus,
    ) -> Result<Vec<DraftListing>, BackendRejection> {
        self.check_online(Endpoint::Listings)?;
        Ok(self
            .listings
            .iter()
            .filter(|listing| listing.status == status)
            .cloned()
            .collect())
    }

    pub fn get_listing_fee_config(&self) -> Result<FeeConfig, BackendRejection> {
        self.check_online(Endpoint::FeeConfig)?;
        Ok(self.fee_config.clone())
    }

    pub fn get_credit_cards(&self) -> Result<Vec<CreditCard>, BackendRejection> {
        self.check_online(Endpoint::CreditCards)?;
        Ok(self.credit_cards.clone())
    }

    pub fn get_bank_accounts(&self) -> Result<Vec<BankAccount>, BackendRejection> {
        self.check_online(Endpoint::BankAccounts)?;
        Ok(self.bank_accounts.clone())
    }

    pub fn get_ewallet(&self) -> Result<Option<EWallet>, BackendRejection> {
        self.check_online(Endpoint::EWallet)?;
        Ok(self.ewallet.clone())
    }

    pub fn create_listing_fee_payment(
        &mut self,
        request: ListingFeePaymentRequest,
    ) -> Result<PaymentReceipt, BackendRejection> {
        self.payment_requests.push(request.clone());
        self.check_online(Endpoint::CreateListingFeePayment)?;
        if !self.scripted_failures.is_empty() {
            return Err(self.scripted_failures.remove(0));
        }

        let listing_idx = self
            .listings
            .iter()
            .position(|listing| listing.id == request.listing_id)
            .ok_or_else(|| BackendRejection::new("LISTING_NOT_FOUND", "Listing not found"))?;
        if self.listings[listing_idx].status != ListingStatus::Draft {
            return Err(BackendRejection::new(
                "LISTING_NOT_DRAFT",
                "Only draft listings can be published",
            ));
        }
        self.check_instrument(&request)?;

        if self.verification_policy == VerificationPolicy::Always {
            self.check_verification(&request.verification_code)?;
        }

        let total = self.fee_config.total_creation_fee;
        if request.payment_method == PaymentMethodKind::EWallet {
            let wallet = self
                .ewallet
                .as_mut()
                .ok_or_else(|| BackendRejection::new("EWALLET_NOT_FOUND", "No e-wallet"))?;
            if wallet.balance < total {
                return Err(BackendRejection::new(
                    "INSUFFICIENT_BALANCE",
                    "E-wallet balance is insufficient",
                ));
            }
            wallet.balance -= total;
        }

        self.issued_code = None;
        self.listings[listing_idx].status = ListingStatus::Active;
        let payment_id = format!("pay-{}", self.payment_requests.len());
        debug!(listing = %request.listing_id, %payment_id, "mock listing fee charged");
        Ok(PaymentReceipt {
            payment_id: Some(payment_id),
            amount: Some(total),
            message: Some("Listing published".to_string()),
        })
    }

    fn check_online(&self, endpoint: Endpoint) -> Result<(), BackendRejection> {
        if self.outages.contains(&endpoint) {
            return Err(BackendRejection::new(
                "SERVICE_UNAVAILABLE",
                format!("{endpoint:?} is temporarily unavailable"),
            ));
        }
        Ok(())
    }

    fn check_instrument(&self, request: &ListingFeePaymentRequest) -> Result<(), BackendRejection> {
        let known = match request.payment_method {
            PaymentMethodKind::CreditCard => request
                .credit_card_id
                .as_ref()
                .is_some_and(|id| self.credit_cards.iter().any(|card| &card.id == id)),
            PaymentMethodKind::Transfer => request
                .bank_account_id
                .as_ref()
                .is_some_and(|iban| self.bank_accounts.iter().any(|acct| &acct.iban == iban)),
            PaymentMethodKind::EWallet => self.ewallet.is_some(),
        };
        if known {
            Ok(())
        } else {
            Err(BackendRejection::new(
                "INVALID_PAYMENT_METHOD",
                "Selected payment method is not available",
            ))
        }
    }

    /// An empty code (re)issues a challenge; a wrong or expired code is answered
    /// with the same verification-required signal.
    fn check_verification(&mut self, code: &VerificationCode) -> Result<(), BackendRejection> {
        if code.is_empty() {
            self.issue_code();
            return Err(BackendRejection::verification_required());
        }
        match &self.issued_code {
            Some(issued) if !issued.expired && &issued.code == code => Ok(()),
            _ => Err(BackendRejection::verification_required()),
        }
    }

    fn issue_code(&mut self) {
        self.code_seed = self.code_seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let code = VerificationCode::filter(&format!("{:06}", self.code_seed % 1_000_000));
        self.codes_issued += 1;
        debug!(codes_issued = self.codes_issued, "mock verification code issued");
        self.issued_code = Some(IssuedCode {
            code,
            expired: false,
        });
    }

    pub fn wallet_balance(&self) -> Option<Decimal> {
        self.ewallet.as_ref().map(|wallet| wallet.balance)
    }
}
