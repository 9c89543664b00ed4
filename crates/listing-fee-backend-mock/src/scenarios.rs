use listing_fee_types::{
    BankAccount, CreditCard, CreditCardId, DraftListing, EWallet, FeeConfig, Iban, ListingId,
    ListingStatus,
};
use rust_decimal::Decimal;

use crate::mock_backend::{MockBackend, VerificationPolicy};

#[derive(Debug, Clone)]
pub struct DemoAccounts {
    pub camera: ListingId,
    pub bicycle: ListingId,
    pub published: ListingId,
    pub visa: CreditCardId,
    pub iban: Iban,
}

#[derive(Debug, Clone)]
pub struct DemoScenario {
    pub accounts: DemoAccounts,
    pub backend: MockBackend,
}

impl DemoScenario {
    /// Fee of 100.00 plus 18% tax (118.00 total), one card, one bank account,
    /// and an e-wallet holding exactly the fee.
    pub fn new() -> Self {
        let accounts = DemoAccounts {
            camera: demo_id("L1"),
            bicycle: demo_id("L2"),
            published: demo_id("L3"),
            visa: demo_id("card-1"),
            iban: Iban::new("TR33 0006 1005 1978 6457 8413 26").expect("demo IBAN is well formed"),
        };

        let mut backend = MockBackend::new(FeeConfig {
            creation_fee: Decimal::new(10_000, 2),
            tax_percentage: Decimal::new(18, 0),
            total_creation_fee: Decimal::new(11_800, 2),
        });
        backend.listings = vec![
            listing(&accounts.camera, "Vintage film camera", 2_450, ListingStatus::Draft),
            listing(&accounts.bicycle, "Road bicycle", 18_000, ListingStatus::Draft),
            listing(&accounts.published, "Bookshelf", 600, ListingStatus::Active),
        ];
        backend.credit_cards = vec![CreditCard {
            id: accounts.visa.clone(),
            holder_name: "Deniz Aydin".to_string(),
            masked_number: "**** **** **** 4242".to_string(),
            brand: Some("VISA".to_string()),
            expiry_month: 8,
            expiry_year: 2029,
        }];
        backend.bank_accounts = vec![BankAccount {
            iban: accounts.iban.clone(),
            bank_name: "Demo Bank".to_string(),
            holder_name: "Deniz Aydin".to_string(),
        }];
        backend.ewallet = Some(EWallet {
            balance: Decimal::new(11_800, 2),
            currency: "TRY".to_string(),
        });

        Self { accounts, backend }
    }

    pub fn requiring_verification(mut self) -> Self {
        self.backend.verification_policy = VerificationPolicy::Always;
        self
    }

    pub fn with_wallet_balance(mut self, balance: Decimal) -> Self {
        if let Some(wallet) = self.backend.ewallet.as_mut() {
            wallet.balance = balance;
        }
        self
    }
}

impl Default for DemoScenario {
    fn default() -> Self {
        Self::new()
    }
}

fn demo_id<T>(value: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Debug,
{
    value.parse().expect("demo ids are non-empty")
}

fn listing(id: &ListingId, title: &str, price: i64, status: ListingStatus) -> DraftListing {
    DraftListing {
        id: id.clone(),
        title: title.to_string(),
        description: String::new(),
        price: Decimal::new(price, 0),
        currency: "TRY".to_string(),
        status,
    }
}
