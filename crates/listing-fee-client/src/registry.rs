//! PaymentMethodRegistry: stored cards, bank accounts, and e-wallet, fetched independently.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use listing_fee_types::{BankAccount, CreditCard, EWallet, PaymentMethodKind};
use tracing::{debug, warn};

use crate::transport::{MarketplaceTransport, TransportError};

/// Read-only view of the user's payment instruments at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub credit_cards: Vec<CreditCard>,
    pub bank_accounts: Vec<BankAccount>,
    pub ewallet: Option<EWallet>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Result of a refresh. Failed sources are already folded into the snapshot
/// as empty lists or an absent wallet.
#[derive(Debug, Clone)]
pub struct RegistryRefresh {
    pub snapshot: RegistrySnapshot,
    pub failures: Vec<(PaymentMethodKind, TransportError)>,
}

impl RegistryRefresh {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct PaymentMethodRegistry<T: MarketplaceTransport> {
    transport: T,
    snapshot: Mutex<RegistrySnapshot>,
}

impl<T: MarketplaceTransport> PaymentMethodRegistry<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            snapshot: Mutex::new(RegistrySnapshot::default()),
        }
    }

    pub async fn fetch_credit_cards(&self) -> Result<Vec<CreditCard>, TransportError> {
        self.transport.get_credit_cards().await
    }

    pub async fn fetch_bank_accounts(&self) -> Result<Vec<BankAccount>, TransportError> {
        self.transport.get_bank_accounts().await
    }

    pub async fn fetch_ewallet(&self) -> Result<Option<EWallet>, TransportError> {
        self.transport.get_ewallet().await
    }

    /// Fetches all three sources concurrently and waits for every one of them.
    /// One source failing never blocks the others.
    pub async fn refresh(&self, now: DateTime<Utc>) -> RegistryRefresh {
        let (cards, accounts, wallet) = futures::join!(
            self.fetch_credit_cards(),
            self.fetch_bank_accounts(),
            self.fetch_ewallet()
        );

        let mut failures = Vec::new();
        let credit_cards = cards.unwrap_or_else(|err| {
            failures.push((PaymentMethodKind::CreditCard, err));
            Vec::new()
        });
        let bank_accounts = accounts.unwrap_or_else(|err| {
            failures.push((PaymentMethodKind::Transfer, err));
            Vec::new()
        });
        let ewallet = wallet.unwrap_or_else(|err| {
            failures.push((PaymentMethodKind::EWallet, err));
            None
        });
        for (kind, err) in &failures {
            warn!(method = %kind, error = %err, "payment method fetch failed; treating as empty");
        }

        let snapshot = RegistrySnapshot {
            credit_cards,
            bank_accounts,
            ewallet,
            fetched_at: Some(now),
        };
        debug!(
            cards = snapshot.credit_cards.len(),
            bank_accounts = snapshot.bank_accounts.len(),
            has_wallet = snapshot.ewallet.is_some(),
            "payment methods refreshed"
        );
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        RegistryRefresh { snapshot, failures }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use listing_fee_backend_mock::{DemoScenario, Endpoint};
    use listing_fee_types::PaymentMethodKind;

    use super::PaymentMethodRegistry;
    use crate::transport::MockTransport;

    #[tokio::test]
    async fn refresh_loads_all_sources() {
        let registry = PaymentMethodRegistry::new(MockTransport::new(DemoScenario::new().backend));
        let refresh = registry.refresh(Utc::now()).await;
        assert!(refresh.is_complete());
        assert_eq!(refresh.snapshot.credit_cards.len(), 1);
        assert_eq!(refresh.snapshot.bank_accounts.len(), 1);
        assert!(refresh.snapshot.ewallet.is_some());
        assert_eq!(registry.snapshot(), refresh.snapshot);
    }

    #[tokio::test]
    async fn one_outage_does_not_block_the_others() {
        let transport = MockTransport::new(DemoScenario::new().backend);
        transport.with_backend(|backend| backend.set_outage(Endpoint::CreditCards, true));
        let registry = PaymentMethodRegistry::new(transport);
        let refresh = registry.refresh(Utc::now()).await;
        assert_eq!(refresh.failures.len(), 1);
        assert_eq!(refresh.failures[0].0, PaymentMethodKind::CreditCard);
        assert!(refresh.snapshot.credit_cards.is_empty());
        assert_eq!(refresh.snapshot.bank_accounts.len(), 1);
        assert!(refresh.snapshot.ewallet.is_some());
    }

    #[tokio::test]
    async fn refresh_replaces_stale_balances() {
        let transport = MockTransport::new(DemoScenario::new().backend);
        let registry = PaymentMethodRegistry::new(transport.clone());
        registry.refresh(Utc::now()).await;
        transport.with_backend(|backend| backend.ewallet = None);
        assert!(registry.snapshot().ewallet.is_some());
        registry.refresh(Utc::now()).await;
        assert!(registry.snapshot().ewallet.is_none());
    }
}
