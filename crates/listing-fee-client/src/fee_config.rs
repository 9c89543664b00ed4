//! FeeConfigProvider: fetches and caches the listing-fee schedule.

use std::sync::{Mutex, PoisonError};

use listing_fee_types::{FeeConfig, ValidationError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::transport::{MarketplaceTransport, TransportError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeConfigError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid fee configuration: {0}")]
    Invalid(#[from] ValidationError),
}

/// Holds the last successfully fetched fee schedule. Never refreshes on its
/// own; callers that need a fresh value fetch again.
pub struct FeeConfigProvider<T: MarketplaceTransport> {
    transport: T,
    cached: Mutex<Option<FeeConfig>>,
}

impl<T: MarketplaceTransport> FeeConfigProvider<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cached: Mutex::new(None),
        }
    }

    /// Fetches and caches. A failed fetch leaves any earlier value in place.
    pub async fn fetch_fee_config(&self) -> Result<FeeConfig, FeeConfigError> {
        let fee = match self.transport.get_listing_fee_config().await {
            Ok(fee) => fee,
            Err(err) => {
                warn!(error = %err, "listing fee config fetch failed");
                return Err(err.into());
            }
        };
        fee.validate()?;
        debug!(
            creation_fee = %fee.creation_fee,
            tax_percentage = %fee.tax_percentage,
            total = %fee.total_creation_fee,
            "listing fee config loaded"
        );
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(fee.clone());
        Ok(fee)
    }

    pub fn current(&self) -> Option<FeeConfig> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the cached schedule so the next workflow entry must fetch.
    pub fn reset(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use listing_fee_backend_mock::{DemoScenario, Endpoint};
    use rust_decimal_macros::dec;

    use super::{FeeConfigError, FeeConfigProvider};
    use crate::transport::MockTransport;

    #[tokio::test]
    async fn caches_fetched_schedule() {
        let transport = MockTransport::new(DemoScenario::new().backend);
        let provider = FeeConfigProvider::new(transport);
        assert!(provider.current().is_none());
        let fee = provider.fetch_fee_config().await.unwrap();
        assert_eq!(fee.total_creation_fee, dec!(118.00));
        assert_eq!(provider.current(), Some(fee));
    }

    #[tokio::test]
    async fn failed_refetch_keeps_stale_value() {
        let transport = MockTransport::new(DemoScenario::new().backend);
        let provider = FeeConfigProvider::new(transport.clone());
        provider.fetch_fee_config().await.unwrap();
        transport.with_backend(|backend| backend.set_outage(Endpoint::FeeConfig, true));
        assert!(matches!(
            provider.fetch_fee_config().await,
            Err(FeeConfigError::Transport(_))
        ));
        assert!(provider.current().is_some());
        provider.reset();
        assert!(provider.current().is_none());
    }

    #[tokio::test]
    async fn out_of_range_tax_is_rejected() {
        let mut scenario = DemoScenario::new();
        scenario.backend.fee_config.tax_percentage = dec!(250);
        let provider = FeeConfigProvider::new(MockTransport::new(scenario.backend));
        assert!(matches!(
            provider.fetch_fee_config().await,
            Err(FeeConfigError::Invalid(_))
        ));
        assert!(provider.current().is_none());
    }
}
