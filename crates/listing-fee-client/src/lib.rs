//! Listing-fee payment client.
//!
//! This crate exposes:
//! - transport abstractions (`MarketplaceTransport`, `MockTransport`, REST `HttpTransport`),
//! - fee schedule and payment-method lookups (`FeeConfigProvider`, `PaymentMethodRegistry`),
//! - eligibility rules and the submit gate,
//! - the verification challenge state machine with its expiry countdown,
//! - high-level facade (`PaymentSubmissionController`) driving the whole workflow.

pub mod challenge;
pub mod client;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod eligibility;
pub mod fee_config;
#[cfg(not(target_arch = "wasm32"))]
pub mod http;
pub mod notify;
pub mod registry;
pub mod transport;

pub use challenge::{ChallengeError, ChallengeOutcome, ModalStep, VerificationChallengeController};
pub use client::{ModalView, PaymentSubmissionController, SubmissionOutcome, WorkflowError};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use countdown::{CountdownTick, ExpiryCountdown};
pub use eligibility::{Ineligibility, SubmitBlock, SubmitGate};
pub use fee_config::{FeeConfigError, FeeConfigProvider};
#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpTransport;
pub use notify::{Notification, NotificationSink, RecordingSink, TracingSink};
pub use registry::{PaymentMethodRegistry, RegistryRefresh, RegistrySnapshot};
pub use transport::{MarketplaceTransport, MockTransport, TransportError, GENERIC_PAYMENT_FAILURE};
