//! Mock marketplace backend for testing the listing-fee workflow without a server.

pub mod mock_backend;
pub mod scenarios;

pub use mock_backend::{BackendRejection, Endpoint, MockBackend, VerificationPolicy};
pub use scenarios::{DemoAccounts, DemoScenario};
