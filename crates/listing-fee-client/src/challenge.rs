//! VerificationChallengeController: the REVIEW / VERIFY state machine of the
//! confirmation modal.
//!
//! ```text
//! Review ──confirm──▶ Submitting ──ok──────────────▶ Success
//!                         │ ├──verification required─▶ Verify
//!                         │ └──other error───────────▶ Failed ──retry──▶ Review
//! Verify ──submit code──▶ SubmittingVerification ──ok──▶ Success
//!   ▲  │                     ├──verification required──▶ Verify (code cleared)
//!   │  └──resend (in flight flag, stays in Verify)      └──other error──▶ Failed
//!   └── resend acknowledged: deadline reset, code cleared
//! ```
//!
//! The controller never talks to the network: `begin_*` hands out the
//! [`PaymentAttempt`] to send and [`VerificationChallengeController::complete`]
//! applies the backend's answer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use listing_fee_types::{
    ListingId, PaymentAttempt, PaymentMethodSelection, PaymentReceipt, VerificationCode,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::config::ClientConfig;
use crate::countdown::{CountdownTick, ExpiryCountdown};
use crate::transport::{TransportError, GENERIC_PAYMENT_FAILURE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalStep {
    Review,
    Submitting,
    Verify,
    SubmittingVerification,
    Success,
    Failed,
}

impl ModalStep {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub const fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting | Self::SubmittingVerification)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("a payment request is already in flight")]
    RequestInFlight,
    #[error("a verification code resend is already in flight")]
    ResendInFlight,
    #[error("verification code needs {expected} digits, got {actual}")]
    IncompleteCode { expected: usize, actual: usize },
    #[error("`{action}` is not allowed while the modal is in step {step:?}")]
    InvalidTransition {
        action: &'static str,
        step: ModalStep,
    },
}

/// What a completed backend call did to the modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Succeeded(PaymentReceipt),
    /// First demand for a code: a fresh challenge now runs until `expires_at`.
    VerificationRequired {
        expires_at: DateTime<Utc>,
        message: Option<String>,
    },
    /// Code refused (wrong or expired). Deadline unchanged.
    CodeRejected { expires_at: DateTime<Utc> },
    /// Resend acknowledged. Deadline reset.
    CodeResent { expires_at: DateTime<Utc> },
    /// Resend failed for another reason; the challenge stays as it was.
    ResendFailed { message: String },
    Failed { message: String },
}

#[derive(Debug)]
struct Challenge {
    code: VerificationCode,
    countdown: ExpiryCountdown,
    resend_in_flight: bool,
}

#[derive(Debug)]
enum Phase {
    Review,
    Submitting,
    Verify(Challenge),
    SubmittingVerification(Challenge),
    Success(PaymentReceipt),
    Failed(String),
}

impl Phase {
    fn step(&self) -> ModalStep {
        match self {
            Self::Review => ModalStep::Review,
            Self::Submitting => ModalStep::Submitting,
            Self::Verify(_) => ModalStep::Verify,
            Self::SubmittingVerification(_) => ModalStep::SubmittingVerification,
            Self::Success(_) => ModalStep::Success,
            Self::Failed(_) => ModalStep::Failed,
        }
    }

    fn challenge(&self) -> Option<&Challenge> {
        match self {
            Self::Verify(challenge) | Self::SubmittingVerification(challenge) => Some(challenge),
            _ => None,
        }
    }
}

/// One confirmation modal for one listing. Dropping it discards the
/// challenge and stops its countdown.
#[derive(Debug)]
pub struct VerificationChallengeController {
    listing_id: ListingId,
    selection: PaymentMethodSelection,
    phase: Phase,
    clock: SharedClock,
    ttl: chrono::Duration,
    tick: Duration,
}

impl VerificationChallengeController {
    pub fn new(
        listing_id: ListingId,
        selection: PaymentMethodSelection,
        clock: SharedClock,
        config: &ClientConfig,
    ) -> Self {
        Self {
            listing_id,
            selection,
            phase: Phase::Review,
            clock,
            ttl: config.verification_ttl(),
            tick: config.countdown_tick(),
        }
    }

    pub fn listing_id(&self) -> &ListingId {
        &self.listing_id
    }

    pub fn selection(&self) -> &PaymentMethodSelection {
        &self.selection
    }

    pub fn step(&self) -> ModalStep {
        self.phase.step()
    }

    pub fn code(&self) -> Option<&VerificationCode> {
        self.phase.challenge().map(|challenge| &challenge.code)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.phase
            .challenge()
            .map(|challenge| challenge.countdown.expires_at())
    }

    pub fn countdown(&self) -> Option<CountdownTick> {
        self.phase
            .challenge()
            .map(|challenge| challenge.countdown.tick_now())
    }

    pub fn subscribe_countdown(&self) -> Option<watch::Receiver<CountdownTick>> {
        self.phase
            .challenge()
            .map(|challenge| challenge.countdown.subscribe())
    }

    /// A challenge exists and its deadline has not passed.
    pub fn is_active(&self) -> bool {
        self.countdown().is_some_and(|tick| !tick.expired)
    }

    pub fn has_challenge(&self) -> bool {
        self.phase.challenge().is_some()
    }

    pub fn is_request_in_flight(&self) -> bool {
        match &self.phase {
            Phase::Submitting | Phase::SubmittingVerification(_) => true,
            Phase::Verify(challenge) => challenge.resend_in_flight,
            _ => false,
        }
    }

    /// Review: the pay / send-code button. Verify: the confirm-code button.
    pub fn confirm_enabled(&self) -> bool {
        match &self.phase {
            Phase::Review => true,
            Phase::Verify(challenge) => challenge.code.is_complete() && !challenge.resend_in_flight,
            _ => false,
        }
    }

    pub fn resend_enabled(&self) -> bool {
        matches!(&self.phase, Phase::Verify(challenge) if !challenge.resend_in_flight)
    }

    pub fn receipt(&self) -> Option<&PaymentReceipt> {
        match &self.phase {
            Phase::Success(receipt) => Some(receipt),
            _ => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Review → Submitting. The attempt carries an empty code.
    pub fn begin_submit(&mut self) -> Result<PaymentAttempt, ChallengeError> {
        match &self.phase {
            Phase::Review => {
                self.phase = Phase::Submitting;
                debug!(listing = %self.listing_id, "modal: review -> submitting");
                Ok(self.attempt(VerificationCode::empty()))
            }
            _ => Err(self.busy_or_invalid("submit")),
        }
    }

    /// Verify → SubmittingVerification with the six-digit code.
    pub fn begin_code_submission(&mut self) -> Result<PaymentAttempt, ChallengeError> {
        let code = match &self.phase {
            Phase::Verify(challenge) if challenge.resend_in_flight => {
                return Err(ChallengeError::ResendInFlight)
            }
            Phase::Verify(challenge) if !challenge.code.is_complete() => {
                return Err(ChallengeError::IncompleteCode {
                    expected: VerificationCode::LEN,
                    actual: challenge.code.len(),
                })
            }
            Phase::Verify(challenge) => challenge.code.clone(),
            _ => return Err(self.busy_or_invalid("submit code")),
        };
        if let Phase::Verify(challenge) = std::mem::replace(&mut self.phase, Phase::Review) {
            self.phase = Phase::SubmittingVerification(challenge);
        }
        debug!(listing = %self.listing_id, "modal: verify -> submitting verification");
        Ok(self.attempt(code))
    }

    /// Re-issues the original payload with an empty code. Stays in Verify;
    /// a second resend is refused until this one completes.
    pub fn begin_resend(&mut self) -> Result<PaymentAttempt, ChallengeError> {
        match &mut self.phase {
            Phase::Verify(challenge) if challenge.resend_in_flight => {
                Err(ChallengeError::ResendInFlight)
            }
            Phase::Verify(challenge) => {
                challenge.resend_in_flight = true;
                debug!(listing = %self.listing_id, "modal: resend in flight");
                Ok(self.attempt(VerificationCode::empty()))
            }
            _ => Err(self.busy_or_invalid("resend code")),
        }
    }

    /// Applies the backend's answer to whichever request is in flight.
    pub fn complete(
        &mut self,
        result: Result<PaymentReceipt, TransportError>,
    ) -> Result<ChallengeOutcome, ChallengeError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Review);
        let (phase, outcome) = match phase {
            Phase::Submitting => self.complete_submit(result),
            Phase::SubmittingVerification(challenge) => self.complete_code(challenge, result),
            Phase::Verify(challenge) if challenge.resend_in_flight => {
                self.complete_resend(challenge, result)
            }
            other => {
                let step = other.step();
                self.phase = other;
                return Err(ChallengeError::InvalidTransition {
                    action: "complete",
                    step,
                });
            }
        };
        self.phase = phase;
        debug!(listing = %self.listing_id, step = ?self.phase.step(), "modal: request completed");
        Ok(outcome)
    }

    /// Only digits are kept, at most six; anything else is dropped silently.
    pub fn enter_code(&mut self, raw: &str) -> Result<&VerificationCode, ChallengeError> {
        match &mut self.phase {
            Phase::Verify(challenge) => {
                challenge.code = VerificationCode::filter(raw);
                Ok(&challenge.code)
            }
            Phase::SubmittingVerification(_) => Err(ChallengeError::RequestInFlight),
            other => Err(ChallengeError::InvalidTransition {
                action: "enter code",
                step: other.step(),
            }),
        }
    }

    /// Switching payment method discards any code typed for the old one.
    pub fn change_selection(
        &mut self,
        selection: PaymentMethodSelection,
    ) -> Result<(), ChallengeError> {
        if self.is_request_in_flight() {
            return Err(ChallengeError::RequestInFlight);
        }
        if let Phase::Verify(challenge) = &mut self.phase {
            challenge.code.clear();
        }
        self.selection = selection;
        Ok(())
    }

    /// Failed → Review, for another attempt with the same listing.
    pub fn retry(&mut self) -> Result<(), ChallengeError> {
        match &self.phase {
            Phase::Failed(_) => {
                self.phase = Phase::Review;
                Ok(())
            }
            _ => Err(self.busy_or_invalid("retry")),
        }
    }

    fn complete_submit(
        &self,
        result: Result<PaymentReceipt, TransportError>,
    ) -> (Phase, ChallengeOutcome) {
        match result {
            Ok(receipt) => {
                info!(listing = %self.listing_id, "listing fee paid without verification");
                (
                    Phase::Success(receipt.clone()),
                    ChallengeOutcome::Succeeded(receipt),
                )
            }
            Err(err) if err.is_verification_required() => {
                let countdown = self.start_countdown();
                let expires_at = countdown.expires_at();
                info!(listing = %self.listing_id, %expires_at, "verification code required");
                (
                    Phase::Verify(Challenge {
                        code: VerificationCode::empty(),
                        countdown,
                        resend_in_flight: false,
                    }),
                    ChallengeOutcome::VerificationRequired {
                        expires_at,
                        message: err.backend_message().map(str::to_string),
                    },
                )
            }
            Err(err) => self.fail(&err),
        }
    }

    fn complete_code(
        &self,
        mut challenge: Challenge,
        result: Result<PaymentReceipt, TransportError>,
    ) -> (Phase, ChallengeOutcome) {
        match result {
            Ok(receipt) => {
                info!(listing = %self.listing_id, "listing fee paid after verification");
                (
                    Phase::Success(receipt.clone()),
                    ChallengeOutcome::Succeeded(receipt),
                )
            }
            Err(err) if err.is_verification_required() => {
                challenge.code.clear();
                let expires_at = challenge.countdown.expires_at();
                info!(listing = %self.listing_id, "verification code rejected");
                (
                    Phase::Verify(challenge),
                    ChallengeOutcome::CodeRejected { expires_at },
                )
            }
            Err(err) => self.fail(&err),
        }
    }

    fn complete_resend(
        &self,
        mut challenge: Challenge,
        result: Result<PaymentReceipt, TransportError>,
    ) -> (Phase, ChallengeOutcome) {
        challenge.resend_in_flight = false;
        match result {
            Ok(receipt) => (
                Phase::Success(receipt.clone()),
                ChallengeOutcome::Succeeded(receipt),
            ),
            Err(err) if err.is_verification_required() => {
                challenge.countdown = self.start_countdown();
                challenge.code.clear();
                let expires_at = challenge.countdown.expires_at();
                info!(listing = %self.listing_id, %expires_at, "verification code resent");
                (
                    Phase::Verify(challenge),
                    ChallengeOutcome::CodeResent { expires_at },
                )
            }
            Err(err) => {
                info!(listing = %self.listing_id, error = %err, "verification code resend failed");
                (
                    Phase::Verify(challenge),
                    ChallengeOutcome::ResendFailed {
                        message: err.user_message(),
                    },
                )
            }
        }
    }

    fn fail(&self, err: &TransportError) -> (Phase, ChallengeOutcome) {
        let message = err.backend_message().unwrap_or(GENERIC_PAYMENT_FAILURE).to_string();
        info!(listing = %self.listing_id, error = %err, "listing fee payment failed");
        (
            Phase::Failed(message.clone()),
            ChallengeOutcome::Failed { message },
        )
    }

    fn start_countdown(&self) -> ExpiryCountdown {
        let expires_at = self.clock.now() + self.ttl;
        ExpiryCountdown::start(expires_at, self.clock.clone(), self.tick)
    }

    fn attempt(&self, code: VerificationCode) -> PaymentAttempt {
        PaymentAttempt::new(self.listing_id.clone(), self.selection.clone()).with_code(code)
    }

    fn busy_or_invalid(&self, action: &'static str) -> ChallengeError {
        if self.is_request_in_flight() {
            ChallengeError::RequestInFlight
        } else {
            ChallengeError::InvalidTransition {
                action,
                step: self.step(),
            }
        }
    }
}
