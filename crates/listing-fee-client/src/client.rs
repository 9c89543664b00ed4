//! PaymentSubmissionController: high-level facade for the listing-fee checkout.
//!
//! Owns the draft-listing list, the current payment-method selection, the
//! agreement checkbox, and at most one confirmation modal. Every backend
//! answer is mapped to a modal transition plus a notification; transport
//! errors never escape as panics.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use listing_fee_types::{
    DraftListing, FeeConfig, ListingId, ListingStatus, PaymentAttempt, PaymentMethodKind,
    PaymentMethodSelection, PaymentReceipt, ValidationError, VerificationCode,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    challenge::{ChallengeError, ChallengeOutcome, ModalStep, VerificationChallengeController},
    clock::SharedClock,
    config::ClientConfig,
    countdown::CountdownTick,
    eligibility::{self, SubmitBlock, SubmitGate},
    fee_config::{FeeConfigError, FeeConfigProvider},
    notify::NotificationSink,
    registry::{PaymentMethodRegistry, RegistryRefresh, RegistrySnapshot},
    transport::{MarketplaceTransport, TransportError},
};

const MSG_PAID: &str = "Listing fee paid. Your listing is now published.";
const MSG_CODE_REJECTED: &str = "The verification code is invalid or has expired.";
const MSG_CODE_RESENT: &str = "A new verification code has been sent.";

/// Workflow-level errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    FeeConfig(#[from] FeeConfigError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("listing {0} is not among your draft listings")]
    UnknownListing(ListingId),
    #[error("listing {0} is not a draft")]
    NotDraft(ListingId),
    #[error("listing {0} has a pending verification challenge")]
    ListingLocked(ListingId),
    #[error("no listing selected")]
    NoListingSelected,
    #[error("{}", .0.message())]
    Blocked(SubmitBlock),
    #[error("confirmation modal is not open")]
    ModalClosed,
    #[error("listing fee is not loaded")]
    FeeUnavailable,
}

impl From<SubmitBlock> for WorkflowError {
    fn from(block: SubmitBlock) -> Self {
        match block {
            SubmitBlock::FeeUnavailable => Self::FeeUnavailable,
            block => Self::Blocked(block),
        }
    }
}

/// Result of one submit / submit-code / resend click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Completed(ChallengeOutcome),
    /// The modal was closed while the request was in flight.
    Discarded,
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(ChallengeOutcome::Succeeded(_)))
    }
}

/// Read-only snapshot of the confirmation modal for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalView {
    pub listing_id: ListingId,
    pub selection: PaymentMethodSelection,
    pub step: ModalStep,
    pub code: Option<VerificationCode>,
    pub expires_at: Option<DateTime<Utc>>,
    pub countdown: Option<CountdownTick>,
    pub confirm_enabled: bool,
    pub resend_enabled: bool,
    pub failure_message: Option<String>,
}

struct Modal {
    session: u64,
    challenge: VerificationChallengeController,
}

impl Modal {
    /// The pay and resend buttons also follow the live submit gate.
    fn view(&self, gate: &SubmitGate) -> ModalView {
        let challenge = &self.challenge;
        ModalView {
            listing_id: challenge.listing_id().clone(),
            selection: challenge.selection().clone(),
            step: challenge.step(),
            code: challenge.code().cloned(),
            expires_at: challenge.expires_at(),
            countdown: challenge.countdown(),
            confirm_enabled: challenge.confirm_enabled() && gate.is_ready(),
            resend_enabled: challenge.resend_enabled() && gate.is_ready(),
            failure_message: challenge.failure_message().map(str::to_string),
        }
    }

    /// A challenge (or a request) pins the modal to its listing.
    fn is_locked(&self) -> bool {
        self.challenge.has_challenge() || self.challenge.is_request_in_flight()
    }
}

#[derive(Default)]
struct WorkflowState {
    drafts: Vec<DraftListing>,
    selected_listing: Option<ListingId>,
    selection: Option<PaymentMethodSelection>,
    agreements_accepted: bool,
    modal: Option<Modal>,
    next_session: u64,
}

type SuccessHook = Box<dyn Fn(&ListingId, &PaymentReceipt)>;

/// Coordinates fee lookup, payment-method refresh, eligibility, the
/// verification challenge, and notifications.
///
/// All methods take `&self`: a click handler may start a request while
/// another is still in flight, and the modal's state decides which one wins.
pub struct PaymentSubmissionController<T, N>
where
    T: MarketplaceTransport + Clone,
    N: NotificationSink,
{
    transport: T,
    sink: N,
    clock: SharedClock,
    config: ClientConfig,
    fee: FeeConfigProvider<T>,
    registry: PaymentMethodRegistry<T>,
    state: Mutex<WorkflowState>,
    on_success: Option<SuccessHook>,
}

impl<T, N> PaymentSubmissionController<T, N>
where
    T: MarketplaceTransport + Clone,
    N: NotificationSink,
{
    pub fn new(transport: T, sink: N, clock: SharedClock, config: ClientConfig) -> Self {
        Self {
            fee: FeeConfigProvider::new(transport.clone()),
            registry: PaymentMethodRegistry::new(transport.clone()),
            transport,
            sink,
            clock,
            config,
            state: Mutex::new(WorkflowState::default()),
            on_success: None,
        }
    }

    /// Called after a successful payment, once drafts are refetched and the modal is closed.
    pub fn with_on_success(mut self, hook: impl Fn(&ListingId, &PaymentReceipt) + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Workflow entry: fee schedule, draft listings, and payment methods,
    /// fetched concurrently. A missing fee schedule blocks the workflow.
    pub async fn enter(&self) -> Result<(), WorkflowError> {
        self.fee.reset();
        let (fee, drafts, refresh) = futures::join!(
            self.fee.fetch_fee_config(),
            self.transport.get_my_listings_by_status(ListingStatus::Draft),
            self.registry.refresh(self.clock.now())
        );
        self.report_registry_failures(&refresh);
        let drafts = self.store_drafts(drafts);
        if let Err(err) = &fee {
            self.sink
                .show_error("The listing fee could not be loaded. Please try again.");
            warn!(error = %err, "workflow blocked: no fee schedule");
        }
        fee?;
        drafts?;
        info!("listing fee workflow ready");
        Ok(())
    }

    /// Explicit refetch, e.g. from the retry button of the blocking error state.
    pub async fn reload_fee_config(&self) -> Result<FeeConfig, WorkflowError> {
        self.fee.fetch_fee_config().await.map_err(|err| {
            self.sink
                .show_error("The listing fee could not be loaded. Please try again.");
            err.into()
        })
    }

    pub fn fee_config(&self) -> Option<FeeConfig> {
        self.fee.current()
    }

    pub async fn load_draft_listings(&self) -> Result<Vec<DraftListing>, WorkflowError> {
        let drafts = self
            .transport
            .get_my_listings_by_status(ListingStatus::Draft)
            .await;
        self.store_drafts(drafts)
    }

    pub fn draft_listings(&self) -> Vec<DraftListing> {
        self.state().drafts.clone()
    }

    pub async fn refresh_payment_methods(&self) -> RegistrySnapshot {
        let refresh = self.registry.refresh(self.clock.now()).await;
        self.report_registry_failures(&refresh);
        refresh.snapshot
    }

    pub fn payment_methods(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn select_listing(&self, listing_id: &ListingId) -> Result<(), WorkflowError> {
        let mut state = self.state();
        if let Some(modal) = &state.modal {
            if modal.is_locked() {
                if modal.challenge.listing_id() == listing_id {
                    return Ok(());
                }
                return Err(WorkflowError::ListingLocked(
                    modal.challenge.listing_id().clone(),
                ));
            }
            state.modal = None;
        }
        let listing = state
            .drafts
            .iter()
            .find(|listing| &listing.id == listing_id)
            .ok_or_else(|| WorkflowError::UnknownListing(listing_id.clone()))?;
        if !listing.is_draft() {
            return Err(WorkflowError::NotDraft(listing_id.clone()));
        }
        debug!(listing = %listing_id, "listing selected for payment");
        state.selected_listing = Some(listing_id.clone());
        Ok(())
    }

    pub fn selected_listing(&self) -> Option<ListingId> {
        self.state().selected_listing.clone()
    }

    pub fn select_payment_method(
        &self,
        selection: PaymentMethodSelection,
    ) -> Result<(), WorkflowError> {
        let mut state = self.state();
        if let Some(modal) = state.modal.as_mut() {
            modal.challenge.change_selection(selection.clone())?;
        }
        debug!(method = %selection.kind(), "payment method selected");
        state.selection = Some(selection);
        Ok(())
    }

    pub fn payment_method(&self) -> Option<PaymentMethodSelection> {
        self.state().selection.clone()
    }

    pub fn set_agreements_accepted(&self, accepted: bool) {
        self.state().agreements_accepted = accepted;
    }

    pub fn is_eligible(&self) -> bool {
        let selection = self.state().selection.clone();
        self.fee.current().is_some_and(|fee| {
            eligibility::is_eligible(selection.as_ref(), &fee, &self.registry.snapshot())
        })
    }

    pub fn submit_gate(&self) -> SubmitGate {
        let state = self.state();
        self.gate(&state)
    }

    /// Refetches payment methods, re-evaluates eligibility, and opens the modal in Review.
    pub async fn open_confirmation(&self) -> Result<ModalView, WorkflowError> {
        {
            let state = self.state();
            if let Some(modal) = state.modal.as_ref().filter(|modal| modal.is_locked()) {
                return Err(WorkflowError::ListingLocked(
                    modal.challenge.listing_id().clone(),
                ));
            }
            if state.selected_listing.is_none() {
                return Err(WorkflowError::NoListingSelected);
            }
        }

        let refresh = self.registry.refresh(self.clock.now()).await;
        self.report_registry_failures(&refresh);

        let mut state = self.state();
        if let Some(modal) = state.modal.as_ref().filter(|modal| modal.is_locked()) {
            return Err(WorkflowError::ListingLocked(
                modal.challenge.listing_id().clone(),
            ));
        }
        let listing_id = state
            .selected_listing
            .clone()
            .ok_or(WorkflowError::NoListingSelected)?;
        let gate = self.gate(&state);
        if let SubmitGate::Blocked(block) = &gate {
            debug!(reason = %block.message(), "confirmation blocked");
            return Err(block.clone().into());
        }
        let selection = state
            .selection
            .clone()
            .ok_or(WorkflowError::Blocked(SubmitBlock::PaymentMethod(
                eligibility::Ineligibility::NoPaymentMethod,
            )))?;

        let session = state.next_session;
        state.next_session += 1;
        let modal = Modal {
            session,
            challenge: VerificationChallengeController::new(
                listing_id.clone(),
                selection,
                self.clock.clone(),
                &self.config,
            ),
        };
        let view = modal.view(&gate);
        state.modal = Some(modal);
        info!(listing = %listing_id, session, "confirmation modal opened");
        Ok(view)
    }

    /// Review → Submitting: pays, or asks the backend to send a code.
    pub async fn confirm(&self) -> Result<SubmissionOutcome, WorkflowError> {
        let (session, attempt) =
            self.begin(|challenge| challenge.begin_submit())?;
        self.dispatch(session, attempt).await
    }

    /// Filters the raw input and stores it as the current code.
    pub fn enter_code(&self, raw: &str) -> Result<VerificationCode, WorkflowError> {
        let mut state = self.state();
        let modal = state.modal.as_mut().ok_or(WorkflowError::ModalClosed)?;
        Ok(modal.challenge.enter_code(raw)?.clone())
    }

    /// Verify → SubmittingVerification with the entered six-digit code.
    pub async fn submit_code(&self) -> Result<SubmissionOutcome, WorkflowError> {
        let (session, attempt) =
            self.begin(|challenge| challenge.begin_code_submission())?;
        self.dispatch(session, attempt).await
    }

    /// Asks the backend for a new code. Refused while another resend is in flight.
    pub async fn resend_code(&self) -> Result<SubmissionOutcome, WorkflowError> {
        let (session, attempt) = self.begin(|challenge| challenge.begin_resend())?;
        self.dispatch(session, attempt).await
    }

    /// Failed → Review.
    pub fn retry(&self) -> Result<ModalView, WorkflowError> {
        let mut state = self.state();
        let gate = self.gate(&state);
        let modal = state.modal.as_mut().ok_or(WorkflowError::ModalClosed)?;
        modal.challenge.retry()?;
        Ok(modal.view(&gate))
    }

    /// Closes the modal and discards any challenge. No backend call is made;
    /// an answer to a request still in flight is ignored.
    pub fn cancel(&self) -> bool {
        let closed = self.state().modal.take();
        if let Some(modal) = &closed {
            info!(
                listing = %modal.challenge.listing_id(),
                step = ?modal.challenge.step(),
                "confirmation modal cancelled"
            );
        }
        closed.is_some()
    }

    pub fn modal_view(&self) -> Option<ModalView> {
        let state = self.state();
        let gate = self.gate(&state);
        state.modal.as_ref().map(|modal| modal.view(&gate))
    }

    pub fn subscribe_countdown(&self) -> Option<watch::Receiver<CountdownTick>> {
        self.state()
            .modal
            .as_ref()
            .and_then(|modal| modal.challenge.subscribe_countdown())
    }

    fn state(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self, state: &WorkflowState) -> SubmitGate {
        SubmitGate::evaluate(
            state.selection.as_ref(),
            self.fee.current().as_ref(),
            &self.registry.snapshot(),
            state.agreements_accepted,
        )
    }

    /// Local checks, then the modal transition that marks the request in flight.
    fn begin(
        &self,
        start: impl FnOnce(
            &mut VerificationChallengeController,
        ) -> Result<PaymentAttempt, ChallengeError>,
    ) -> Result<(u64, PaymentAttempt), WorkflowError> {
        let mut state = self.state();
        let gate = self.gate(&state);
        let modal = state.modal.as_mut().ok_or(WorkflowError::ModalClosed)?;
        if modal.challenge.is_request_in_flight() {
            // Let the state machine name the exact conflict.
            return Err(start(&mut modal.challenge)
                .err()
                .unwrap_or(ChallengeError::RequestInFlight)
                .into());
        }
        if let SubmitGate::Blocked(block) = gate {
            return Err(block.into());
        }
        let attempt = start(&mut modal.challenge)?;
        Ok((modal.session, attempt))
    }

    async fn dispatch(
        &self,
        session: u64,
        attempt: PaymentAttempt,
    ) -> Result<SubmissionOutcome, WorkflowError> {
        info!(
            listing = %attempt.listing_id,
            method = %attempt.selection.kind(),
            with_code = !attempt.verification_code.is_empty(),
            "submitting listing fee payment"
        );
        let result = match attempt.to_request() {
            Ok(request) => self.transport.create_listing_fee_payment(request).await,
            Err(err) => Err(TransportError::Internal(err.to_string())),
        };
        self.finish(session, result).await
    }

    async fn finish(
        &self,
        session: u64,
        result: Result<PaymentReceipt, TransportError>,
    ) -> Result<SubmissionOutcome, WorkflowError> {
        let completed = {
            let mut state = self.state();
            match state.modal.as_mut() {
                Some(modal) if modal.session == session => {
                    let listing_id = modal.challenge.listing_id().clone();
                    Some((listing_id, modal.challenge.complete(result.clone())?))
                }
                _ => None,
            }
        };

        let Some((listing_id, outcome)) = completed else {
            warn!(session, "modal closed while request was in flight; response ignored");
            if result.is_ok() {
                self.sink.show_success(MSG_PAID);
                if let Err(err) = self.load_draft_listings().await {
                    debug!(error = %err, "draft refetch after discarded payment failed");
                }
            }
            return Ok(SubmissionOutcome::Discarded);
        };

        self.notify(&outcome);
        if let ChallengeOutcome::Succeeded(receipt) = &outcome {
            self.on_paid(session, &listing_id, receipt).await;
        }
        Ok(SubmissionOutcome::Completed(outcome))
    }

    async fn on_paid(&self, session: u64, listing_id: &ListingId, receipt: &PaymentReceipt) {
        {
            let mut state = self.state();
            if state.modal.as_ref().is_some_and(|modal| modal.session == session) {
                state.modal = None;
            }
            if state.selected_listing.as_ref() == Some(listing_id) {
                state.selected_listing = None;
            }
        }
        if let Err(err) = self.load_draft_listings().await {
            debug!(error = %err, "draft refetch after payment failed");
        }
        if let Some(hook) = &self.on_success {
            hook(listing_id, receipt);
        }
    }

    fn notify(&self, outcome: &ChallengeOutcome) {
        match outcome {
            ChallengeOutcome::Succeeded(_) => self.sink.show_success(MSG_PAID),
            ChallengeOutcome::VerificationRequired { message, .. } => {
                let fallback = format!(
                    "A verification code has been sent. Enter it within {} minutes.",
                    self.config.verification_ttl_secs / 60
                );
                self.sink.show_info(message.as_deref().unwrap_or(&fallback));
            }
            ChallengeOutcome::CodeRejected { .. } => self.sink.show_error(MSG_CODE_REJECTED),
            ChallengeOutcome::CodeResent { .. } => self.sink.show_info(MSG_CODE_RESENT),
            ChallengeOutcome::ResendFailed { message } | ChallengeOutcome::Failed { message } => {
                self.sink.show_error(message)
            }
        }
    }

    fn store_drafts(
        &self,
        drafts: Result<Vec<DraftListing>, TransportError>,
    ) -> Result<Vec<DraftListing>, WorkflowError> {
        match drafts {
            Ok(drafts) => {
                let mut state = self.state();
                if let Some(selected) = state.selected_listing.clone() {
                    if !drafts.iter().any(|listing| listing.id == selected) {
                        state.selected_listing = None;
                    }
                }
                state.drafts = drafts.clone();
                debug!(count = drafts.len(), "draft listings loaded");
                Ok(drafts)
            }
            Err(err) => {
                warn!(error = %err, "draft listings fetch failed");
                self.sink
                    .show_error("Your draft listings could not be loaded. Please try again.");
                Err(err.into())
            }
        }
    }

    fn report_registry_failures(&self, refresh: &RegistryRefresh) {
        for (kind, _) in &refresh.failures {
            let source = match kind {
                PaymentMethodKind::CreditCard => "Saved credit cards",
                PaymentMethodKind::Transfer => "Bank accounts",
                PaymentMethodKind::EWallet => "E-wallet",
            };
            self.sink.show_error(&format!(
                "{source} could not be loaded. Other payment methods are still available."
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use listing_fee_backend_mock::{BackendRejection, DemoScenario, Endpoint, VerificationPolicy};
    use listing_fee_types::{PaymentMethodSelection, VerificationCode};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::eligibility::Ineligibility;
    use crate::notify::{Notification, RecordingSink};
    use crate::transport::MockTransport;

    type Controller = PaymentSubmissionController<MockTransport, RecordingSink>;

    struct Harness {
        scenario: DemoScenario,
        transport: MockTransport,
        sink: RecordingSink,
        clock: ManualClock,
        controller: Controller,
    }

    fn harness(scenario: DemoScenario) -> Harness {
        harness_with(scenario, None)
    }

    fn harness_with(scenario: DemoScenario, latency: Option<Duration>) -> Harness {
        let mut transport = MockTransport::new(scenario.backend.clone());
        if let Some(latency) = latency {
            transport = transport.with_latency(latency);
        }
        let sink = RecordingSink::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap());
        let controller = PaymentSubmissionController::new(
            transport.clone(),
            sink.clone(),
            Arc::new(clock.clone()),
            ClientConfig::default(),
        );
        Harness {
            scenario,
            transport,
            sink,
            clock,
            controller,
        }
    }

    /// Enters the workflow and prepares the camera listing with `selection`.
    async fn ready(h: &Harness, selection: PaymentMethodSelection) {
        h.controller.enter().await.unwrap();
        h.controller.select_listing(&h.scenario.accounts.camera).unwrap();
        h.controller.select_payment_method(selection).unwrap();
        h.controller.set_agreements_accepted(true);
    }

    fn card(h: &Harness) -> PaymentMethodSelection {
        PaymentMethodSelection::credit_card(h.scenario.accounts.visa.clone())
    }

    fn issued_code(h: &Harness) -> VerificationCode {
        h.transport
            .with_backend(|backend| backend.issued_code().cloned())
            .unwrap()
    }

    fn wrong_code(issued: &VerificationCode) -> &'static str {
        if issued.as_str() == "111111" {
            "222222"
        } else {
            "111111"
        }
    }

    async fn reach_verify(h: &Harness) -> DateTime<Utc> {
        ready(h, card(h)).await;
        h.controller.open_confirmation().await.unwrap();
        match h.controller.confirm().await.unwrap() {
            SubmissionOutcome::Completed(ChallengeOutcome::VerificationRequired {
                expires_at,
                ..
            }) => expires_at,
            other => panic!("expected verification challenge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wallet_covering_the_fee_pays_and_publishes() {
        let h = harness(DemoScenario::new());
        let paid = Rc::new(RefCell::new(Vec::new()));
        let seen = paid.clone();
        let controller = PaymentSubmissionController::new(
            h.transport.clone(),
            h.sink.clone(),
            Arc::new(h.clock.clone()),
            ClientConfig::default(),
        )
        .with_on_success(move |listing, _| seen.borrow_mut().push(listing.clone()));

        controller.enter().await.unwrap();
        assert_eq!(controller.draft_listings().len(), 2);
        controller.select_listing(&h.scenario.accounts.camera).unwrap();
        controller
            .select_payment_method(PaymentMethodSelection::EWallet)
            .unwrap();
        controller.set_agreements_accepted(true);
        assert!(controller.is_eligible());
        assert!(controller.submit_gate().is_ready());

        let view = controller.open_confirmation().await.unwrap();
        assert_eq!(view.step, ModalStep::Review);
        assert!(view.confirm_enabled);

        let outcome = controller.confirm().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(controller.modal_view(), None);
        assert_eq!(*paid.borrow(), vec![h.scenario.accounts.camera.clone()]);
        assert_eq!(controller.draft_listings().len(), 1);
        assert_eq!(controller.selected_listing(), None);
        assert_eq!(h.sink.last(), Some(Notification::Success(MSG_PAID.to_string())));
        assert_eq!(
            h.transport.with_backend(|backend| backend.wallet_balance()),
            Some(dec!(0.00))
        );
    }

    #[tokio::test]
    async fn short_wallet_blocks_before_any_request() {
        let h = harness(DemoScenario::new().with_wallet_balance(dec!(50.00)));
        ready(&h, PaymentMethodSelection::EWallet).await;

        let expected = SubmitBlock::PaymentMethod(Ineligibility::InsufficientBalance {
            balance: dec!(50.00),
            required: dec!(118.00),
        });
        assert_eq!(h.controller.submit_gate(), SubmitGate::Blocked(expected.clone()));
        assert!(expected.message().contains("118.00"));

        let err = h.controller.open_confirmation().await.unwrap_err();
        assert_eq!(err, WorkflowError::Blocked(expected));
        assert!(h
            .transport
            .with_backend(|backend| backend.payment_requests.is_empty()));
    }

    #[tokio::test]
    async fn wallet_top_up_is_seen_after_refresh() {
        let h = harness(DemoScenario::new().with_wallet_balance(dec!(50.00)));
        ready(&h, PaymentMethodSelection::EWallet).await;
        assert_eq!(h.controller.payment_method(), Some(PaymentMethodSelection::EWallet));
        assert!(!h.controller.submit_gate().is_ready());

        h.transport.with_backend(|backend| {
            if let Some(wallet) = backend.ewallet.as_mut() {
                wallet.balance = dec!(200.00);
            }
        });
        assert!(!h.controller.is_eligible());

        let snapshot = h.controller.refresh_payment_methods().await;
        assert_eq!(snapshot.ewallet.map(|wallet| wallet.balance), Some(dec!(200.00)));
        assert!(h.controller.is_eligible());
        assert!(h.controller.submit_gate().is_ready());
    }

    #[tokio::test]
    async fn unticking_agreements_disables_the_open_modal() {
        let h = harness(DemoScenario::new());
        ready(&h, PaymentMethodSelection::EWallet).await;
        assert!(h.controller.open_confirmation().await.unwrap().confirm_enabled);

        h.controller.set_agreements_accepted(false);
        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.step, ModalStep::Review);
        assert!(!view.confirm_enabled);
        assert_eq!(
            h.controller.confirm().await.unwrap_err(),
            WorkflowError::Blocked(SubmitBlock::Agreements)
        );

        h.controller.set_agreements_accepted(true);
        assert!(h.controller.modal_view().unwrap().confirm_enabled);
        assert!(h.controller.confirm().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn unticking_agreements_during_verify_disables_both_buttons() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        h.controller.enter_code(issued_code(&h).as_str()).unwrap();
        let view = h.controller.modal_view().unwrap();
        assert!(view.confirm_enabled);
        assert!(view.resend_enabled);

        h.controller.set_agreements_accepted(false);
        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.step, ModalStep::Verify);
        assert!(!view.confirm_enabled);
        assert!(!view.resend_enabled);
        assert_eq!(
            h.controller.resend_code().await.unwrap_err(),
            WorkflowError::Blocked(SubmitBlock::Agreements)
        );
    }

    #[tokio::test]
    async fn unaccepted_agreements_block_confirmation() {
        let h = harness(DemoScenario::new());
        ready(&h, PaymentMethodSelection::EWallet).await;
        h.controller.set_agreements_accepted(false);

        assert_eq!(
            h.controller.open_confirmation().await.unwrap_err(),
            WorkflowError::Blocked(SubmitBlock::Agreements)
        );
    }

    #[tokio::test]
    async fn verification_demand_opens_a_fifteen_minute_challenge() {
        let h = harness(DemoScenario::new().requiring_verification());
        let started = h.clock.now();
        let expires_at = reach_verify(&h).await;

        assert_eq!(expires_at, started + chrono::Duration::minutes(15));
        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.step, ModalStep::Verify);
        assert_eq!(view.code, Some(VerificationCode::empty()));
        assert_eq!(view.countdown.map(|tick| tick.display()), Some("15:00".to_string()));
        assert!(!view.confirm_enabled);
        assert!(view.resend_enabled);
        assert!(matches!(h.sink.last(), Some(Notification::Info(_))));
    }

    #[tokio::test]
    async fn correct_code_completes_the_payment() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;

        let code = issued_code(&h);
        let typed = h.controller.enter_code(&format!("{}-x", code.as_str())).unwrap();
        assert_eq!(typed, code);

        let outcome = h.controller.submit_code().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(h.controller.modal_view(), None);
        let requests = h.transport.with_backend(|backend| backend.payment_requests.clone());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].verification_code, code);
    }

    #[tokio::test]
    async fn incomplete_code_is_not_sent() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        h.controller.enter_code("123").unwrap();

        assert_eq!(
            h.controller.submit_code().await.unwrap_err(),
            WorkflowError::Challenge(ChallengeError::IncompleteCode {
                expected: 6,
                actual: 3
            })
        );
        assert_eq!(
            h.transport
                .with_backend(|backend| backend.payment_requests.len()),
            1
        );
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_original_deadline() {
        let h = harness(DemoScenario::new().requiring_verification());
        let expires_at = reach_verify(&h).await;
        h.clock.advance(chrono::Duration::minutes(3));

        h.controller.enter_code(wrong_code(&issued_code(&h))).unwrap();
        let outcome = h.controller.submit_code().await.unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Completed(ChallengeOutcome::CodeRejected { expires_at })
        );
        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.step, ModalStep::Verify);
        assert_eq!(view.expires_at, Some(expires_at));
        assert_eq!(h.sink.last(), Some(Notification::Error(MSG_CODE_REJECTED.to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_resend_is_refused_and_deadline_resets_once() {
        let h = harness_with(
            DemoScenario::new().requiring_verification(),
            Some(Duration::from_millis(250)),
        );
        let first_deadline = reach_verify(&h).await;
        h.clock.advance(chrono::Duration::minutes(5));
        h.controller.enter_code("12345").unwrap();

        let (first, second) =
            futures::join!(h.controller.resend_code(), h.controller.resend_code());

        assert_eq!(
            second.unwrap_err(),
            WorkflowError::Challenge(ChallengeError::ResendInFlight)
        );
        let new_deadline = h.clock.now() + chrono::Duration::minutes(15);
        assert_eq!(
            first.unwrap(),
            SubmissionOutcome::Completed(ChallengeOutcome::CodeResent {
                expires_at: new_deadline
            })
        );
        assert!(new_deadline > first_deadline);
        assert_eq!(h.transport.with_backend(|backend| backend.codes_issued), 2);

        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.step, ModalStep::Verify);
        assert_eq!(view.expires_at, Some(new_deadline));
        assert_eq!(view.code, Some(VerificationCode::empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn code_submission_in_flight_blocks_resend() {
        let h = harness_with(
            DemoScenario::new().requiring_verification(),
            Some(Duration::from_millis(250)),
        );
        reach_verify(&h).await;
        h.controller.enter_code(issued_code(&h).as_str()).unwrap();

        let (submitted, resent) =
            futures::join!(h.controller.submit_code(), h.controller.resend_code());

        assert!(submitted.unwrap().is_success());
        assert_eq!(
            resent.unwrap_err(),
            WorkflowError::Challenge(ChallengeError::RequestInFlight)
        );
    }

    #[tokio::test]
    async fn challenge_pins_the_listing_until_cancelled() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        let bicycle = h.scenario.accounts.bicycle.clone();

        assert_eq!(
            h.controller.select_listing(&bicycle).unwrap_err(),
            WorkflowError::ListingLocked(h.scenario.accounts.camera.clone())
        );

        assert!(h.controller.cancel());
        assert_eq!(h.controller.modal_view(), None);
        h.controller.select_listing(&bicycle).unwrap();

        let view = h.controller.open_confirmation().await.unwrap();
        assert_eq!(view.listing_id, bicycle);
        assert_eq!(view.step, ModalStep::Review);
        assert_eq!(view.expires_at, None);
        assert_eq!(
            h.transport
                .with_backend(|backend| backend.payment_requests.len()),
            1
        );
    }

    #[tokio::test]
    async fn reopening_the_same_listing_after_cancel_starts_fresh() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        h.controller.enter_code("123456").unwrap();
        let mut ticks = h.controller.subscribe_countdown().unwrap();
        let _ = ticks.borrow_and_update();

        assert!(h.controller.cancel());
        assert!(ticks.changed().await.is_err());

        let view = h.controller.open_confirmation().await.unwrap();
        assert_eq!(view.listing_id, h.scenario.accounts.camera);
        assert_eq!(view.step, ModalStep::Review);
        assert_eq!(view.code, None);
        assert_eq!(view.expires_at, None);
        assert_eq!(view.countdown, None);
        assert!(h.controller.subscribe_countdown().is_none());
    }

    #[tokio::test]
    async fn switching_method_during_verify_discards_the_typed_code() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        h.controller.enter_code("4242").unwrap();

        let transfer = PaymentMethodSelection::transfer(h.scenario.accounts.iban.clone());
        h.controller.select_payment_method(transfer.clone()).unwrap();

        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.selection, transfer);
        assert_eq!(view.code, Some(VerificationCode::empty()));
        assert_eq!(view.step, ModalStep::Verify);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_to_a_cancelled_modal_is_ignored() {
        let h = harness_with(
            DemoScenario::new().requiring_verification(),
            Some(Duration::from_millis(250)),
        );
        ready(&h, card(&h)).await;
        h.controller.open_confirmation().await.unwrap();

        let (outcome, cancelled) =
            futures::join!(h.controller.confirm(), async { h.controller.cancel() });

        assert!(cancelled);
        assert_eq!(outcome.unwrap(), SubmissionOutcome::Discarded);
        assert_eq!(h.controller.modal_view(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn payment_landing_after_cancel_still_refreshes_drafts() {
        let h = harness_with(DemoScenario::new(), Some(Duration::from_millis(250)));
        ready(&h, PaymentMethodSelection::EWallet).await;
        h.controller.open_confirmation().await.unwrap();

        let (outcome, cancelled) =
            futures::join!(h.controller.confirm(), async { h.controller.cancel() });

        assert!(cancelled);
        assert_eq!(outcome.unwrap(), SubmissionOutcome::Discarded);
        assert_eq!(h.sink.last(), Some(Notification::Success(MSG_PAID.to_string())));
        assert_eq!(h.controller.draft_listings().len(), 1);
    }

    #[tokio::test]
    async fn rejection_fails_the_modal_and_retry_returns_to_review() {
        let h = harness(DemoScenario::new());
        ready(&h, card(&h)).await;
        h.transport.with_backend(|backend| {
            backend.script_failure(BackendRejection::new("CARD_DECLINED", "Card was declined"))
        });
        h.controller.open_confirmation().await.unwrap();

        let outcome = h.controller.confirm().await.unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::Completed(ChallengeOutcome::Failed {
                message: "Card was declined".to_string()
            })
        );
        assert_eq!(h.controller.modal_view().unwrap().step, ModalStep::Failed);
        assert_eq!(h.sink.errors(), vec!["Card was declined".to_string()]);

        assert_eq!(h.controller.retry().unwrap().step, ModalStep::Review);
        assert!(h.controller.confirm().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn declined_code_fails_the_modal_and_stops_the_countdown() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        let code = issued_code(&h);
        h.transport.with_backend(|backend| {
            backend.script_failure(BackendRejection::new("CARD_DECLINED", "Card was declined"))
        });

        h.controller.enter_code(code.as_str()).unwrap();
        let outcome = h.controller.submit_code().await.unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Completed(ChallengeOutcome::Failed {
                message: "Card was declined".to_string()
            })
        );
        let view = h.controller.modal_view().unwrap();
        assert_eq!(view.step, ModalStep::Failed);
        assert_eq!(view.expires_at, None);
        assert_eq!(view.countdown, None);
        assert_eq!(view.failure_message.as_deref(), Some("Card was declined"));
        assert_eq!(
            h.controller.sink().last(),
            Some(Notification::Error("Card was declined".to_string()))
        );

        let view = h.controller.retry().unwrap();
        assert_eq!(view.step, ModalStep::Review);
        assert_eq!(view.code, None);
        assert!(view.confirm_enabled);
    }

    #[tokio::test]
    async fn resend_answered_with_payment_publishes_the_listing() {
        let h = harness(DemoScenario::new().requiring_verification());
        reach_verify(&h).await;
        h.transport
            .with_backend(|backend| backend.verification_policy = VerificationPolicy::Never);

        let outcome = h.controller.resend_code().await.unwrap();

        assert!(matches!(
            outcome,
            SubmissionOutcome::Completed(ChallengeOutcome::Succeeded(_))
        ));
        assert_eq!(h.controller.modal_view(), None);
        assert_eq!(h.controller.draft_listings().len(), 1);
        assert_eq!(
            h.controller.sink().last(),
            Some(Notification::Success(MSG_PAID.to_string()))
        );
    }

    #[tokio::test]
    async fn missing_fee_schedule_blocks_the_workflow() {
        let h = harness(DemoScenario::new());
        h.transport
            .with_backend(|backend| backend.set_outage(Endpoint::FeeConfig, true));

        let err = h.controller.enter().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::FeeConfig(FeeConfigError::Transport(TransportError::Unavailable(_)))
        ));
        assert_eq!(h.controller.fee_config(), None);
        assert_eq!(
            h.controller.submit_gate(),
            SubmitGate::Blocked(SubmitBlock::FeeUnavailable)
        );
        h.controller.select_listing(&h.scenario.accounts.camera).unwrap();
        h.controller
            .select_payment_method(PaymentMethodSelection::EWallet)
            .unwrap();
        h.controller.set_agreements_accepted(true);
        assert_eq!(
            h.controller.open_confirmation().await.unwrap_err(),
            WorkflowError::FeeUnavailable
        );

        h.transport
            .with_backend(|backend| backend.set_outage(Endpoint::FeeConfig, false));
        let fee = h.controller.reload_fee_config().await.unwrap();
        assert_eq!(fee.total_creation_fee, dec!(118.00));
    }

    #[tokio::test]
    async fn one_failed_method_source_leaves_the_others_usable() {
        let h = harness(DemoScenario::new());
        h.transport
            .with_backend(|backend| backend.set_outage(Endpoint::CreditCards, true));

        ready(&h, PaymentMethodSelection::EWallet).await;

        assert!(h.controller.payment_methods().credit_cards.is_empty());
        assert_eq!(h.sink.errors().len(), 1);
        assert!(h.sink.errors()[0].starts_with("Saved credit cards"));
        assert!(h.controller.submit_gate().is_ready());
    }

    #[tokio::test]
    async fn only_known_drafts_can_be_selected() {
        let h = harness(DemoScenario::new());
        h.controller.enter().await.unwrap();
        let published = h.scenario.accounts.published.clone();

        assert_eq!(
            h.controller.select_listing(&published).unwrap_err(),
            WorkflowError::UnknownListing(published)
        );
        assert_eq!(
            h.controller.confirm().await.unwrap_err(),
            WorkflowError::ModalClosed
        );
        assert_eq!(
            h.controller.open_confirmation().await.unwrap_err(),
            WorkflowError::NoListingSelected
        );
    }
}
