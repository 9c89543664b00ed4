//! Demo binary: pay the listing fee for a draft listing against the in-memory backend.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use listing_fee_backend_mock::DemoScenario;
use listing_fee_client::{
    ChallengeOutcome, ClientConfig, MockTransport, PaymentSubmissionController,
    SubmissionOutcome, SystemClock, TracingSink,
};
use listing_fee_types::{ListingId, PaymentMethodSelection};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Card,
    Transfer,
    Wallet,
}

#[derive(Parser, Debug)]
#[command(
    name = "listing-fee-demo",
    about = "Pay a listing fee against the in-memory marketplace backend"
)]
struct Cli {
    /// Draft listing to publish (L1 or L2 in the demo data).
    #[arg(long, default_value = "L1")]
    listing: String,

    #[arg(long, value_enum, default_value = "wallet")]
    method: Method,

    /// Override the e-wallet balance, e.g. `50.00`.
    #[arg(long)]
    wallet_balance: Option<Decimal>,

    /// Make the backend demand a one-time code before charging.
    #[arg(long)]
    require_verification: bool,

    /// Type a wrong code once before the right one.
    #[arg(long)]
    wrong_code_first: bool,

    #[arg(long, default_value = "900")]
    verification_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        verification_ttl_secs: cli.verification_ttl_secs,
        ..ClientConfig::default()
    };
    config.validate()?;

    let mut scenario = DemoScenario::new();
    if cli.require_verification {
        scenario = scenario.requiring_verification();
    }
    if let Some(balance) = cli.wallet_balance {
        scenario = scenario.with_wallet_balance(balance);
    }
    let accounts = scenario.accounts.clone();
    let transport = MockTransport::new(scenario.backend);

    let controller = PaymentSubmissionController::new(
        transport.clone(),
        TracingSink,
        Arc::new(SystemClock),
        config,
    )
    .with_on_success(|listing, receipt| {
        info!(
            %listing,
            payment_id = receipt.payment_id.as_deref().unwrap_or("-"),
            "listing published"
        );
    });

    controller.enter().await?;
    if let Some(fee) = controller.fee_config() {
        info!("Listing fee: {}", fee.display_total("TRY"));
    }

    let listing = ListingId::new(cli.listing)?;
    controller.select_listing(&listing)?;
    controller.select_payment_method(match cli.method {
        Method::Card => PaymentMethodSelection::credit_card(accounts.visa),
        Method::Transfer => PaymentMethodSelection::transfer(accounts.iban),
        Method::Wallet => PaymentMethodSelection::EWallet,
    })?;
    controller.set_agreements_accepted(true);

    if let Some(PaymentMethodSelection::CreditCard {
        card_id: Some(card_id),
    }) = controller.payment_method()
    {
        let methods = controller.payment_methods();
        if let Some(card) = methods.credit_cards.iter().find(|card| card.id == card_id) {
            info!("Paying with {}", card.label());
        }
    }

    if let Some(reason) = controller.submit_gate().message() {
        warn!("Cannot pay: {reason}");
        return Ok(());
    }

    controller.open_confirmation().await?;
    info!("Confirming payment for {listing}");
    let mut outcome = controller.confirm().await?;

    if let SubmissionOutcome::Completed(ChallengeOutcome::VerificationRequired { .. }) = outcome {
        if let Some(view) = controller.modal_view() {
            if let Some(tick) = view.countdown {
                info!("Code expires in {}", tick.display());
            }
        }
        let code = transport
            .with_backend(|backend| backend.issued_code().cloned())
            .ok_or("backend issued no verification code")?;
        if cli.wrong_code_first {
            let wrong = if code.as_str() == "000000" { "111111" } else { "000000" };
            controller.enter_code(wrong)?;
            info!("Submitting a wrong code");
            controller.submit_code().await?;
        }
        controller.enter_code(code.as_str())?;
        info!("Submitting the code received by SMS");
        outcome = controller.submit_code().await?;
    }

    if outcome.is_success() {
        info!(
            "{} draft listing(s) left",
            controller.draft_listings().len()
        );
    } else {
        warn!("Payment did not complete: {outcome:?}");
    }

    Ok(())
}
