//! Demo binary: pay a listing fee against a running marketplace REST backend.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use listing_fee_client::{
    ChallengeOutcome, ClientConfig, HttpTransport, PaymentSubmissionController,
    SubmissionOutcome, SystemClock, TracingSink,
};
use listing_fee_types::{CreditCardId, Iban, ListingId, PaymentMethodSelection};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "http-checkout-demo",
    about = "Pay a listing fee against a running marketplace backend"
)]
struct Cli {
    /// Backend root; falls back to LISTING_FEE_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token; falls back to LISTING_FEE_AUTH_TOKEN.
    #[arg(long)]
    auth_token: Option<String>,

    #[arg(long)]
    request_timeout_ms: Option<u64>,

    #[arg(long)]
    verification_ttl_secs: Option<u64>,

    /// Draft listing to publish.
    #[arg(long)]
    listing: String,

    /// Pay with this saved card.
    #[arg(long, conflicts_with_all = ["iban", "ewallet"])]
    card_id: Option<String>,

    /// Pay by bank transfer from this IBAN.
    #[arg(long, conflicts_with = "ewallet")]
    iban: Option<String>,

    /// Pay from the e-wallet balance.
    #[arg(long)]
    ewallet: bool,
}

impl Cli {
    fn config(&self) -> Result<ClientConfig, Box<dyn std::error::Error>> {
        let mut config = ClientConfig::from_env()?;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(token) = &self.auth_token {
            config.auth_token = Some(token.clone());
        }
        if let Some(timeout) = self.request_timeout_ms {
            config.request_timeout_ms = timeout;
        }
        if let Some(ttl) = self.verification_ttl_secs {
            config.verification_ttl_secs = ttl;
        }
        config.validate()?;
        Ok(config)
    }

    fn selection(&self) -> Result<PaymentMethodSelection, Box<dyn std::error::Error>> {
        if let Some(card_id) = &self.card_id {
            return Ok(PaymentMethodSelection::credit_card(CreditCardId::new(
                card_id.as_str(),
            )?));
        }
        if let Some(iban) = &self.iban {
            return Ok(PaymentMethodSelection::transfer(Iban::new(iban)?));
        }
        if self.ewallet {
            return Ok(PaymentMethodSelection::EWallet);
        }
        Err("choose one of --card-id, --iban, --ewallet".into())
    }
}

/// The modal stays in Verify after each of these.
fn awaiting_code(outcome: &SubmissionOutcome) -> bool {
    matches!(
        outcome,
        SubmissionOutcome::Completed(
            ChallengeOutcome::VerificationRequired { .. }
                | ChallengeOutcome::CodeRejected { .. }
                | ChallengeOutcome::CodeResent { .. }
                | ChallengeOutcome::ResendFailed { .. }
        )
    )
}

fn prompt_code() -> io::Result<String> {
    print!("Verification code: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
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
    let config = cli.config()?;
    let selection = cli.selection()?;
    let listing = ListingId::new(cli.listing.as_str())?;

    info!(base_url = %config.base_url, "connecting to marketplace backend");
    let transport = HttpTransport::new(&config)?;
    let controller =
        PaymentSubmissionController::new(transport, TracingSink, Arc::new(SystemClock), config);

    controller.enter().await?;
    controller.select_listing(&listing)?;
    controller.select_payment_method(selection)?;
    controller.set_agreements_accepted(true);
    controller.open_confirmation().await?;

    let mut outcome = controller.confirm().await?;
    while awaiting_code(&outcome) {
        let typed = controller.enter_code(&prompt_code()?)?;
        outcome = if typed.is_complete() {
            controller.submit_code().await?
        } else {
            warn!("code needs six digits; requesting a new one");
            controller.resend_code().await?
        };
    }

    if outcome.is_success() {
        info!(%listing, "listing fee paid");
    } else {
        warn!("payment did not complete: {outcome:?}");
    }
    Ok(())
}
