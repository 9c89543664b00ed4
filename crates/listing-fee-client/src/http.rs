//! REST transport for the marketplace backend.

use async_trait::async_trait;
use listing_fee_types::{
    BankAccount, CreditCard, DraftListing, EWallet, ErrorBody, FeeConfig,
    ListingFeePaymentRequest, ListingStatus, PaymentReceipt,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::transport::{MarketplaceTransport, TransportError};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("listing-fee-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        debug!(status = %response.status(), url = %response.url(), "backend response");
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        decode(response).await
    }
}

#[async_trait(?Send)]
impl MarketplaceTransport for HttpTransport {
    async fn get_my_listings_by_status(
        &self,
        status: ListingStatus,
    ) -> Result<Vec<DraftListing>, TransportError> {
        let request = self
            .client
            .get(self.url("/listings/me"))
            .query(&[("status", status.as_str())]);
        decode(self.send(request).await?).await
    }

    async fn get_listing_fee_config(&self) -> Result<FeeConfig, TransportError> {
        self.get_json("/payments/listing-fee/config").await
    }

    async fn create_listing_fee_payment(
        &self,
        request: ListingFeePaymentRequest,
    ) -> Result<PaymentReceipt, TransportError> {
        let builder = self
            .client
            .post(self.url("/payments/listing-fee"))
            .json(&request);
        let response = self.send(builder).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(PaymentReceipt::default());
        }
        decode(response).await
    }

    async fn get_credit_cards(&self) -> Result<Vec<CreditCard>, TransportError> {
        self.get_json("/credit-cards").await
    }

    async fn get_bank_accounts(&self) -> Result<Vec<BankAccount>, TransportError> {
        self.get_json("/bank-accounts").await
    }

    async fn get_ewallet(&self) -> Result<Option<EWallet>, TransportError> {
        let response = self.send(self.client.get(self.url("/ewallet"))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status, &body))
}

/// Structured `{ code, message }` bodies win over the HTTP status.
fn error_from_body(status: StatusCode, body: &str) -> TransportError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
    match parsed.code {
        Some(code) if !code.is_empty() => TransportError::rejected(code, message),
        _ if status.is_server_error() => TransportError::Unavailable(format!("{status}: {message}")),
        _ => TransportError::rejected(status.as_str(), message),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Unavailable(err.to_string())
    } else {
        TransportError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use listing_fee_types::BackendErrorCode;
    use reqwest::StatusCode;

    use super::{error_from_body, HttpTransport};
    use crate::config::ClientConfig;
    use crate::transport::TransportError;

    #[test]
    fn structured_code_wins_over_status() {
        let err = error_from_body(
            StatusCode::FORBIDDEN,
            r#"{"code":"PAYMENT_VERIFICATION_REQUIRED","message":"Code sent"}"#,
        );
        assert!(err.is_verification_required());
        assert_eq!(err.user_message(), "Code sent");
    }

    #[test]
    fn missing_code_falls_back_to_status() {
        let err = error_from_body(StatusCode::BAD_REQUEST, "not json");
        assert_eq!(
            err,
            TransportError::Rejected {
                code: BackendErrorCode::Other("400".to_string()),
                message: "Bad Request".to_string(),
            }
        );
        assert!(matches!(
            error_from_body(StatusCode::BAD_GATEWAY, ""),
            TransportError::Unavailable(_)
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new(&ClientConfig {
            base_url: "https://api.example.test/v1/".to_string(),
            ..ClientConfig::default()
        })
        .expect("client builds");
        assert_eq!(
            transport.url("/credit-cards"),
            "https://api.example.test/v1/credit-cards"
        );
    }
}
