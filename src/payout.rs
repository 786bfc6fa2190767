use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phone::NormalizedPhone;

/// A single payout order. The idempotency key is always the recipient's
/// canonical phone number, so one wallet can receive at most one prize no
/// matter how often its owner guesses right or a request is replayed.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub idempotency_key: String,
    pub recipient_name: String,
    pub recipient_mobile: String,
    pub amount: u64,
    pub currency: String,
}

impl PayoutRequest {
    pub fn for_winner(phone: &NormalizedPhone, name: &str, amount: u64, currency: &str) -> Self {
        Self {
            idempotency_key: phone.e164.clone(),
            recipient_name: name.to_string(),
            recipient_mobile: phone.e164.clone(),
            amount,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    Success,
    InsufficientFunds,
    RecipientLimitExceeded,
    IdempotencyConflict,
    OtherProviderError(String),
}

impl PayoutOutcome {
    pub fn user_message(&self) -> String {
        match self {
            PayoutOutcome::Success => "The money is on its way to your wallet.".to_string(),
            PayoutOutcome::InsufficientFunds => {
                "Too slow! The prize pot is already empty.".to_string()
            }
            PayoutOutcome::RecipientLimitExceeded => {
                "Your wallet has reached its receiving limit.".to_string()
            }
            PayoutOutcome::IdempotencyConflict => {
                "A payout for this number is already on record. Contact us to sort it out."
                    .to_string()
            }
            PayoutOutcome::OtherProviderError(code) => {
                format!("The payout didn't go through ({code}).")
            }
        }
    }
}

#[derive(Serialize)]
struct WireBody<'a> {
    currency: &'a str,
    receive_amount: u64,
    name: &'a str,
    mobile: &'a str,
    client_reference: String,
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Clone)]
pub struct PayoutClient {
    http: reqwest::Client,
    base_url: String,
}

impl PayoutClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.to_string() })
    }

    /// Sends exactly one request. Retrying here would be unsafe: a replay the
    /// provider never saw the first attempt of is a second payout, and only
    /// the idempotency key stands between those. Timeouts and transport
    /// failures come back as `OtherProviderError`.
    pub async fn payout(&self, api_key: &str, request: &PayoutRequest) -> PayoutOutcome {
        let body = WireBody {
            currency: &request.currency,
            receive_amount: request.amount,
            name: &request.recipient_name,
            mobile: &request.recipient_mobile,
            client_reference: Uuid::new_v4().to_string(),
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(api_key)
            .header("idempotency-key", &request.idempotency_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(key = %request.idempotency_key, "payout request failed: {e}");
                let code = if e.is_timeout() { "request-timeout" } else { "transport-error" };
                return PayoutOutcome::OtherProviderError(code.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::info!(key = %request.idempotency_key, "payout accepted");
            return PayoutOutcome::Success;
        }

        let bytes = response.bytes().await.unwrap_or_default();
        let error: WireError = serde_json::from_slice(&bytes).unwrap_or_default();
        let outcome = classify(status.as_u16(), error.error_code.as_deref());
        tracing::warn!(key = %request.idempotency_key, status = status.as_u16(), "payout refused: {outcome:?}");
        outcome
    }
}

fn classify(status: u16, error_code: Option<&str>) -> PayoutOutcome {
    match error_code {
        Some("insufficient-funds") => PayoutOutcome::InsufficientFunds,
        Some("recipient-limit-exceeded") => PayoutOutcome::RecipientLimitExceeded,
        Some("idempotency-mismatch") => PayoutOutcome::IdempotencyConflict,
        Some(code) => PayoutOutcome::OtherProviderError(code.to_string()),
        None => PayoutOutcome::OtherProviderError(format!("http-{status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::normalize;

    #[test]
    fn known_error_codes_map_to_variants() {
        assert_eq!(classify(400, Some("insufficient-funds")), PayoutOutcome::InsufficientFunds);
        assert_eq!(
            classify(400, Some("recipient-limit-exceeded")),
            PayoutOutcome::RecipientLimitExceeded
        );
        assert_eq!(classify(409, Some("idempotency-mismatch")), PayoutOutcome::IdempotencyConflict);
    }

    #[test]
    fn unknown_codes_are_passed_through_raw() {
        assert_eq!(
            classify(400, Some("kyc-required")),
            PayoutOutcome::OtherProviderError("kyc-required".to_string())
        );
    }

    #[test]
    fn missing_body_falls_back_to_http_status() {
        assert_eq!(classify(503, None), PayoutOutcome::OtherProviderError("http-503".to_string()));
    }

    #[test]
    fn idempotency_key_depends_only_on_the_phone() {
        let phone = normalize("+221771234567").unwrap();
        let a = PayoutRequest::for_winner(&phone, "Awa", 500, "XOF");
        let b = PayoutRequest::for_winner(&phone, "Moussa", 10_000, "XOF");
        assert_eq!(a.idempotency_key, b.idempotency_key);
        assert_eq!(a.idempotency_key, "+221771234567");
        assert_eq!(a.recipient_mobile, b.recipient_mobile);
    }

    #[tokio::test]
    async fn hung_provider_times_out_as_other_provider_error() {
        // Accept the connection, then say nothing.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _held = socket;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });

        let client =
            PayoutClient::new(&format!("http://{addr}/v1/payout"), Duration::from_millis(200))
                .unwrap();
        let phone = normalize("+221771234567").unwrap();
        let request = PayoutRequest::for_winner(&phone, "Awa", 500, "XOF");

        let outcome = client.payout("key-sn", &request).await;
        assert_eq!(outcome, PayoutOutcome::OtherProviderError("request-timeout".to_string()));
    }

    #[test]
    fn wire_body_uses_the_provider_field_names() {
        let body = WireBody {
            currency: "XOF",
            receive_amount: 500,
            name: "Awa",
            mobile: "+221771234567",
            client_reference: "ref-1".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["currency"], "XOF");
        assert_eq!(json["receive_amount"], 500);
        assert_eq!(json["name"], "Awa");
        assert_eq!(json["mobile"], "+221771234567");
        assert_eq!(json["client_reference"], "ref-1");
    }
}
