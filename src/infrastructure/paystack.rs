use crate::domain::gateway::{
    Channel, InitializeTransaction, InitializedTransaction, VerifiedTransaction,
};
use crate::domain::metadata::{Metadata, Precedence, merge_metadata};
use crate::domain::payment::from_minor_units;
use crate::domain::ports::PaymentGateway;
use crate::domain::reference::Reference;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

/// Channels offered to the payer when a phone number is supplied.
const PHONE_CHANNELS: [&str; 4] = ["mobile_money", "card", "bank_transfer", "ussd"];

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    /// Per-request timeout. A timeout is reported as a gateway error.
    pub timeout: Duration,
    /// Extra attempts for `verify` after a transient failure.
    pub verify_retries: u32,
    /// Delay before the first retry; doubled on every further attempt.
    pub retry_backoff: Duration,
    /// Added to transaction metadata as `business_name` when set.
    pub business_name: Option<String>,
}

impl PaystackConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            verify_retries: 2,
            retry_backoff: Duration::from_millis(200),
            business_name: None,
        }
    }
}

/// Gateway adapter for the Paystack transaction API.
#[derive(Clone)]
pub struct PaystackGateway {
    config: PaystackConfig,
    client: reqwest::Client,
}

/// Paystack wraps every response in `{status, message, data}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    callback_url: &'a str,
    metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<Vec<&'static str>>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    customer: Option<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    #[serde(default)]
    email: Option<String>,
}

/// Why a single HTTP exchange failed, and whether trying again could help.
enum Attempt {
    Transient(String),
    Fatal(PaymentError),
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn transaction_metadata(&self, request: &InitializeTransaction) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(business_name) = &self.config.business_name {
            metadata.insert(
                "business_name".to_string(),
                Value::String(business_name.clone()),
            );
        }
        if let Some(phone) = non_blank(request.phone.as_deref()) {
            metadata.insert("phone_number".to_string(), Value::String(phone.to_string()));
        }
        merge_metadata(&mut metadata, request.metadata.clone(), Precedence::Existing);
        metadata
    }

    /// Sends a request and unwraps the `{status, message, data}` envelope.
    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<Value, Attempt> {
        let response = request
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    Attempt::Transient(format!("Network error: {e}"))
                } else {
                    Attempt::Fatal(PaymentError::GatewayError(format!("Network error: {e}")))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Transient(format!("Failed to read response: {e}")))?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if status.is_server_error() => {
                return Err(Attempt::Transient(format!("Gateway returned {status}")));
            }
            Err(e) => {
                return Err(Attempt::Fatal(PaymentError::IntegrityError(format!(
                    "Malformed gateway response ({status}): {e}"
                ))));
            }
        };

        if !envelope.status {
            let message = envelope
                .message
                .unwrap_or_else(|| "Gateway rejected the request".to_string());
            if status.is_server_error() {
                return Err(Attempt::Transient(message));
            }
            return Err(Attempt::Fatal(PaymentError::GatewayError(message)));
        }

        match envelope.data {
            Some(data @ Value::Object(_)) => Ok(data),
            _ => Err(Attempt::Fatal(PaymentError::IntegrityError(
                "Gateway response has no data object".to_string(),
            ))),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn provider_reference(raw: &str) -> Result<Reference> {
    Reference::parse(raw).map_err(|_| {
        PaymentError::IntegrityError(format!("Gateway returned an invalid reference: {raw:?}"))
    })
}

fn into_error(attempt: Attempt) -> PaymentError {
    match attempt {
        Attempt::Transient(message) => PaymentError::GatewayError(message),
        Attempt::Fatal(error) => error,
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn name(&self) -> &str {
        "paystack"
    }

    async fn initialize(&self, request: &InitializeTransaction) -> Result<InitializedTransaction> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount.to_minor_units()?,
            currency: &request.currency,
            reference: request.reference.as_str(),
            callback_url: &request.callback_url,
            metadata: self.transaction_metadata(request),
            channels: non_blank(request.phone.as_deref()).map(|_| PHONE_CHANNELS.to_vec()),
        };

        debug!(
            reference = %request.reference,
            amount = body.amount,
            "Initializing Paystack transaction"
        );
        let data = self
            .exchange(self.client.post(self.url("/transaction/initialize")).json(&body))
            .await
            .map_err(into_error)?;

        let data: InitializeData = serde_json::from_value(data).map_err(|e| {
            PaymentError::IntegrityError(format!("Unexpected initialize payload: {e}"))
        })?;

        Ok(InitializedTransaction {
            reference: provider_reference(&data.reference)?,
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    async fn verify(&self, reference: &Reference) -> Result<VerifiedTransaction> {
        let url = self.url(&format!("/transaction/verify/{reference}"));
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0;

        let data = loop {
            match self.exchange(self.client.get(&url)).await {
                Ok(data) => break data,
                Err(Attempt::Transient(message)) if attempt < self.config.verify_retries => {
                    attempt += 1;
                    warn!(%reference, attempt, %message, "Transient verify failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(other) => return Err(into_error(other)),
            }
        };

        let parsed: VerifyData = serde_json::from_value(data.clone()).map_err(|e| {
            PaymentError::IntegrityError(format!("Unexpected verify payload: {e}"))
        })?;

        Ok(VerifiedTransaction {
            status: parsed.status,
            reference: provider_reference(&parsed.reference)?,
            amount: from_minor_units(parsed.amount),
            currency: parsed.currency,
            channel: parsed.channel.unwrap_or_else(|| "unknown".to_string()),
            paid_at: parsed.paid_at,
            customer_email: parsed.customer.and_then(|c| c.email),
            data,
        })
    }

    fn supported_channels(&self) -> Vec<Channel> {
        vec![
            Channel::new("M-Pesa", "mobile_money", "Pay with M-Pesa"),
            Channel::new("Airtel Money", "mobile_money", "Pay with Airtel Money"),
            Channel::new("Credit Card", "card", "Pay with Visa/Mastercard"),
            Channel::new("Bank Transfer", "bank_transfer", "Pay via bank transfer"),
            Channel::new("USSD", "ussd", "Pay with USSD code"),
        ]
    }
}
