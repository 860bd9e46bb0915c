use super::metadata::Metadata;
use super::payment::Amount;
use super::reference::Reference;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

/// Provider-side transaction status that settles a payment.
pub const STATUS_SUCCESS: &str = "success";

/// Request sent to the gateway to open a checkout.
#[derive(Debug, Clone)]
pub struct InitializeTransaction {
    pub email: String,
    pub amount: Amount,
    pub currency: String,
    pub reference: Reference,
    pub callback_url: String,
    pub phone: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitializedTransaction {
    pub reference: Reference,
    pub authorization_url: String,
    pub access_code: String,
}

/// Outcome of asking the gateway about a transaction.
///
/// `amount` is already converted back to major units. `data` is the provider's
/// payload as received, kept for the payment's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedTransaction {
    pub status: String,
    pub reference: Reference,
    pub amount: Decimal,
    pub currency: String,
    pub channel: String,
    pub paid_at: Option<String>,
    pub customer_email: Option<String>,
    pub data: Value,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub name: String,
    pub code: String,
    pub description: String,
}

impl Channel {
    pub fn new(name: &str, code: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            description: description.to_string(),
        }
    }
}
