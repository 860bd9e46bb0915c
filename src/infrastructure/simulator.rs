use crate::domain::gateway::{
    Channel, InitializeTransaction, InitializedTransaction, STATUS_SUCCESS, VerifiedTransaction,
};
use crate::domain::payment::from_minor_units;
use crate::domain::ports::PaymentGateway;
use crate::domain::reference::Reference;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-process gateway that behaves like the Paystack API without any network.
///
/// Every initialized transaction verifies as `success` over `mobile_money` unless
/// another status is scripted with [`SimulatedGateway::set_status`]. Amounts go
/// through the same minor-unit conversion the real gateway uses.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    transactions: Arc<RwLock<HashMap<Reference, SimulatedTransaction>>>,
    failures: Arc<RwLock<Option<String>>>,
    initialize_calls: Arc<AtomicUsize>,
    verify_calls: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
struct SimulatedTransaction {
    email: String,
    amount_minor: i64,
    currency: String,
    status: String,
    channel: String,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the provider-side status `verify` reports for `reference`.
    pub async fn set_status(&self, reference: &Reference, status: &str) {
        if let Some(tx) = self.transactions.write().await.get_mut(reference) {
            tx.status = status.to_string();
        }
    }

    /// Overrides the amount (in minor units) `verify` reports for `reference`.
    pub async fn set_amount_minor(&self, reference: &Reference, amount_minor: i64) {
        if let Some(tx) = self.transactions.write().await.get_mut(reference) {
            tx.amount_minor = amount_minor;
        }
    }

    /// Makes every call fail with `message` until cleared with `None`.
    pub async fn set_failure(&self, message: Option<&str>) {
        *self.failures.write().await = message.map(str::to_string);
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    async fn check_failure(&self) -> Result<()> {
        match self.failures.read().await.as_ref() {
            Some(message) => Err(PaymentError::GatewayError(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &str {
        "paystack"
    }

    async fn initialize(&self, request: &InitializeTransaction) -> Result<InitializedTransaction> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure().await?;

        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&request.reference) {
            return Err(PaymentError::GatewayError("Duplicate Transaction Reference".to_string()));
        }
        transactions.insert(
            request.reference.clone(),
            SimulatedTransaction {
                email: request.email.clone(),
                amount_minor: request.amount.to_minor_units()?,
                currency: request.currency.clone(),
                status: STATUS_SUCCESS.to_string(),
                channel: "mobile_money".to_string(),
            },
        );

        Ok(InitializedTransaction {
            reference: request.reference.clone(),
            authorization_url: format!(
                "https://checkout.paystack.com/simulate/{}",
                request.reference
            ),
            access_code: format!("access_{}", request.reference),
        })
    }

    async fn verify(&self, reference: &Reference) -> Result<VerifiedTransaction> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure().await?;

        let transactions = self.transactions.read().await;
        let tx = transactions
            .get(reference)
            .ok_or_else(|| PaymentError::GatewayError("Transaction not found".to_string()))?;

        let paid_at = (tx.status == STATUS_SUCCESS).then(|| Utc::now().to_rfc3339());
        let data = json!({
            "status": tx.status,
            "reference": reference.as_str(),
            "amount": tx.amount_minor,
            "currency": tx.currency,
            "channel": tx.channel,
            "paid_at": paid_at,
            "customer": { "email": tx.email },
            "simulated": true,
        });

        Ok(VerifiedTransaction {
            status: tx.status.clone(),
            reference: reference.clone(),
            amount: from_minor_units(tx.amount_minor),
            currency: tx.currency.clone(),
            channel: tx.channel.clone(),
            paid_at,
            customer_email: Some(tx.email.clone()),
            data,
        })
    }

    fn supported_channels(&self) -> Vec<Channel> {
        vec![
            Channel::new("M-Pesa", "mobile_money", "Pay with M-Pesa (Simulated)"),
            Channel::new(
                "Airtel Money",
                "mobile_money",
                "Pay with Airtel Money (Simulated)",
            ),
            Channel::new("Credit Card", "card", "Pay with Visa/Mastercard (Simulated)"),
        ]
    }
}
