use super::gateway::{Channel, InitializeTransaction, InitializedTransaction, VerifiedTransaction};
use super::payment::{PaymentRequest, PaymentStatus};
use super::reference::Reference;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of an atomic conditional insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// The user already has a live pending payment; nothing was written.
    PendingExists(PaymentRequest),
    /// Another record already uses this reference; nothing was written.
    ReferenceTaken,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub user_id: Option<String>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &PaymentRequest) -> bool {
        self.user_id
            .as_deref()
            .is_none_or(|user_id| payment.user_id == user_id)
            && self.status.is_none_or(|status| payment.status == status)
    }
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts `payment` unless its user already has a pending payment that has not
    /// expired at `now`, or its reference is taken. A pending payment that has expired
    /// is moved to `expired` as part of the same operation.
    async fn insert_pending(
        &self,
        payment: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome>;
    async fn get(&self, reference: &Reference) -> Result<Option<PaymentRequest>>;
    async fn exists(&self, reference: &Reference) -> Result<bool>;
    async fn find_pending(&self, user_id: &str) -> Result<Option<PaymentRequest>>;
    /// Replaces the stored record only if its status is still `from`.
    async fn transition(&self, payment: PaymentRequest, from: PaymentStatus) -> Result<bool>;
    /// Newest first, at most `limit` records.
    async fn list(&self, filter: &PaymentFilter, limit: usize) -> Result<Vec<PaymentRequest>>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Identifier recorded as the payment method.
    fn name(&self) -> &str;
    async fn initialize(&self, request: &InitializeTransaction) -> Result<InitializedTransaction>;
    async fn verify(&self, reference: &Reference) -> Result<VerifiedTransaction>;
    fn supported_channels(&self) -> Vec<Channel>;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;

/// Newest first; ties broken by reference so the order is stable.
pub fn sort_newest_first(payments: &mut [PaymentRequest]) {
    payments.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.reference.cmp(&b.reference))
    });
}
