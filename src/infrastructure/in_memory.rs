use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::domain::ports::{InsertOutcome, PaymentFilter, PaymentStore, sort_newest_first};
use crate::domain::reference::Reference;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for payment requests.
///
/// Uses `Arc<RwLock<HashMap<Reference, PaymentRequest>>>`; every mutation runs under
/// the write lock, which is what makes `insert_pending` and `transition` atomic.
/// Cloning shares the same map.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<Reference, PaymentRequest>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a record as-is, bypassing lifecycle checks.
    pub async fn put(&self, payment: PaymentRequest) {
        let mut payments = self.payments.write().await;
        payments.insert(payment.reference.clone(), payment);
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_pending(
        &self,
        payment: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let mut payments = self.payments.write().await;

        if payments.contains_key(&payment.reference) {
            return Ok(InsertOutcome::ReferenceTaken);
        }

        if let Some(existing) = payments
            .values_mut()
            .find(|p| p.user_id == payment.user_id && p.status == PaymentStatus::Pending)
            && !existing.mark_expired(now)
        {
            return Ok(InsertOutcome::PendingExists(existing.clone()));
        }

        payments.insert(payment.reference.clone(), payment);
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, reference: &Reference) -> Result<Option<PaymentRequest>> {
        let payments = self.payments.read().await;
        Ok(payments.get(reference).cloned())
    }

    async fn exists(&self, reference: &Reference) -> Result<bool> {
        let payments = self.payments.read().await;
        Ok(payments.contains_key(reference))
    }

    async fn find_pending(&self, user_id: &str) -> Result<Option<PaymentRequest>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| p.user_id == user_id && p.status == PaymentStatus::Pending)
            .cloned())
    }

    async fn transition(&self, payment: PaymentRequest, from: PaymentStatus) -> Result<bool> {
        let mut payments = self.payments.write().await;
        match payments.get_mut(&payment.reference) {
            Some(stored) if stored.status == from => {
                *stored = payment;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &PaymentFilter, limit: usize) -> Result<Vec<PaymentRequest>> {
        let payments = self.payments.read().await;
        let mut matching: Vec<PaymentRequest> = payments
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        matching.truncate(limit);
        Ok(matching)
    }
}
