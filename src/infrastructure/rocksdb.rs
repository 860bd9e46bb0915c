use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::domain::ports::{InsertOutcome, PaymentFilter, PaymentStore, sort_newest_first};
use crate::domain::reference::Reference;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment records, keyed by reference.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping a user id to the reference of their pending payment.
pub const CF_PENDING_BY_USER: &str = "pending_by_user";

/// A persistent store implementation using RocksDB.
///
/// Records live in the `payments` column family as JSON. The `pending_by_user`
/// column family is an index that enforces the one-pending-payment-per-user rule;
/// it is updated in the same `WriteBatch` as the record it points to.
///
/// Mutations are serialized through a shared write guard so that the
/// check-then-write sequences in `insert_pending` and `transition` are atomic with
/// respect to each other. `Clone` shares both the `Arc<DB>` and the guard.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

fn internal(message: String) -> PaymentError {
    PaymentError::InternalError(Box::new(std::io::Error::other(message)))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_pending = ColumnFamilyDescriptor::new(CF_PENDING_BY_USER, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments, cf_pending])?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("{name} column family not found")))
    }

    fn encode(payment: &PaymentRequest) -> Result<Vec<u8>> {
        serde_json::to_vec(payment).map_err(|e| internal(format!("Serialization error: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<PaymentRequest> {
        serde_json::from_slice(bytes).map_err(|e| internal(format!("Deserialization error: {e}")))
    }

    fn read(&self, reference: &str) -> Result<Option<PaymentRequest>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, reference.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn pending_reference(&self, user_id: &str) -> Result<Option<String>> {
        let cf = self.cf(CF_PENDING_BY_USER)?;
        match self.db.get_cf(cf, user_id.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| internal(format!("Corrupt pending index entry: {e}"))),
            None => Ok(None),
        }
    }

    /// Stages `payment` plus the matching index change into `batch`.
    fn stage(&self, batch: &mut WriteBatch, payment: &PaymentRequest) -> Result<()> {
        let payments = self.cf(CF_PAYMENTS)?;
        let pending = self.cf(CF_PENDING_BY_USER)?;

        batch.put_cf(payments, payment.reference.as_str(), Self::encode(payment)?);
        if payment.status == PaymentStatus::Pending {
            batch.put_cf(pending, payment.user_id.as_bytes(), payment.reference.as_str());
        } else if self.pending_reference(&payment.user_id)?.as_deref()
            == Some(payment.reference.as_str())
        {
            batch.delete_cf(pending, payment.user_id.as_bytes());
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert_pending(
        &self,
        payment: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let _guard = self.write_guard.lock().await;

        if self.read(payment.reference.as_str())?.is_some() {
            return Ok(InsertOutcome::ReferenceTaken);
        }

        let mut batch = WriteBatch::default();
        if let Some(reference) = self.pending_reference(&payment.user_id)?
            && let Some(mut existing) = self.read(&reference)?
            && existing.status == PaymentStatus::Pending
        {
            if !existing.mark_expired(now) {
                return Ok(InsertOutcome::PendingExists(existing));
            }
            self.stage(&mut batch, &existing)?;
        }

        // Staged after the expiry so the index ends up pointing at the new record.
        self.stage(&mut batch, &payment)?;
        self.db.write(batch)?;
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, reference: &Reference) -> Result<Option<PaymentRequest>> {
        self.read(reference.as_str())
    }

    async fn exists(&self, reference: &Reference) -> Result<bool> {
        let cf = self.cf(CF_PAYMENTS)?;
        // Just check if the key exists without copying the value out
        let result = self.db.get_pinned_cf(cf, reference.as_str())?;
        Ok(result.is_some())
    }

    async fn find_pending(&self, user_id: &str) -> Result<Option<PaymentRequest>> {
        match self.pending_reference(user_id)? {
            Some(reference) => Ok(self
                .read(&reference)?
                .filter(|p| p.status == PaymentStatus::Pending)),
            None => Ok(None),
        }
    }

    async fn transition(&self, payment: PaymentRequest, from: PaymentStatus) -> Result<bool> {
        let _guard = self.write_guard.lock().await;

        match self.read(payment.reference.as_str())? {
            Some(stored) if stored.status == from => {
                let mut batch = WriteBatch::default();
                self.stage(&mut batch, &payment)?;
                self.db.write(batch)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &PaymentFilter, limit: usize) -> Result<Vec<PaymentRequest>> {
        let cf = self.cf(CF_PAYMENTS)?;

        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {e}")))?;
            let payment = Self::decode(&value)?;
            if filter.matches(&payment) {
                payments.push(payment);
            }
        }

        sort_newest_first(&mut payments);
        payments.truncate(limit);
        Ok(payments)
    }
}
