use crate::domain::reference::Reference;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("You already have a pending payment ({reference})")]
    PendingPaymentExists { reference: Reference },
    #[error("Reference {0} is already in use")]
    DuplicateReference(Reference),
    #[error("Payment {0} not found")]
    NotFound(String),
    #[error("Payment {reference} verification failed: {message}")]
    VerificationFailed { reference: Reference, message: String },
    #[error("Gateway error: {0}")]
    GatewayError(String),
    #[error("Integrity error: {0}")]
    IntegrityError(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
