use crate::domain::gateway::{Channel, InitializeTransaction};
use crate::domain::metadata::{Metadata, Precedence, merge_metadata, metadata_from};
use crate::domain::payment::{Amount, NewPayment, PaymentRequest, PaymentStatus, Settlement};
use crate::domain::ports::{InsertOutcome, PaymentFilter, PaymentGatewayBox, PaymentStoreBox};
use crate::domain::reference::{Reference, ReferenceGenerator};
use crate::error::{PaymentError, Result};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Attempts at drawing an unused generated reference before giving up.
const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// Tunables for [`PaymentLifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub currency: String,
    pub callback_url: String,
    pub payment_ttl: TimeDelta,
    pub page_size: usize,
    pub default_user_id: String,
    pub default_email: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            currency: "KES".to_string(),
            callback_url: "http://localhost:8000/payments/callback".to_string(),
            payment_ttl: TimeDelta::hours(24),
            page_size: 50,
            default_user_id: "guest".to_string(),
            default_email: "customer@email.com".to_string(),
        }
    }
}

/// A client's request to start a payment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeRequest {
    /// JSON number or numeric string; validated by [`Amount::parse`].
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, alias = "phone_number")]
    pub phone: Option<String>,
    #[serde(default, alias = "transaction_reference")]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// A payment as reported by a status check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatusReport {
    #[serde(flatten)]
    pub payment: PaymentRequest,
    pub is_expired: bool,
}

/// Orchestrates initialize -> pending -> verify -> paid/failed.
///
/// Owns the record store and the gateway adapter. Each call is a short sequence of
/// awaited steps; all state changes go through the store's atomic operations.
pub struct PaymentLifecycle {
    store: PaymentStoreBox,
    gateway: PaymentGatewayBox,
    references: ReferenceGenerator,
    settings: LifecycleSettings,
}

/// Metadata sent to the gateway. Caller keys never replace `user_id`.
fn gateway_metadata(user_id: &str, caller: Metadata) -> Metadata {
    let mut metadata = metadata_from([("user_id", Value::String(user_id.to_string()))]);
    merge_metadata(&mut metadata, caller, Precedence::Existing);
    metadata
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PaymentLifecycle {
    pub fn new(
        store: PaymentStoreBox,
        gateway: PaymentGatewayBox,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            references: ReferenceGenerator::default(),
            settings,
        }
    }

    pub fn with_reference_generator(mut self, references: ReferenceGenerator) -> Self {
        self.references = references;
        self
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Opens a new pending payment with the gateway and records it.
    ///
    /// Nothing is sent to the gateway when the amount is invalid or the user already
    /// has a live pending payment, and nothing is stored when the gateway fails.
    pub async fn initialize(&self, request: InitializeRequest) -> Result<PaymentRequest> {
        let amount = Amount::parse(request.amount.as_ref())?;
        let user_id =
            non_blank(request.user_id).unwrap_or_else(|| self.settings.default_user_id.clone());
        let email = non_blank(request.email).unwrap_or_else(|| self.settings.default_email.clone());
        let phone = non_blank(request.phone);
        let caller_metadata = request.metadata.unwrap_or_default();

        info!(%user_id, %amount, "Initializing payment");

        let now = Utc::now();
        if let Some(existing) = self.store.find_pending(&user_id).await?
            && !existing.is_expired(now)
        {
            warn!(%user_id, reference = %existing.reference, "Pending payment already exists");
            return Err(PaymentError::PendingPaymentExists {
                reference: existing.reference,
            });
        }

        let reference = self.resolve_reference(request.reference).await?;

        let initialized = self
            .gateway
            .initialize(&InitializeTransaction {
                email: email.clone(),
                amount,
                currency: self.settings.currency.clone(),
                reference: reference.clone(),
                callback_url: self.settings.callback_url.clone(),
                phone: phone.clone(),
                metadata: gateway_metadata(&user_id, caller_metadata.clone()),
            })
            .await
            .inspect_err(|e| warn!(%reference, error = %e, "Gateway initialization failed"))?;

        if initialized.reference != reference {
            debug!(
                requested = %reference,
                returned = %initialized.reference,
                "Gateway assigned a different reference"
            );
        }

        let now = Utc::now();
        let mut metadata = metadata_from([
            ("initialized_at", Value::String(now.to_rfc3339())),
            (
                "callback_url",
                Value::String(self.settings.callback_url.clone()),
            ),
        ]);
        merge_metadata(&mut metadata, caller_metadata, Precedence::Existing);

        let payment = PaymentRequest::pending(
            NewPayment {
                reference: initialized.reference,
                amount,
                currency: self.settings.currency.clone(),
                user_id,
                email,
                phone,
                description: request.description.unwrap_or_default(),
                authorization_url: Some(initialized.authorization_url),
                access_code: Some(initialized.access_code),
                metadata,
            },
            now,
            self.settings.payment_ttl,
        );

        match self.store.insert_pending(payment.clone(), now).await? {
            InsertOutcome::Inserted => {
                info!(reference = %payment.reference, "Payment initialized");
                Ok(payment)
            }
            InsertOutcome::PendingExists(existing) => {
                warn!(
                    user_id = %payment.user_id,
                    reference = %existing.reference,
                    "Lost race against another pending payment"
                );
                Err(PaymentError::PendingPaymentExists {
                    reference: existing.reference,
                })
            }
            InsertOutcome::ReferenceTaken => {
                Err(PaymentError::DuplicateReference(payment.reference))
            }
        }
    }

    async fn resolve_reference(&self, requested: Option<String>) -> Result<Reference> {
        if let Some(raw) = non_blank(requested) {
            let reference = Reference::parse(&raw)?;
            if self.store.exists(&reference).await? {
                return Err(PaymentError::DuplicateReference(reference));
            }
            return Ok(reference);
        }

        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let reference = self.references.generate();
            if !self.store.exists(&reference).await? {
                return Ok(reference);
            }
            warn!(%reference, "Generated reference collided, drawing another");
        }
        Err(PaymentError::InternalError(
            "could not generate an unused payment reference".into(),
        ))
    }

    /// Verifies a payment with the gateway and settles it.
    ///
    /// Safe to call any number of times for the same reference: once a payment is
    /// paid, later calls return it unchanged without contacting the gateway.
    pub async fn verify(&self, reference: Option<&str>) -> Result<PaymentRequest> {
        let raw = reference.map(str::trim).filter(|r| !r.is_empty()).ok_or_else(|| {
            PaymentError::ValidationError("No payment reference provided".to_string())
        })?;
        let reference = Reference::parse(raw)?;

        let mut payment = self.store.get(&reference).await?.ok_or_else(|| {
            warn!(%reference, "Verification requested for unknown payment");
            PaymentError::NotFound(reference.to_string())
        })?;

        match payment.status {
            PaymentStatus::Paid => {
                debug!(%reference, "Payment already settled");
                return Ok(payment);
            }
            PaymentStatus::Failed => {
                return Err(PaymentError::VerificationFailed {
                    reference,
                    message: "payment was already marked failed".to_string(),
                });
            }
            PaymentStatus::Pending | PaymentStatus::Expired => {}
        }

        let verified = self
            .gateway
            .verify(&reference)
            .await
            .inspect_err(|e| warn!(%reference, error = %e, "Gateway verification failed"))?;

        let from = payment.status;
        if !verified.is_success() {
            if payment.mark_failed() && !self.store.transition(payment, from).await? {
                return self.settled_concurrently(reference).await;
            }
            warn!(%reference, provider_status = %verified.status, "Payment not successful");
            return Err(PaymentError::VerificationFailed {
                reference,
                message: format!("gateway reported status '{}'", verified.status),
            });
        }

        if verified.amount != payment.amount.value() || verified.currency != payment.currency {
            warn!(
                %reference,
                expected = %payment.amount,
                expected_currency = %payment.currency,
                verified = %verified.amount,
                verified_currency = %verified.currency,
                "Verified amount differs from recorded amount"
            );
        }

        payment.mark_paid(Settlement {
            method: self.gateway.name().to_string(),
            channel: verified.channel,
            paid_at: Utc::now(),
            verification_data: verified.data,
        })?;

        if self.store.transition(payment.clone(), from).await? {
            info!(%reference, channel = ?payment.channel, "Payment marked as paid");
            return Ok(payment);
        }

        self.settled_concurrently(reference).await
    }

    /// Resolves a lost compare-and-set: another caller moved the record between our
    /// read and write, so report whatever it settled on.
    async fn settled_concurrently(&self, reference: Reference) -> Result<PaymentRequest> {
        match self.store.get(&reference).await? {
            Some(current) if current.status == PaymentStatus::Paid => Ok(current),
            Some(current) => Err(PaymentError::VerificationFailed {
                reference,
                message: format!("payment moved to '{}' concurrently", current.status),
            }),
            None => Err(PaymentError::NotFound(reference.to_string())),
        }
    }

    /// Returns the current record with its expiry flag.
    pub async fn status(&self, reference: &str) -> Result<PaymentStatusReport> {
        let reference = Reference::parse(reference)?;
        let payment = self
            .store
            .get(&reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound(reference.to_string()))?;
        let is_expired = payment.is_expired(Utc::now());
        Ok(PaymentStatusReport {
            payment,
            is_expired,
        })
    }

    /// Lists payments newest first, capped at the configured page size.
    pub async fn list(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRequest>> {
        self.store.list(filter, self.settings.page_size).await
    }

    pub fn supported_channels(&self) -> Vec<Channel> {
        self.gateway.supported_channels()
    }
}
