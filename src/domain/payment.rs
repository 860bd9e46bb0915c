use super::metadata::{Metadata, Precedence, merge_metadata, metadata_from};
use super::reference::Reference;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A positive payment amount in major currency units, kept at 2 decimal places.
///
/// Anything finer than the currency's minor unit is truncated, so the stored amount
/// always equals what the gateway is asked to charge.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        let value = value.round_dp_with_strategy(2, RoundingStrategy::ToZero);
        if value.is_zero() {
            return Err(PaymentError::ValidationError(
                "Amount is below the smallest currency unit".to_string(),
            ));
        }
        let amount = Self(value.normalize());
        amount.to_minor_units()?;
        Ok(amount)
    }

    /// Parses a client-supplied amount: a JSON number or a numeric string.
    pub fn parse(raw: Option<&Value>) -> Result<Self> {
        let text = match raw {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(PaymentError::ValidationError("Invalid amount".to_string()));
            }
        };
        let text =
            text.ok_or_else(|| PaymentError::ValidationError("Amount is required".to_string()))?;

        let value = Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|_| PaymentError::ValidationError("Invalid amount".to_string()))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Integer amount in minor units (major * 100).
    pub fn to_minor_units(&self) -> Result<i64> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.trunc().to_i64())
            .ok_or_else(|| PaymentError::ValidationError("Amount is too large".to_string()))
    }
}

/// Converts a gateway minor-unit integer back to major units.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2).normalize()
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(PaymentError::ValidationError(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

/// Everything needed to open a new pending payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: Reference,
    pub amount: Amount,
    pub currency: String,
    pub user_id: String,
    pub email: String,
    pub phone: Option<String>,
    pub description: String,
    pub authorization_url: Option<String>,
    pub access_code: Option<String>,
    pub metadata: Metadata,
}

/// One payment attempt and its lifecycle state.
///
/// `paid_at` is set if and only if `status` is [`PaymentStatus::Paid`]; the only
/// way to reach that state is [`PaymentRequest::mark_paid`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRequest {
    pub reference: Reference,
    pub amount: Amount,
    pub currency: String,
    pub user_id: String,
    pub email: String,
    pub phone: Option<String>,
    pub description: String,
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub channel: Option<String>,
    pub transaction_id: Option<String>,
    pub authorization_url: Option<String>,
    pub access_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

/// Verification details applied when a payment settles.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub method: String,
    pub channel: String,
    pub paid_at: DateTime<Utc>,
    pub verification_data: Value,
}

impl PaymentRequest {
    pub fn pending(new: NewPayment, created_at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            reference: new.reference,
            amount: new.amount,
            currency: new.currency,
            user_id: new.user_id,
            email: new.email,
            phone: new.phone,
            description: new.description,
            status: PaymentStatus::Pending,
            method: None,
            channel: None,
            transaction_id: None,
            authorization_url: new.authorization_url,
            access_code: new.access_code,
            created_at,
            expires_at: created_at + ttl,
            paid_at: None,
            metadata: new.metadata,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Settles the payment. Returns `Ok(false)` without touching anything when it is
    /// already paid.
    pub fn mark_paid(&mut self, settlement: Settlement) -> Result<bool> {
        match self.status {
            PaymentStatus::Paid => return Ok(false),
            PaymentStatus::Failed => {
                return Err(PaymentError::VerificationFailed {
                    reference: self.reference.clone(),
                    message: "payment was already marked failed".to_string(),
                });
            }
            PaymentStatus::Pending | PaymentStatus::Expired => {}
        }

        self.status = PaymentStatus::Paid;
        self.method = Some(settlement.method);
        self.channel = Some(settlement.channel);
        self.paid_at = Some(settlement.paid_at);
        self.transaction_id = Some(self.reference.to_string());
        merge_metadata(
            &mut self.metadata,
            metadata_from([
                ("verified_at", Value::String(settlement.paid_at.to_rfc3339())),
                ("verification_data", settlement.verification_data),
            ]),
            Precedence::Incoming,
        );
        Ok(true)
    }

    /// Moves a pending payment to failed. Returns whether anything changed.
    pub fn mark_failed(&mut self) -> bool {
        if self.status != PaymentStatus::Pending {
            return false;
        }
        self.status = PaymentStatus::Failed;
        true
    }

    /// Moves a pending payment past its expiry to expired. Returns whether anything changed.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != PaymentStatus::Pending || !self.is_expired(now) {
            return false;
        }
        self.status = PaymentStatus::Expired;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn pending_payment(now: DateTime<Utc>) -> PaymentRequest {
        PaymentRequest::pending(
            NewPayment {
                reference: Reference::parse("R1").unwrap(),
                amount: Amount::new(dec!(1500)).unwrap(),
                currency: "KES".to_string(),
                user_id: "u1".to_string(),
                email: "a@b.com".to_string(),
                phone: None,
                description: String::new(),
                authorization_url: None,
                access_code: None,
                metadata: metadata_from([("initialized_at", json!("t0"))]),
            },
            now,
            TimeDelta::hours(24),
        )
    }

    fn settlement(now: DateTime<Utc>) -> Settlement {
        Settlement {
            method: "paystack".to_string(),
            channel: "card".to_string(),
            paid_at: now,
            verification_data: json!({"status": "success"}),
        }
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(0.004)),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_parse_inputs() {
        assert_eq!(
            Amount::parse(Some(&json!(1500))).unwrap().value(),
            dec!(1500)
        );
        assert_eq!(
            Amount::parse(Some(&json!("1500.00"))).unwrap().value(),
            dec!(1500)
        );
        assert_eq!(
            Amount::parse(Some(&json!(12.349))).unwrap().value(),
            dec!(12.34)
        );

        let required = Amount::parse(None).unwrap_err();
        assert_eq!(required.to_string(), "Validation error: Amount is required");
        assert!(matches!(
            Amount::parse(Some(&json!(""))),
            Err(PaymentError::ValidationError(_))
        ));
        let invalid = Amount::parse(Some(&json!("abc"))).unwrap_err();
        assert_eq!(invalid.to_string(), "Validation error: Invalid amount");
        assert!(Amount::parse(Some(&json!(true))).is_err());
        assert!(Amount::parse(Some(&json!("-5"))).is_err());
    }

    #[test]
    fn test_amount_rejects_values_without_minor_unit_representation() {
        for raw in [json!("1e28"), json!("79228162514264337593543950335"), json!(1e17)] {
            let err = Amount::parse(Some(&raw)).unwrap_err();
            assert_eq!(err.to_string(), "Validation error: Amount is too large");
        }
        assert!(Amount::new(Decimal::MAX).is_err());
        // Largest amount whose minor units still fit in an i64.
        let amount = Amount::new(dec!(92233720368547758.07)).unwrap();
        assert_eq!(amount.to_minor_units().unwrap(), i64::MAX);
    }

    #[test]
    fn test_minor_unit_conversion_truncates() {
        let amount = Amount::new(dec!(1500)).unwrap();
        assert_eq!(amount.to_minor_units().unwrap(), 150_000);
        let amount = Amount::new(dec!(10.999)).unwrap();
        assert_eq!(amount.to_minor_units().unwrap(), 1_099);
        assert_eq!(from_minor_units(150_000), dec!(1500));
        assert_eq!(from_minor_units(1_099), dec!(10.99));
    }

    #[test]
    fn test_status_round_trip_names() {
        assert_eq!("PAID".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert!("refunded".parse::<PaymentStatus>().is_err());
        assert_eq!(
            serde_json::to_value(PaymentStatus::Expired).unwrap(),
            json!("expired")
        );
    }

    #[test]
    fn test_pending_payment_expires_after_ttl() {
        let now = Utc::now();
        let payment = pending_payment(now);
        assert_eq!(payment.expires_at, now + TimeDelta::hours(24));
        assert!(payment.paid_at.is_none());
        assert!(!payment.is_expired(now));
        assert!(payment.is_expired(now + TimeDelta::hours(25)));
    }

    #[test]
    fn test_mark_paid_sets_paid_at_and_merges_metadata() {
        let now = Utc::now();
        let mut payment = pending_payment(now);
        assert!(payment.mark_paid(settlement(now)).unwrap());

        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.paid_at, Some(now));
        assert_eq!(payment.channel.as_deref(), Some("card"));
        assert_eq!(payment.transaction_id.as_deref(), Some("R1"));
        assert_eq!(payment.metadata["initialized_at"], json!("t0"));
        assert_eq!(payment.metadata["verification_data"]["status"], json!("success"));
        assert!(payment.metadata.contains_key("verified_at"));
    }

    #[test]
    fn test_mark_paid_twice_is_a_noop() {
        let now = Utc::now();
        let mut payment = pending_payment(now);
        payment.mark_paid(settlement(now)).unwrap();
        let before = payment.clone();

        let mut later = settlement(now + TimeDelta::minutes(5));
        later.channel = "bank".to_string();
        assert!(!payment.mark_paid(later).unwrap());
        assert_eq!(payment, before);
    }

    #[test]
    fn test_failed_is_terminal() {
        let now = Utc::now();
        let mut payment = pending_payment(now);
        assert!(payment.mark_failed());
        assert!(!payment.mark_failed());
        assert!(matches!(
            payment.mark_paid(settlement(now)),
            Err(PaymentError::VerificationFailed { .. })
        ));
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.paid_at.is_none());
    }

    #[test]
    fn test_mark_expired_only_after_expiry() {
        let now = Utc::now();
        let mut payment = pending_payment(now);
        assert!(!payment.mark_expired(now));
        assert!(payment.mark_expired(now + TimeDelta::hours(30)));
        assert_eq!(payment.status, PaymentStatus::Expired);

        // Late confirmation from the gateway still settles it.
        assert!(payment.mark_paid(settlement(now)).unwrap());
        assert_eq!(payment.status, PaymentStatus::Paid);
    }
}
