use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_REFERENCE_LEN: usize = 100;

/// External identifier of a single payment attempt.
///
/// Accepted characters match what the gateway allows in a transaction reference:
/// ASCII alphanumerics plus `-`, `_`, `.` and `=`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl Reference {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PaymentError::ValidationError(
                "No payment reference provided".to_string(),
            ));
        }
        if raw.len() > MAX_REFERENCE_LEN {
            return Err(PaymentError::ValidationError(format!(
                "Reference must be at most {MAX_REFERENCE_LEN} characters"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '='))
        {
            return Err(PaymentError::ValidationError(format!(
                "Reference contains invalid characters: {raw}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Reference {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.0
    }
}

impl AsRef<str> for Reference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces references of the form `<PREFIX>_<32 hex digits>` from a random `u128`.
#[derive(Debug, Clone)]
pub struct ReferenceGenerator {
    prefix: String,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new("PAY")
    }
}

impl ReferenceGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        let prefix = prefix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(16)
            .collect::<String>()
            .to_ascii_uppercase();
        Self { prefix }
    }

    pub fn generate(&self) -> Reference {
        let token = rand::random::<u128>();
        if self.prefix.is_empty() {
            Reference(format!("{token:032X}"))
        } else {
            Reference(format!("{}_{token:032X}", self.prefix))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reference_parse_trims_and_accepts_gateway_charset() {
        let reference = Reference::parse("  IGATI_20250105-abc.1=  ").unwrap();
        assert_eq!(reference.as_str(), "IGATI_20250105-abc.1=");
    }

    #[test]
    fn test_reference_parse_rejects_blank_and_bad_chars() {
        assert!(matches!(
            Reference::parse("   "),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Reference::parse("ref with spaces"),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Reference::parse(&"x".repeat(101)),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_generated_reference_shape() {
        let generator = ReferenceGenerator::new("igati");
        let reference = generator.generate();
        let (prefix, token) = reference.as_str().split_once('_').unwrap();
        assert_eq!(prefix, "IGATI");
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(Reference::parse(reference.as_str()).is_ok());
    }

    #[test]
    fn test_generated_references_do_not_repeat() {
        let generator = ReferenceGenerator::default();
        let references: HashSet<Reference> = (0..10_000).map(|_| generator.generate()).collect();
        assert_eq!(references.len(), 10_000);
    }

    #[test]
    fn test_reference_serde_is_validated() {
        let ok: Reference = serde_json::from_str("\"R1\"").unwrap();
        assert_eq!(ok.as_str(), "R1");
        assert!(serde_json::from_str::<Reference>("\"\"").is_err());
    }
}
