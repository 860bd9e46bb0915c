use crate::error::PaymentError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

/// HTTP rendering of a [`PaymentError`].
#[derive(Debug)]
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(error: PaymentError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PaymentError::ValidationError(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(PaymentError::ValidationError(rejection.body_text()))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            PaymentError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            PaymentError::PendingPaymentExists { .. } => {
                (StatusCode::CONFLICT, "PENDING_PAYMENT_EXISTS")
            }
            PaymentError::DuplicateReference(_) => (StatusCode::CONFLICT, "DUPLICATE_REFERENCE"),
            PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            PaymentError::VerificationFailed { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "VERIFICATION_FAILED")
            }
            PaymentError::GatewayError(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            PaymentError::IntegrityError(_) => (StatusCode::BAD_GATEWAY, "INTEGRITY_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let mut body = json!({
            "success": false,
            "error": self.0.to_string(),
            "code": code,
        });
        match &self.0 {
            PaymentError::PendingPaymentExists { reference }
            | PaymentError::DuplicateReference(reference)
            | PaymentError::VerificationFailed { reference, .. } => {
                body["reference"] = json!(reference.as_str());
            }
            _ => {}
        }
        if let PaymentError::PendingPaymentExists { .. } = &self.0 {
            body["status"] = json!("pending");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reference::Reference;

    #[test]
    fn test_status_and_code_mapping() {
        let reference = Reference::parse("R1").unwrap();
        let cases = [
            (
                PaymentError::ValidationError("x".to_string()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                PaymentError::PendingPaymentExists {
                    reference: reference.clone(),
                },
                StatusCode::CONFLICT,
                "PENDING_PAYMENT_EXISTS",
            ),
            (
                PaymentError::DuplicateReference(reference.clone()),
                StatusCode::CONFLICT,
                "DUPLICATE_REFERENCE",
            ),
            (
                PaymentError::NotFound("R1".to_string()),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                PaymentError::VerificationFailed {
                    reference,
                    message: "failed".to_string(),
                },
                StatusCode::PAYMENT_REQUIRED,
                "VERIFICATION_FAILED",
            ),
            (
                PaymentError::GatewayError("down".to_string()),
                StatusCode::BAD_GATEWAY,
                "GATEWAY_ERROR",
            ),
            (
                PaymentError::IntegrityError("bad".to_string()),
                StatusCode::BAD_GATEWAY,
                "INTEGRITY_ERROR",
            ),
            (
                PaymentError::InternalError("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (error, status, code) in cases {
            assert_eq!(ApiError(error).status_and_code(), (status, code));
        }
    }
}
