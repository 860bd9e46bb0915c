use super::{ApiError, AppState};
use crate::application::lifecycle::InitializeRequest;
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::PaymentFilter;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

type ApiResult<T> = Result<T, ApiError>;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn initialize(
    State(lifecycle): State<AppState>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let payment = lifecycle.initialize(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "reference": payment.reference.as_str(),
            "authorization_url": payment.authorization_url,
            "access_code": payment.access_code,
            "payment": payment,
        })),
    ))
}

/// The gateway redirects with both `reference` and `trxref`.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    reference: Option<String>,
    trxref: Option<String>,
}

pub async fn callback(
    State(lifecycle): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let reference = query.reference.or(query.trxref);
    let payment = lifecycle.verify(reference.as_deref()).await?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}

pub async fn verify(
    State(lifecycle): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Json<Value>> {
    let payment = lifecycle.verify(Some(reference.as_str())).await?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}

pub async fn status(
    State(lifecycle): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Json<Value>> {
    let report = lifecycle.status(&reference).await?;
    let mut body = serde_json::to_value(&report).map_err(|e| {
        ApiError(crate::error::PaymentError::InternalError(Box::new(e)))
    })?;
    body["success"] = json!(true);
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    user_id: Option<String>,
    status: Option<String>,
}

pub async fn list(
    State(lifecycle): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let filter = PaymentFilter {
        user_id: query.user_id.filter(|u| !u.trim().is_empty()),
        status: query
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<PaymentStatus>())
            .transpose()?,
    };
    let payments = lifecycle.list(&filter).await?;
    Ok(Json(json!({
        "success": true,
        "count": payments.len(),
        "payments": payments,
    })))
}

pub async fn channels(State(lifecycle): State<AppState>) -> impl IntoResponse {
    Json(json!({ "channels": lifecycle.supported_channels() }))
}
