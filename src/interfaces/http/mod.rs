//! JSON API over the payment lifecycle.

mod error;
mod handlers;

pub use error::ApiError;

use crate::application::lifecycle::PaymentLifecycle;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

pub type AppState = Arc<PaymentLifecycle>;

pub fn router(lifecycle: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/initialize", post(handlers::initialize))
        .route("/payments/callback", get(handlers::callback))
        .route("/payments/verify/:reference", post(handlers::verify))
        .route("/payments/status/:reference", get(handlers::status))
        .route("/payments/list", get(handlers::list))
        .route("/payments/channels", get(handlers::channels))
        .with_state(lifecycle)
}
