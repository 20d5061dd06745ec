//! HTTP binding of the ledger service.

pub mod handlers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::LedgerError;
use crate::ledger::LedgerService;

/// Header carrying the caller identity supplied by the upstream identity provider.
pub const ACTOR_HEADER: &str = "x-ledger-actor";
pub const ANONYMOUS_ACTOR: &str = "anonymous";

pub type AppState = Arc<LedgerService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/diagnoses",
            post(handlers::submit_record).get(handlers::list_records),
        )
        .route("/diagnoses/:id", get(handlers::get_record))
        .route("/diagnoses/:id/verify", post(handlers::verify_signature))
        .route(
            "/diagnoses/:id/compliance-report",
            post(handlers::generate_compliance_report),
        )
        .route("/diagnoses/:id/audit", get(handlers::audit_trail_for))
        .route("/audit", get(handlers::audit_trail))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
        .with_state(service)
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::SigningUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::StorageFailure(_) | LedgerError::ConfigError(_) => {
                error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(serde_json::json!({
                "error": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
