use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::Value;
use tracing::info;

use super::{AppState, ACTOR_HEADER, ANONYMOUS_ACTOR};
use crate::audit::{AuditEntry, AuditFilter};
use crate::compliance::ComplianceReport;
use crate::error::LedgerError;
use crate::ledger::DiagnosticRecord;

fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_ACTOR)
        .to_string()
}

pub async fn health(State(service): State<AppState>) -> (StatusCode, String) {
    let status = service.health_check().await;
    if status.contains("Status: HEALTHY") {
        (StatusCode::OK, status)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, status)
    }
}

pub async fn submit_record(
    State(service): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DiagnosticRecord>), LedgerError> {
    let actor = actor_from(&headers);
    info!("Submission from {} ({} bytes)", actor, body.len());
    let record = service.submit_record_bytes(&body, &actor).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_records(
    State(service): State<AppState>,
) -> Result<Json<Vec<DiagnosticRecord>>, LedgerError> {
    Ok(Json(service.list_records().await?))
}

pub async fn get_record(
    State(service): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DiagnosticRecord>, LedgerError> {
    service
        .get_record(id)
        .await?
        .map(Json)
        .ok_or(LedgerError::NotFound(id))
}

pub async fn verify_signature(
    State(service): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<Value>, LedgerError> {
    let verified = service.verify_signature(id, &actor_from(&headers)).await?;
    Ok(Json(serde_json::json!({
        "diagnosis_id": id,
        "verified": verified,
    })))
}

pub async fn generate_compliance_report(
    State(service): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<ComplianceReport>, LedgerError> {
    let report = service
        .generate_compliance_report(id, &actor_from(&headers))
        .await?;
    Ok(Json(report))
}

pub async fn audit_trail_for(
    State(service): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<Vec<AuditEntry>>, LedgerError> {
    let trail = service.list_audit_trail_for(id, &actor_from(&headers)).await?;
    Ok(Json(trail))
}

pub async fn audit_trail(
    State(service): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Vec<AuditEntry>>, LedgerError> {
    let entries = if filter == AuditFilter::default() {
        service.list_audit_trail().await?
    } else {
        service.list_audit_trail_filtered(&filter).await?
    };
    Ok(Json(entries))
}
