use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use shipdesk_core::carrier::DocumentRef;
use shipdesk_core::order::CarrierKind;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CarrierQuery {
    pub carrier: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateShipmentRequest {
    pub carrier: Option<String>,
    pub option_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualEntryRequest {
    pub courier_name: String,
    pub tracking_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelShipmentResponse {
    pub success: bool,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    pub url: String,
}

fn parse_carrier(value: &str) -> Result<CarrierKind, AppError> {
    CarrierKind::parse(value)
        .ok_or_else(|| AppError::Validation(format!("Unknown carrier: {value}")))
}

fn parse_carrier_opt(value: Option<&str>) -> Result<Option<CarrierKind>, AppError> {
    value.map(parse_carrier).transpose()
}

fn document_response(document: DocumentRef) -> Response {
    match document {
        DocumentRef::Url(url) => Json(DocumentResponse { success: true, url }).into_response(),
        DocumentRef::Bytes(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/pdf")],
            bytes,
        )
            .into_response(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/orders/:id/shipment/estimate
/// Quote courier options without creating anything.
pub async fn estimate(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
    Query(query): Query<CarrierQuery>,
) -> Result<impl IntoResponse, AppError> {
    let carrier = parse_carrier_opt(query.carrier.as_deref())?;
    let quotes = state.orchestrator.estimate(&order_ref, carrier).await?;
    Ok(Json(serde_json::json!({ "success": true, "quotes": quotes })))
}

/// POST /v1/admin/orders/:id/shipment/create
/// Full create -> AWB -> pickup sequence, or resume of a partial one.
pub async fn create(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
    Json(req): Json<CreateShipmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let carrier = parse_carrier_opt(req.carrier.as_deref())?;
    let outcome = state
        .orchestrator
        .ship_order(&order_ref, carrier, req.option_id.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "shipment": outcome })))
}

/// POST /v1/admin/orders/:id/shipment/generate-awb
pub async fn generate_awb(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let assignment = state.orchestrator.generate_awb(&order_ref).await?;
    Ok(Json(serde_json::json!({ "success": true, "awb": assignment })))
}

/// POST /v1/admin/orders/:id/shipment/pickup
pub async fn schedule_pickup(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.orchestrator.schedule_pickup(&order_ref).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /v1/admin/orders/:id/shipment/cancel
/// Carrier-level cancellation; the order keeps its status.
pub async fn cancel(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<Json<CancelShipmentResponse>, AppError> {
    let cancelled = state.orchestrator.cancel_shipment(&order_ref).await?;
    Ok(Json(CancelShipmentResponse {
        success: true,
        cancelled,
    }))
}

/// GET /v1/admin/orders/:id/shipment/track
pub async fn track(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let info = state.orchestrator.track(&order_ref).await?;
    Ok(Json(serde_json::json!({ "success": true, "tracking": info })))
}

/// GET /v1/admin/orders/:id/shipment/label
pub async fn label(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<Response, AppError> {
    let document = state.orchestrator.label(&order_ref).await?;
    Ok(document_response(document))
}

/// GET /v1/admin/orders/:id/shipment/manifest
pub async fn manifest(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<Response, AppError> {
    let document = state.orchestrator.manifest(&order_ref).await?;
    Ok(document_response(document))
}

/// POST /v1/admin/orders/:id/shipment/manual-entry
/// Hand-typed tracking details for carriers without an integration.
pub async fn manual_entry(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
    Json(req): Json<ManualEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.courier_name.trim().is_empty() || req.tracking_id.trim().is_empty() {
        return Err(AppError::Validation(
            "courier_name and tracking_id are required".to_string(),
        ));
    }
    state
        .orchestrator
        .manual_entry(&order_ref, req.courier_name.trim(), req.tracking_id.trim())
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/orders/{id}/shipment/estimate", get(estimate))
        .route("/v1/admin/orders/{id}/shipment/create", post(create))
        .route(
            "/v1/admin/orders/{id}/shipment/generate-awb",
            post(generate_awb),
        )
        .route("/v1/admin/orders/{id}/shipment/pickup", post(schedule_pickup))
        .route("/v1/admin/orders/{id}/shipment/cancel", post(cancel))
        .route("/v1/admin/orders/{id}/shipment/track", get(track))
        .route("/v1/admin/orders/{id}/shipment/label", get(label))
        .route("/v1/admin/orders/{id}/shipment/manifest", get(manifest))
        .route(
            "/v1/admin/orders/{id}/shipment/manual-entry",
            post(manual_entry),
        )
}
