use axum::{extract::State, routing::post, Json, Router};
use serde_json::json;

use shipdesk_order::reconcile::ReconcileOutcome;
use shipdesk_order::StatusPush;

use crate::state::AppState;

/// POST /v1/webhooks/carrier
/// Receive carrier status pushes. Always acknowledges with 200 so carriers
/// never enter a retry storm; an unknown order is not an error here.
pub async fn handle_carrier_webhook(
    State(state): State<AppState>,
    Json(payload): Json<StatusPush>,
) -> Json<serde_json::Value> {
    tracing::info!(
        awb = ?payload.awb,
        order_id = ?payload.order_id,
        status = %payload.current_status,
        "carrier webhook received"
    );

    let action = match state.reconciler.process(&payload).await {
        Ok(ReconcileOutcome::Applied { status, .. }) => format!("applied:{status}"),
        Ok(ReconcileOutcome::Absorbed { .. }) => "absorbed".to_string(),
        Ok(ReconcileOutcome::Rejected { .. }) => "rejected".to_string(),
        Ok(ReconcileOutcome::UnmappedStatus { .. }) => "unmapped".to_string(),
        Ok(ReconcileOutcome::UnknownOrder) => "unknown_order".to_string(),
        Err(e) => {
            // Application detail is useless to the carrier; log and ack
            tracing::error!(error = %e, "webhook reconciliation failed");
            "error".to_string()
        }
    };

    Json(json!({ "acknowledged": true, "action": action }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/carrier", post(handle_carrier_webhook))
}
