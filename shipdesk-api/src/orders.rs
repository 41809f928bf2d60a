use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shipdesk_core::order::{Address, Order, OrderItem, OrderStatus, PaymentMode};
use shipdesk_order::{CancelOutcome, TransitionSource};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_number: String,
    pub customer_id: String,
    pub shipping_address: Address,
    pub items: Vec<CreateOrderItem>,
    pub weight_kg: f64,
    #[serde(default)]
    pub discount: i64,
    pub payment_mode: PaymentMode,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub title: String,
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    pub success: bool,
    pub already_cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Resolve by storage id or human-readable order number.
async fn find_order(state: &AppState, order_ref: &str) -> Result<Order, AppError> {
    let found = if let Ok(id) = Uuid::parse_str(order_ref) {
        state
            .orders
            .get_order(id)
            .await
            .map_err(AppError::internal)?
    } else {
        state
            .orders
            .find_by_order_number(order_ref)
            .await
            .map_err(AppError::internal)?
    };
    found.ok_or_else(|| AppError::NotFound(format!("Order not found: {order_ref}")))
}

/// POST /v1/orders
/// Checkout hand-off: the order lands in Processing and automatic shipment
/// creation is kicked off in the background.
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    if req.items.is_empty() {
        return Err(AppError::Validation("Order has no items".to_string()));
    }
    if req.weight_kg <= 0.0 {
        return Err(AppError::Validation(
            "Order weight must be positive".to_string(),
        ));
    }
    if state
        .orders
        .find_by_order_number(&req.order_number)
        .await
        .map_err(AppError::internal)?
        .is_some()
    {
        return Err(AppError::Conflict {
            message: format!("Order {} already exists", req.order_number),
            suggestion: None,
        });
    }

    let order = Order::new(
        req.order_number,
        req.customer_id,
        req.shipping_address,
        req.items
            .into_iter()
            .map(|i| OrderItem {
                product_id: i.product_id,
                title: i.title,
                variant: i.variant,
                quantity: i.quantity,
                unit_price: i.unit_price,
            })
            .collect(),
        req.weight_kg,
        req.discount,
        req.payment_mode,
    );

    let order_id = state
        .orders
        .create_order(&order)
        .await
        .map_err(AppError::internal)?;

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.auto_create_shipment(order_id).await;
    });

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(find_order(&state, &order_ref).await?))
}

/// GET /v1/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .orders
        .list_orders(query.customer_id.as_deref().unwrap_or(""))
        .await
        .map_err(AppError::internal)?;
    Ok(Json(orders))
}

/// POST /v1/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<CancelOrderResponse>, AppError> {
    let CancelOutcome { already_cancelled } = state
        .orchestrator
        .cancel_order(&order_ref, req.note, TransitionSource::Customer)
        .await?;
    Ok(Json(CancelOrderResponse {
        success: true,
        already_cancelled,
    }))
}

/// POST /v1/admin/orders/:id/status
/// Guarded manual status correction.
pub async fn update_status(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orchestrator
        .update_status(&order_ref, req.status, req.note)
        .await?;
    Ok(Json(order))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/admin/orders/{id}/status", post(update_status))
}
