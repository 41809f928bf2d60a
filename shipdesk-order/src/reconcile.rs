use std::sync::Arc;

use serde::Deserialize;

use shipdesk_core::notify::Notifier;
use shipdesk_core::order::{CarrierKind, OrderStatus};
use shipdesk_core::repository::{OrderRepository, StockRepository};

use crate::lifecycle::{self, apply_transition, TransitionOutcome, TransitionSource};

/// Asynchronous status push from a carrier
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPush {
    pub awb: Option<String>,
    pub current_status: String,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        order_number: String,
        status: OrderStatus,
    },
    /// Repeat of the current status, swallowed without a history append
    Absorbed { order_number: String },
    /// Transition guard refused (e.g. RTO after delivery); still acknowledged
    Rejected {
        order_number: String,
        reason: String,
    },
    UnmappedStatus {
        order_number: String,
        raw: String,
    },
    UnknownOrder,
}

fn shiprocket_status(normalized: &str) -> Option<OrderStatus> {
    match normalized {
        "SHIPPED" | "PICKED UP" | "IN TRANSIT" | "OUT FOR DELIVERY"
        | "REACHED AT DESTINATION HUB" => Some(OrderStatus::Shipped),
        "DELIVERED" => Some(OrderStatus::Delivered),
        "RTO INITIATED" | "RTO DELIVERED" | "CANCELED" | "CANCELLED" => {
            Some(OrderStatus::Cancelled)
        }
        _ => None,
    }
}

fn delhivery_status(normalized: &str) -> Option<OrderStatus> {
    match normalized {
        "MANIFESTED" | "IN TRANSIT" | "DISPATCHED" | "OUT FOR DELIVERY" => {
            Some(OrderStatus::Shipped)
        }
        "DELIVERED" => Some(OrderStatus::Delivered),
        "RTO" | "RTO INITIATED" | "RETURNED" | "CANCELLED" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

fn nimbus_status(normalized: &str) -> Option<OrderStatus> {
    match normalized {
        "BOOKED" | "PICKED UP" | "IN TRANSIT" | "OUT FOR DELIVERY" => {
            Some(OrderStatus::Shipped)
        }
        "DELIVERED" => Some(OrderStatus::Delivered),
        "RTO" | "RTO DELIVERED" | "CANCELLED" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

/// Map a carrier's raw status vocabulary onto the internal lifecycle.
/// With no known carrier (manual entries), every vocabulary is tried.
pub fn map_external_status(kind: Option<CarrierKind>, raw: &str) -> Option<OrderStatus> {
    let normalized = raw.trim().to_uppercase();
    match kind {
        Some(CarrierKind::Shiprocket) => shiprocket_status(&normalized),
        Some(CarrierKind::Delhivery) => delhivery_status(&normalized),
        Some(CarrierKind::Nimbuspost) => nimbus_status(&normalized),
        None => shiprocket_status(&normalized)
            .or_else(|| delhivery_status(&normalized))
            .or_else(|| nimbus_status(&normalized)),
    }
}

/// Applies carrier status pushes to orders through the same transition
/// guard as every other path, idempotently.
pub struct WebhookReconciler {
    orders: Arc<dyn OrderRepository>,
    stock: Arc<dyn StockRepository>,
    notifier: Arc<dyn Notifier>,
}

impl WebhookReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        stock: Arc<dyn StockRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orders,
            stock,
            notifier,
        }
    }

    pub async fn process(
        &self,
        push: &StatusPush,
    ) -> Result<ReconcileOutcome, Box<dyn std::error::Error + Send + Sync>> {
        // Lookup by canonical tracking id first, then by the order number
        // the carrier echoes back.
        let mut found = None;
        if let Some(awb) = push.awb.as_deref().filter(|a| !a.is_empty()) {
            found = self.orders.find_by_tracking_id(awb).await?;
        }
        if found.is_none() {
            if let Some(number) = push.order_id.as_deref().filter(|n| !n.is_empty()) {
                found = self.orders.find_by_order_number(number).await?;
            }
        }
        let Some(mut order) = found else {
            tracing::info!(
                awb = ?push.awb,
                order_id = ?push.order_id,
                "webhook for unknown order acknowledged without action"
            );
            return Ok(ReconcileOutcome::UnknownOrder);
        };

        let kind = order
            .live_shipment()
            .map(|s| s.carrier)
            .or_else(|| {
                order
                    .courier_name
                    .as_deref()
                    .and_then(CarrierKind::from_courier_name)
            });

        if let Some(record) = order.live_shipment_mut() {
            record.raw_status = Some(push.current_status.clone());
        }

        let Some(mapped) = map_external_status(kind, &push.current_status) else {
            tracing::debug!(
                order = %order.order_number,
                status = %push.current_status,
                "unmapped carrier status acknowledged"
            );
            self.orders.save_order(&order).await?;
            return Ok(ReconcileOutcome::UnmappedStatus {
                order_number: order.order_number.clone(),
                raw: push.current_status.clone(),
            });
        };

        let courier = order
            .courier_name
            .clone()
            .or_else(|| kind.map(|k| k.to_string()))
            .unwrap_or_else(|| "carrier".to_string());
        let note = format!("{courier} webhook: {}", push.current_status);

        match apply_transition(
            &mut order,
            mapped,
            Some(note),
            TransitionSource::Webhook,
            false,
        ) {
            Ok(TransitionOutcome::Applied) => {
                if mapped == OrderStatus::Cancelled {
                    lifecycle::restock_items(self.stock.as_ref(), &order).await?;
                }
                self.orders.save_order(&order).await?;
                if let Err(e) = self.notifier.order_status_changed(&order, mapped).await {
                    tracing::warn!(
                        order = %order.order_number,
                        error = %e,
                        "notification dispatch failed"
                    );
                }
                Ok(ReconcileOutcome::Applied {
                    order_number: order.order_number.clone(),
                    status: mapped,
                })
            }
            Ok(TransitionOutcome::Absorbed) => {
                self.orders.save_order(&order).await?;
                Ok(ReconcileOutcome::Absorbed {
                    order_number: order.order_number.clone(),
                })
            }
            Err(e) => {
                tracing::warn!(
                    order = %order.order_number,
                    status = %push.current_status,
                    error = %e,
                    "webhook transition rejected by guard"
                );
                self.orders.save_order(&order).await?;
                Ok(ReconcileOutcome::Rejected {
                    order_number: order.order_number.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
