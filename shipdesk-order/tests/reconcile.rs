//! Webhook reconciliation: vocabulary mapping, idempotent application, and
//! guard interaction with admin-driven changes.

mod common;

use std::sync::Arc;

use common::{harness, order_with_items, MockCarrier};
use uuid::Uuid;

use shipdesk_core::notify::LogNotifier;
use shipdesk_core::order::{CarrierKind, OrderStatus, PaymentMode};
use shipdesk_core::repository::{OrderRepository, StockRepository};
use shipdesk_order::reconcile::ReconcileOutcome;
use shipdesk_order::{StatusPush, WebhookReconciler};

fn reconciler(h: &common::Harness) -> WebhookReconciler {
    let orders: Arc<dyn OrderRepository> = h.orders.clone();
    let stock: Arc<dyn StockRepository> = h.stock.clone();
    WebhookReconciler::new(orders, stock, Arc::new(LogNotifier))
}

fn push(awb: &str, status: &str, order_number: &str) -> StatusPush {
    StatusPush {
        awb: Some(awb.to_string()),
        current_status: status.to_string(),
        order_id: Some(order_number.to_string()),
    }
}

#[tokio::test]
async fn delivered_push_transitions_a_shipped_order() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-4001", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();
    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    let reconciler = reconciler(&h);
    let payload = push("AWB-SHP-1", "DELIVERED", &order.order_number);

    let outcome = reconciler.process(&payload).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Applied {
            order_number: order.order_number.clone(),
            status: OrderStatus::Delivered,
        }
    );

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Delivered);
    let note = stored.status_history.last().unwrap().note.clone().unwrap();
    assert!(note.contains("Mock Express"));
    assert!(note.contains("DELIVERED"));

    // Carriers resend events; the repeat must not append history
    let history_len = stored.status_history.len();
    let outcome = reconciler.process(&payload).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Absorbed {
            order_number: order.order_number.clone(),
        }
    );
    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status_history.len(), history_len);
}

#[tokio::test]
async fn unknown_order_is_acknowledged_without_action() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let reconciler = reconciler(&h);

    let outcome = reconciler
        .process(&push("AWB-NOPE", "DELIVERED", "ORD-MISSING"))
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::UnknownOrder);
}

#[tokio::test]
async fn rto_push_cancels_and_restocks() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let product = Uuid::new_v4();
    h.stock.set_stock(product, 10).await;
    let order = order_with_items("ORD-4002", PaymentMode::Cod, vec![(product, 2)]);
    h.orders.create_order(&order).await.unwrap();
    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    let reconciler = reconciler(&h);
    let payload = push("AWB-SHP-1", "RTO INITIATED", &order.order_number);

    let outcome = reconciler.process(&payload).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));
    assert_eq!(h.stock.stock_of(product).await, 12);

    // A resent RTO event is absorbed and does not restock again
    let outcome = reconciler.process(&payload).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Absorbed { .. }));
    assert_eq!(h.stock.stock_of(product).await, 12);
}

#[tokio::test]
async fn rto_after_delivery_is_rejected_by_the_guard() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-4003", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();
    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    let reconciler = reconciler(&h);
    reconciler
        .process(&push("AWB-SHP-1", "DELIVERED", &order.order_number))
        .await
        .unwrap();

    let outcome = reconciler
        .process(&push("AWB-SHP-1", "RTO INITIATED", &order.order_number))
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Rejected { .. }));

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Delivered);
    assert!(!stored
        .status_history
        .iter()
        .any(|e| e.status == OrderStatus::Cancelled));
}

#[tokio::test]
async fn unmapped_status_only_updates_the_raw_audit_field() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-4004", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();
    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    let reconciler = reconciler(&h);
    let outcome = reconciler
        .process(&push("AWB-SHP-1", "OUT FOR PICKUP", &order.order_number))
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::UnmappedStatus { .. }));

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Shipped);
    assert_eq!(
        stored.shipments[0].raw_status.as_deref(),
        Some("OUT FOR PICKUP")
    );
}

#[tokio::test]
async fn lookup_falls_back_to_order_number() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-4005", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();
    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    let reconciler = reconciler(&h);
    let payload = StatusPush {
        awb: None,
        current_status: "DELIVERED".to_string(),
        order_id: Some(order.order_number.clone()),
    };

    let outcome = reconciler.process(&payload).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));
}

#[tokio::test]
async fn manual_entry_orders_reconcile_via_the_generic_vocabulary() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-4006", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();
    h.orchestrator
        .manual_entry(&order.order_number, "BlueDart", "BD42")
        .await
        .unwrap();

    let reconciler = reconciler(&h);
    let outcome = reconciler
        .process(&push("BD42", "DELIVERED", &order.order_number))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Applied {
            order_number: order.order_number.clone(),
            status: OrderStatus::Delivered,
        }
    );
}
