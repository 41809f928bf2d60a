//! Shipment orchestration flows: carrier selection, idempotence, partial
//! failure recovery, and cancellation side effects.

mod common;

use std::sync::atomic::Ordering;

use common::{harness, order_with_items, MockCarrier};
use uuid::Uuid;

use shipdesk_core::order::{CarrierKind, OrderStatus, PaymentMode, PaymentStatus};
use shipdesk_core::repository::OrderRepository;
use shipdesk_order::{OrchestratorError, TransitionSource};

#[tokio::test]
async fn ship_order_runs_full_sequence() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-3001", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    let outcome = h
        .orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    assert!(!outcome.already_shipped);
    assert_eq!(outcome.carrier, CarrierKind::Shiprocket);
    assert_eq!(outcome.awb, "AWB-SHP-1");

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Shipped);
    assert_eq!(stored.tracking_id.as_deref(), Some("AWB-SHP-1"));
    assert_eq!(stored.courier_name.as_deref(), Some("Mock Express"));
    assert_eq!(stored.shipments.len(), 1);
    assert!(stored.shipments[0].is_live());

    let last = stored.status_history.last().unwrap();
    assert_eq!(last.status, OrderStatus::Shipped);
    let note = last.note.as_deref().unwrap();
    assert!(note.contains("Shiprocket"));
    assert!(note.contains("AWB-SHP-1"));
}

#[tokio::test]
async fn serviceability_failure_leaves_order_retryable() {
    let mut carrier = MockCarrier::new(CarrierKind::Shiprocket);
    carrier.fail_serviceability = true;
    let h = harness(carrier);

    let order = order_with_items("ORD-3002", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    let err = h
        .orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Carrier(_)));

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Processing);
    assert!(stored.shipments.is_empty());
    assert!(!stored
        .status_history
        .iter()
        .any(|e| e.status == OrderStatus::Shipped));
}

#[tokio::test]
async fn second_ship_returns_existing_shipment() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-3003", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    let first = h
        .orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    assert!(second.already_shipped);
    assert_eq!(second.awb, first.awb);
    assert_eq!(h.carrier.created.load(Ordering::SeqCst), 1);

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.shipments.len(), 1);
    assert_eq!(
        stored
            .status_history
            .iter()
            .filter(|e| e.status == OrderStatus::Shipped)
            .count(),
        1
    );
}

#[tokio::test]
async fn generate_awb_is_idempotent_on_the_sub_record() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-3004", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();
    let tracking_before = h
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .unwrap()
        .tracking_id;

    // The sub-record already carries an AWB, so the adapter is not called
    // again and the identifiers come back unchanged.
    let assignment = h
        .orchestrator
        .generate_awb(&order.order_number)
        .await
        .unwrap();
    assert_eq!(Some(assignment.awb_code), tracking_before);
    assert_eq!(h.carrier.awb_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pickup_failure_does_not_roll_back_shipment() {
    let mut carrier = MockCarrier::new(CarrierKind::Shiprocket);
    carrier.fail_pickup = true;
    let h = harness(carrier);

    let order = order_with_items("ORD-3005", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    let outcome = h
        .orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();
    assert_eq!(outcome.awb, "AWB-SHP-1");

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Shipped);
}

#[tokio::test]
async fn pending_online_payment_ships_as_cod() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let mut order = order_with_items("ORD-3006", PaymentMode::Online, vec![(Uuid::new_v4(), 1)]);
    order.payment_status = PaymentStatus::Pending;
    h.orders.create_order(&order).await.unwrap();

    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    assert_eq!(*h.carrier.last_cod.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn confirmed_online_payment_ships_prepaid() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let mut order = order_with_items("ORD-3007", PaymentMode::Online, vec![(Uuid::new_v4(), 1)]);
    order.payment_status = PaymentStatus::Completed;
    h.orders.create_order(&order).await.unwrap();

    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();

    assert_eq!(*h.carrier.last_cod.lock().unwrap(), Some(false));
}

#[tokio::test]
async fn cancellation_restocks_each_item_exactly_once() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));

    let products: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for product in &products {
        h.stock.set_stock(*product, 10).await;
    }
    let order = order_with_items(
        "ORD-3008",
        PaymentMode::Cod,
        products.iter().map(|p| (*p, 2)).collect(),
    );
    h.orders.create_order(&order).await.unwrap();

    let first = h
        .orchestrator
        .cancel_order(&order.order_number, None, TransitionSource::Customer)
        .await
        .unwrap();
    assert!(!first.already_cancelled);
    for product in &products {
        assert_eq!(h.stock.stock_of(*product).await, 12);
    }

    // Retried cancellation is a stock no-op
    let second = h
        .orchestrator
        .cancel_order(&order.order_number, None, TransitionSource::Customer)
        .await
        .unwrap();
    assert!(second.already_cancelled);
    for product in &products {
        assert_eq!(h.stock.stock_of(*product).await, 12);
    }

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(
        stored
            .status_history
            .iter()
            .filter(|e| e.status == OrderStatus::Cancelled)
            .count(),
        1
    );
}

#[tokio::test]
async fn delivered_orders_refuse_cancellation() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let product = Uuid::new_v4();
    h.stock.set_stock(product, 10).await;
    let order = order_with_items("ORD-3009", PaymentMode::Cod, vec![(product, 2)]);
    h.orders.create_order(&order).await.unwrap();

    h.orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();
    h.orchestrator
        .update_status(&order.order_number, OrderStatus::Delivered, None)
        .await
        .unwrap();

    let err = h
        .orchestrator
        .cancel_order(&order.order_number, None, TransitionSource::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Lifecycle(_)));
    assert_eq!(h.stock.stock_of(product).await, 10);

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert!(!stored
        .status_history
        .iter()
        .any(|e| e.status == OrderStatus::Cancelled));
}

#[tokio::test]
async fn manual_entry_bypasses_the_adapters() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-3010", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    h.orchestrator
        .manual_entry(&order.order_number, "BlueDart", "BD123456789")
        .await
        .unwrap();

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Shipped);
    assert_eq!(stored.tracking_id.as_deref(), Some("BD123456789"));
    assert_eq!(stored.courier_name.as_deref(), Some("BlueDart"));
    assert!(stored.shipments.is_empty());
    assert_eq!(h.carrier.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn carrier_waybill_at_creation_skips_awb_step() {
    let mut carrier = MockCarrier::new(CarrierKind::Delhivery);
    carrier.waybill_at_creation = true;
    let h = harness(carrier);

    let order = order_with_items("ORD-3011", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    let outcome = h
        .orchestrator
        .ship_order(&order.order_number, None, None)
        .await
        .unwrap();
    assert_eq!(outcome.awb, "WB-1");
    assert_eq!(h.carrier.awb_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn estimate_does_not_touch_the_order() {
    let h = harness(MockCarrier::new(CarrierKind::Shiprocket));
    let order = order_with_items("ORD-3012", PaymentMode::Cod, vec![(Uuid::new_v4(), 1)]);
    h.orders.create_order(&order).await.unwrap();

    let quotes = h
        .orchestrator
        .estimate(&order.order_number, Some(CarrierKind::Shiprocket))
        .await
        .unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].options.len(), 1);

    let stored = h.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Processing);
    assert!(stored.shipments.is_empty());
}
