#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use shipdesk_api::AppState;
use shipdesk_core::carrier::{
    AwbAssignment, CarrierClient, CarrierError, CourierOption, DocumentRef, OrderSnapshot,
    ShipmentCreated, TrackingInfo,
};
use shipdesk_core::notify::LogNotifier;
use shipdesk_core::order::CarrierKind;
use shipdesk_core::repository::{OrderRepository, StockRepository};
use shipdesk_order::{ShipmentOrchestrator, ShippingSettings, WebhookReconciler};
use shipdesk_store::{MemoryOrderRepository, MemoryStockRepository};

/// Fixed-script carrier used by the router tests.
pub struct ScriptedCarrier {
    pub kind: CarrierKind,
    pub serviceable: bool,
}

#[async_trait]
impl CarrierClient for ScriptedCarrier {
    fn kind(&self) -> CarrierKind {
        self.kind
    }

    async fn check_serviceability(
        &self,
        _origin_pincode: &str,
        destination_pincode: &str,
        _weight_kg: f64,
        _is_cod: bool,
    ) -> Result<Vec<CourierOption>, CarrierError> {
        if !self.serviceable {
            return Err(CarrierError::ServiceUnavailable(
                destination_pincode.to_string(),
            ));
        }
        Ok(vec![CourierOption {
            option_id: "11".to_string(),
            name: "Scripted Surface".to_string(),
            total_charge: 80.0,
            estimated_days: Some(3.0),
            surface: true,
        }])
    }

    async fn create_shipment(
        &self,
        snapshot: &OrderSnapshot,
        _option: &CourierOption,
    ) -> Result<ShipmentCreated, CarrierError> {
        Ok(ShipmentCreated {
            external_shipment_id: format!("SHP-{}", snapshot.order_number),
            waybill: None,
            label_url: None,
        })
    }

    async fn generate_awb(
        &self,
        external_shipment_id: &str,
        _option_id: &str,
    ) -> Result<AwbAssignment, CarrierError> {
        Ok(AwbAssignment {
            awb_code: format!("AWB-{external_shipment_id}"),
            courier_name: "Scripted Express".to_string(),
        })
    }

    async fn schedule_pickup(&self, _external_shipment_id: &str) -> Result<(), CarrierError> {
        Ok(())
    }

    async fn track(&self, _tracking_id: &str) -> Result<TrackingInfo, CarrierError> {
        Ok(TrackingInfo {
            raw_status: "IN TRANSIT".to_string(),
            events: vec![],
        })
    }

    async fn cancel(&self, _tracking_id: &str) -> Result<bool, CarrierError> {
        Ok(true)
    }

    async fn label(&self, _external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        Ok(DocumentRef::Url("https://scripted.example/label.pdf".to_string()))
    }

    async fn manifest(&self, _external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        Ok(DocumentRef::Url(
            "https://scripted.example/manifest.pdf".to_string(),
        ))
    }
}

pub struct TestApp {
    pub orders: Arc<MemoryOrderRepository>,
    pub stock: Arc<MemoryStockRepository>,
    pub state: AppState,
}

pub fn test_app(serviceable: bool) -> TestApp {
    let orders = Arc::new(MemoryOrderRepository::new());
    let stock = Arc::new(MemoryStockRepository::new());

    let mut registry: HashMap<CarrierKind, Arc<dyn CarrierClient>> = HashMap::new();
    registry.insert(
        CarrierKind::Shiprocket,
        Arc::new(ScriptedCarrier {
            kind: CarrierKind::Shiprocket,
            serviceable,
        }),
    );

    let orders_dyn: Arc<dyn OrderRepository> = orders.clone();
    let stock_dyn: Arc<dyn StockRepository> = stock.clone();
    let notifier = Arc::new(LogNotifier);

    let orchestrator = Arc::new(ShipmentOrchestrator::new(
        registry,
        orders_dyn.clone(),
        stock_dyn.clone(),
        notifier.clone(),
        ShippingSettings {
            default_carrier: CarrierKind::Shiprocket,
            auto_select_cheapest: false,
            origin_pincode: "560068".to_string(),
        },
    ));
    let reconciler = Arc::new(WebhookReconciler::new(orders_dyn.clone(), stock_dyn, notifier));

    TestApp {
        orders,
        stock,
        state: AppState {
            orders: orders_dyn,
            orchestrator,
            reconciler,
        },
    }
}

pub fn order_payload(order_number: &str) -> serde_json::Value {
    serde_json::json!({
        "order_number": order_number,
        "customer_id": "cust-9",
        "shipping_address": {
            "name": "Asha Rao",
            "phone": "9876543210",
            "email": "asha@example.com",
            "line1": "14 MG Road",
            "line2": null,
            "city": "Bengaluru",
            "state": "Karnataka",
            "pincode": "560001"
        },
        "items": [{
            "product_id": uuid::Uuid::new_v4(),
            "title": "Ceramic Mug",
            "variant": null,
            "quantity": 2,
            "unit_price": 24900
        }],
        "weight_kg": 0.5,
        "discount": 0,
        "payment_mode": "COD"
    })
}
