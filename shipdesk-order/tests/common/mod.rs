#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use shipdesk_core::carrier::{
    AwbAssignment, CarrierClient, CarrierError, CourierOption, DocumentRef, OrderSnapshot,
    ShipmentCreated, TrackingInfo,
};
use shipdesk_core::notify::LogNotifier;
use shipdesk_core::order::{Address, CarrierKind, Order, OrderItem, PaymentMode};
use shipdesk_core::repository::{OrderRepository, StockRepository};
use shipdesk_order::{ShipmentOrchestrator, ShippingSettings};
use shipdesk_store::{MemoryOrderRepository, MemoryStockRepository};

/// Scriptable stand-in for a carrier API.
pub struct MockCarrier {
    pub kind: CarrierKind,
    pub fail_serviceability: bool,
    pub fail_pickup: bool,
    pub waybill_at_creation: bool,
    pub options: Vec<CourierOption>,
    pub serviceability_calls: AtomicU32,
    pub created: AtomicU32,
    pub awb_calls: AtomicU32,
    pub last_cod: Mutex<Option<bool>>,
}

impl MockCarrier {
    pub fn new(kind: CarrierKind) -> Self {
        Self {
            kind,
            fail_serviceability: false,
            fail_pickup: false,
            waybill_at_creation: false,
            options: vec![CourierOption {
                option_id: "11".to_string(),
                name: "Mock Express Surface".to_string(),
                total_charge: 72.0,
                estimated_days: Some(3.0),
                surface: true,
            }],
            serviceability_calls: AtomicU32::new(0),
            created: AtomicU32::new(0),
            awb_calls: AtomicU32::new(0),
            last_cod: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CarrierClient for MockCarrier {
    fn kind(&self) -> CarrierKind {
        self.kind
    }

    async fn check_serviceability(
        &self,
        _origin_pincode: &str,
        destination_pincode: &str,
        _weight_kg: f64,
        is_cod: bool,
    ) -> Result<Vec<CourierOption>, CarrierError> {
        self.serviceability_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cod.lock().unwrap() = Some(is_cod);
        if self.fail_serviceability {
            return Err(CarrierError::ServiceUnavailable(
                destination_pincode.to_string(),
            ));
        }
        Ok(self.options.clone())
    }

    async fn create_shipment(
        &self,
        _snapshot: &OrderSnapshot,
        _option: &CourierOption,
    ) -> Result<ShipmentCreated, CarrierError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ShipmentCreated {
            external_shipment_id: format!("SHP-{n}"),
            waybill: self.waybill_at_creation.then(|| format!("WB-{n}")),
            label_url: None,
        })
    }

    async fn generate_awb(
        &self,
        external_shipment_id: &str,
        _option_id: &str,
    ) -> Result<AwbAssignment, CarrierError> {
        if self.awb_calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(CarrierError::AlreadyAssigned);
        }
        Ok(AwbAssignment {
            awb_code: format!("AWB-{external_shipment_id}"),
            courier_name: "Mock Express".to_string(),
        })
    }

    async fn schedule_pickup(&self, _external_shipment_id: &str) -> Result<(), CarrierError> {
        if self.fail_pickup {
            return Err(CarrierError::Api("pickup slot unavailable".to_string()));
        }
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
        Ok(DocumentRef::Url("https://mock.example/label.pdf".to_string()))
    }

    async fn manifest(&self, _external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        Ok(DocumentRef::Url(
            "https://mock.example/manifest.pdf".to_string(),
        ))
    }
}

pub fn address() -> Address {
    Address {
        name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        email: Some("asha@example.com".to_string()),
        line1: "14 MG Road".to_string(),
        line2: None,
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560001".to_string(),
    }
}

pub fn order_with_items(
    order_number: &str,
    payment_mode: PaymentMode,
    items: Vec<(Uuid, u32)>,
) -> Order {
    Order::new(
        order_number.to_string(),
        "cust-1".to_string(),
        address(),
        items
            .into_iter()
            .map(|(product_id, quantity)| OrderItem {
                product_id,
                title: "Ceramic Mug".to_string(),
                variant: None,
                quantity,
                unit_price: 24900,
            })
            .collect(),
        0.5,
        0,
        payment_mode,
    )
}

pub struct Harness {
    pub orders: Arc<MemoryOrderRepository>,
    pub stock: Arc<MemoryStockRepository>,
    pub carrier: Arc<MockCarrier>,
    pub orchestrator: ShipmentOrchestrator,
}

pub fn harness(carrier: MockCarrier) -> Harness {
    let orders = Arc::new(MemoryOrderRepository::new());
    let stock = Arc::new(MemoryStockRepository::new());
    let carrier = Arc::new(carrier);

    let mut registry: HashMap<CarrierKind, Arc<dyn CarrierClient>> = HashMap::new();
    registry.insert(carrier.kind, carrier.clone());

    let orders_dyn: Arc<dyn OrderRepository> = orders.clone();
    let stock_dyn: Arc<dyn StockRepository> = stock.clone();
    let orchestrator = ShipmentOrchestrator::new(
        registry,
        orders_dyn,
        stock_dyn,
        Arc::new(LogNotifier),
        ShippingSettings {
            default_carrier: carrier.kind,
            auto_select_cheapest: false,
            origin_pincode: "560068".to_string(),
        },
    );

    Harness {
        orders,
        stock,
        carrier,
        orchestrator,
    }
}
