use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Processing,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer chose to pay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Online,
    Cod,
    PartialCod,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// The integrated logistics carriers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarrierKind {
    Shiprocket,
    Delhivery,
    Nimbuspost,
}

impl CarrierKind {
    pub const ALL: [CarrierKind; 3] = [
        CarrierKind::Shiprocket,
        CarrierKind::Delhivery,
        CarrierKind::Nimbuspost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierKind::Shiprocket => "Shiprocket",
            CarrierKind::Delhivery => "Delhivery",
            CarrierKind::Nimbuspost => "NimbusPost",
        }
    }

    /// Parse a configuration or query value like "shiprocket" / "SHIPROCKET"
    pub fn parse(value: &str) -> Option<CarrierKind> {
        match value.trim().to_lowercase().as_str() {
            "shiprocket" => Some(CarrierKind::Shiprocket),
            "delhivery" => Some(CarrierKind::Delhivery),
            "nimbuspost" | "nimbus" => Some(CarrierKind::Nimbuspost),
            _ => None,
        }
    }

    /// Best-effort match against a stored courier name (manual entries may
    /// carry arbitrary names, in which case this returns None).
    pub fn from_courier_name(name: &str) -> Option<CarrierKind> {
        let lower = name.to_lowercase();
        if lower.contains("shiprocket") {
            Some(CarrierKind::Shiprocket)
        } else if lower.contains("delhivery") {
            Some(CarrierKind::Delhivery)
        } else if lower.contains("nimbus") {
            Some(CarrierKind::Nimbuspost)
        } else {
            None
        }
    }
}

impl std::fmt::Display for CarrierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only status audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Consignee address used for carrier bookings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// An individual product line within an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub title: String,
    pub variant: Option<String>,
    pub quantity: u32,
    /// Unit price in minor currency units
    pub unit_price: i64,
}

/// Per-carrier shipment sub-record, one per carrier ever attempted.
/// Soft-invalidated via `cancelled_at`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierShipment {
    pub carrier: CarrierKind,
    pub external_shipment_id: Option<String>,
    pub awb: Option<String>,
    pub courier_option_id: Option<String>,
    pub courier_name: Option<String>,
    pub label_url: Option<String>,
    pub manifest_url: Option<String>,
    /// Last raw status string reported by this carrier
    pub raw_status: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CarrierShipment {
    pub fn new(carrier: CarrierKind) -> Self {
        Self {
            carrier,
            external_shipment_id: None,
            awb: None,
            courier_option_id: None,
            courier_name: None,
            label_url: None,
            manifest_url: None,
            raw_status: None,
            cancelled_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.cancelled_at.is_none()
    }
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable identifier, distinct from the storage id
    pub order_number: String,
    pub customer_id: String,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
    pub weight_kg: f64,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    /// Opaque provider correlation ids, one set per gateway
    pub payment_refs: serde_json::Value,
    pub order_status: OrderStatus,
    /// Canonical tracking pair for whichever carrier is currently live
    pub tracking_id: Option<String>,
    pub courier_name: Option<String>,
    pub shipments: Vec<CarrierShipment>,
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_number: String,
        customer_id: String,
        shipping_address: Address,
        items: Vec<OrderItem>,
        weight_kg: f64,
        discount: i64,
        payment_mode: PaymentMode,
    ) -> Self {
        let now = Utc::now();
        let subtotal: i64 = items
            .iter()
            .map(|i| i.unit_price * i.quantity as i64)
            .sum();
        Self {
            id: Uuid::new_v4(),
            order_number,
            customer_id,
            shipping_address,
            items,
            weight_kg,
            subtotal,
            discount,
            total: subtotal - discount,
            payment_mode,
            payment_status: PaymentStatus::Pending,
            payment_refs: serde_json::json!({}),
            order_status: OrderStatus::Processing,
            tracking_id: None,
            courier_name: None,
            shipments: Vec::new(),
            status_history: vec![StatusEntry {
                status: OrderStatus::Processing,
                at: now,
                note: Some("Order placed".to_string()),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// The currently active carrier sub-record, if any
    pub fn live_shipment(&self) -> Option<&CarrierShipment> {
        self.shipments.iter().find(|s| s.is_live())
    }

    pub fn live_shipment_mut(&mut self) -> Option<&mut CarrierShipment> {
        self.shipments.iter_mut().find(|s| s.is_live())
    }

    pub fn shipment_for(&self, carrier: CarrierKind) -> Option<&CarrierShipment> {
        self.shipments.iter().find(|s| s.carrier == carrier)
    }

    pub fn shipment_for_mut(&mut self, carrier: CarrierKind) -> Option<&mut CarrierShipment> {
        self.shipments.iter_mut().find(|s| s.carrier == carrier)
    }

    /// Amount the carrier collects at the doorstep
    pub fn cod_amount(&self) -> i64 {
        match self.payment_mode {
            PaymentMode::Cod => self.total,
            // Partial COD collects the balance after the online portion
            PaymentMode::PartialCod => self.total / 2,
            PaymentMode::Online => 0,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
