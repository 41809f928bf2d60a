use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::order::{Address, CarrierKind, Order};

/// A bookable courier option returned by a serviceability check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierOption {
    /// Carrier-scoped identifier for this courier service
    pub option_id: String,
    pub name: String,
    /// Passthrough carrier pricing, no currency normalization
    pub total_charge: f64,
    pub estimated_days: Option<f64>,
    pub surface: bool,
}

/// Generic order view handed to adapters; each adapter maps this onto its
/// carrier's own field names.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub order_number: String,
    pub consignee: Address,
    pub items: Vec<SnapshotItem>,
    pub weight_kg: f64,
    /// Amount to collect on delivery, minor units; zero for prepaid
    pub cod_amount: i64,
    pub declared_value: i64,
}

#[derive(Debug, Clone)]
pub struct SnapshotItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl OrderSnapshot {
    pub fn from_order(order: &Order, cod_amount: i64) -> Self {
        Self {
            order_number: order.order_number.clone(),
            consignee: order.shipping_address.clone(),
            items: order
                .items
                .iter()
                .map(|i| SnapshotItem {
                    title: i.title.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
            weight_kg: order.weight_kg,
            cod_amount,
            declared_value: order.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub external_shipment_id: String,
    /// Some carriers assign the waybill at creation, others in a later step
    pub waybill: Option<String>,
    pub label_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwbAssignment {
    pub awb_code: String,
    pub courier_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub at: Option<DateTime<Utc>>,
    pub status: String,
    pub location: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub raw_status: String,
    pub events: Vec<TrackingEvent>,
}

/// Label and manifest documents come back as a URL or inline bytes
/// depending on the carrier.
#[derive(Debug, Clone)]
pub enum DocumentRef {
    Url(String),
    Bytes(Vec<u8>),
}

/// Carrier-facing error taxonomy. Adapters translate HTTP error bodies
/// into these; carrier-specific shapes never leak past the trait.
#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("destination pincode {0} is not serviceable")]
    ServiceUnavailable(String),

    #[error("carrier authentication failed: {0}")]
    AuthFailure(String),

    #[error("AWB already assigned for this shipment")]
    AlreadyAssigned,

    #[error("shipment already exists: {0}")]
    AlreadyExists(String),

    #[error("shipment is no longer cancellable")]
    NotCancellable,

    #[error("carrier network error: {0}")]
    Network(String),

    #[error("carrier rejected the request: {0}")]
    Api(String),
}

impl CarrierError {
    /// Transient errors are safe to retry with the same call
    pub fn is_transient(&self) -> bool {
        matches!(self, CarrierError::Network(_))
    }
}

/// Uniform capability set every integrated carrier exposes. Auth, field
/// mapping and response shapes are private to each implementation.
#[async_trait]
pub trait CarrierClient: Send + Sync {
    fn kind(&self) -> CarrierKind;

    /// Quote courier options for a lane. An unserved destination fails with
    /// `ServiceUnavailable`; a served lane with nothing available returns
    /// an empty list.
    async fn check_serviceability(
        &self,
        origin_pincode: &str,
        destination_pincode: &str,
        weight_kg: f64,
        is_cod: bool,
    ) -> Result<Vec<CourierOption>, CarrierError>;

    async fn create_shipment(
        &self,
        snapshot: &OrderSnapshot,
        option: &CourierOption,
    ) -> Result<ShipmentCreated, CarrierError>;

    async fn generate_awb(
        &self,
        external_shipment_id: &str,
        option_id: &str,
    ) -> Result<AwbAssignment, CarrierError>;

    /// Best-effort pickup scheduling; callers tolerate failure
    async fn schedule_pickup(&self, external_shipment_id: &str) -> Result<(), CarrierError>;

    async fn track(&self, tracking_id: &str) -> Result<TrackingInfo, CarrierError>;

    /// Returns whether the carrier accepted the cancellation
    async fn cancel(&self, tracking_id: &str) -> Result<bool, CarrierError>;

    async fn label(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError>;

    async fn manifest(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError>;
}
