use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use shipdesk_core::carrier::{
    AwbAssignment, CarrierClient, CarrierError, CourierOption, DocumentRef, OrderSnapshot,
    ShipmentCreated, TrackingInfo,
};
use shipdesk_core::notify::Notifier;
use shipdesk_core::order::{
    CarrierKind, CarrierShipment, Order, OrderStatus, PaymentMode, PaymentStatus,
};
use shipdesk_core::repository::{OrderRepository, StockRepository};

use crate::lifecycle::{self, apply_transition, LifecycleError, TransitionSource};

#[derive(Debug, Clone)]
pub struct ShippingSettings {
    pub default_carrier: CarrierKind,
    pub auto_select_cheapest: bool,
    pub origin_pincode: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("carrier {0} is not configured")]
    CarrierNotConfigured(CarrierKind),

    #[error("order has no live shipment")]
    NoLiveShipment,

    #[error("shipment has not been created with the carrier yet")]
    ShipmentNotCreated,

    #[error("no courier options available for this lane")]
    NoCourierOptions,

    #[error(transparent)]
    Carrier(#[from] CarrierError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl OrchestratorError {
    fn storage(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Storage(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CarrierQuote {
    pub carrier: CarrierKind,
    pub options: Vec<CourierOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipOutcome {
    pub carrier: CarrierKind,
    pub courier_name: String,
    pub awb: String,
    /// True when a previous successful run's result was returned as-is
    pub already_shipped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub already_cancelled: bool,
}

/// Carrier-facing payment view: (collect on delivery, COD amount, fallback).
/// An online order whose payment never confirmed ships as COD; callers log
/// the fallback since such an order should not normally exist.
fn carrier_payment(order: &Order) -> (bool, i64, bool) {
    match (order.payment_mode, order.payment_status) {
        (PaymentMode::Online, PaymentStatus::Pending) => (true, order.total, true),
        (PaymentMode::Online, _) => (false, 0, false),
        (PaymentMode::Cod, _) | (PaymentMode::PartialCod, _) => {
            (true, order.cod_amount(), false)
        }
    }
}

/// One sub-record per carrier ever attempted; a re-attempt on the same
/// carrier revives its existing record.
fn upsert_shipment(order: &mut Order, kind: CarrierKind) -> usize {
    match order.shipments.iter().position(|s| s.carrier == kind) {
        Some(idx) => idx,
        None => {
            order.shipments.push(CarrierShipment::new(kind));
            order.shipments.len() - 1
        }
    }
}

/// Decides which carrier ships an order, drives the create → AWB → pickup
/// sequence, and writes the results back onto the order.
pub struct ShipmentOrchestrator {
    carriers: HashMap<CarrierKind, Arc<dyn CarrierClient>>,
    orders: Arc<dyn OrderRepository>,
    stock: Arc<dyn StockRepository>,
    notifier: Arc<dyn Notifier>,
    settings: ShippingSettings,
}

impl ShipmentOrchestrator {
    pub fn new(
        carriers: HashMap<CarrierKind, Arc<dyn CarrierClient>>,
        orders: Arc<dyn OrderRepository>,
        stock: Arc<dyn StockRepository>,
        notifier: Arc<dyn Notifier>,
        settings: ShippingSettings,
    ) -> Self {
        Self {
            carriers,
            orders,
            stock,
            notifier,
            settings,
        }
    }

    fn client(
        &self,
        kind: CarrierKind,
    ) -> Result<&Arc<dyn CarrierClient>, OrchestratorError> {
        self.carriers
            .get(&kind)
            .ok_or(OrchestratorError::CarrierNotConfigured(kind))
    }

    /// Resolve an order by storage id or human-readable order number.
    async fn load(&self, order_ref: &str) -> Result<Order, OrchestratorError> {
        let found = if let Ok(id) = Uuid::parse_str(order_ref) {
            self.orders
                .get_order(id)
                .await
                .map_err(OrchestratorError::storage)?
        } else {
            self.orders
                .find_by_order_number(order_ref)
                .await
                .map_err(OrchestratorError::storage)?
        };
        found.ok_or_else(|| OrchestratorError::OrderNotFound(order_ref.to_string()))
    }

    async fn save(&self, order: &Order) -> Result<(), OrchestratorError> {
        self.orders
            .save_order(order)
            .await
            .map_err(OrchestratorError::storage)
    }

    async fn notify(&self, order: &Order, status: OrderStatus) {
        if let Err(e) = self.notifier.order_status_changed(order, status).await {
            tracing::warn!(
                order = %order.order_number,
                error = %e,
                "notification dispatch failed"
            );
        }
    }

    /// Quote serviceable courier options. With no carrier given, quotes
    /// every configured carrier so staff can compare.
    pub async fn estimate(
        &self,
        order_ref: &str,
        carrier: Option<CarrierKind>,
    ) -> Result<Vec<CarrierQuote>, OrchestratorError> {
        let order = self.load(order_ref).await?;
        let (is_cod, _, _) = carrier_payment(&order);

        let kinds = match carrier {
            Some(kind) => {
                self.client(kind)?;
                vec![kind]
            }
            None => CarrierKind::ALL.to_vec(),
        };

        let mut quotes = Vec::new();
        let mut first_err = None;
        for kind in kinds {
            let Some(client) = self.carriers.get(&kind) else {
                tracing::debug!(carrier = %kind, "carrier not configured, skipped");
                continue;
            };
            match client
                .check_serviceability(
                    &self.settings.origin_pincode,
                    &order.shipping_address.pincode,
                    order.weight_kg,
                    is_cod,
                )
                .await
            {
                Ok(options) => quotes.push(CarrierQuote {
                    carrier: kind,
                    options,
                }),
                Err(e) => {
                    tracing::warn!(carrier = %kind, error = %e, "serviceability check failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        if quotes.is_empty() {
            return Err(match first_err {
                Some(e) => OrchestratorError::Carrier(e),
                None => OrchestratorError::NoCourierOptions,
            });
        }
        Ok(quotes)
    }

    async fn pick_option(
        &self,
        order: &Order,
        carrier: Option<CarrierKind>,
        option_id: Option<&str>,
        is_cod: bool,
    ) -> Result<(CarrierKind, CourierOption), OrchestratorError> {
        let kinds = match carrier {
            Some(kind) => {
                self.client(kind)?;
                vec![kind]
            }
            None if self.settings.auto_select_cheapest => CarrierKind::ALL.to_vec(),
            None => {
                self.client(self.settings.default_carrier)?;
                vec![self.settings.default_carrier]
            }
        };

        let mut candidates = Vec::new();
        let mut first_err = None;
        for kind in kinds {
            let Some(client) = self.carriers.get(&kind) else {
                tracing::debug!(carrier = %kind, "carrier not configured, skipped");
                continue;
            };
            match client
                .check_serviceability(
                    &self.settings.origin_pincode,
                    &order.shipping_address.pincode,
                    order.weight_kg,
                    is_cod,
                )
                .await
            {
                Ok(options) => candidates.extend(
                    options
                        .into_iter()
                        .filter(|o| o.surface)
                        .map(|o| (kind, o)),
                ),
                Err(e) => {
                    tracing::warn!(carrier = %kind, error = %e, "serviceability check failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        if let Some(option_id) = option_id {
            candidates.retain(|(_, o)| o.option_id == option_id);
        }
        candidates.sort_by(|a, b| {
            a.1.total_charge
                .partial_cmp(&b.1.total_charge)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        candidates
            .into_iter()
            .next()
            .ok_or(match first_err {
                Some(e) => OrchestratorError::Carrier(e),
                None => OrchestratorError::NoCourierOptions,
            })
    }

    /// Fire-and-log wrapper used when an order enters Processing. A failure
    /// leaves the order in Processing, eligible for manual creation later.
    pub async fn auto_create_shipment(&self, order_id: Uuid) {
        match self.ship_order(&order_id.to_string(), None, None).await {
            Ok(outcome) => {
                tracing::info!(
                    order_id = %order_id,
                    carrier = %outcome.carrier,
                    awb = %outcome.awb,
                    "automatic shipment created"
                );
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %order_id,
                    error = %e,
                    "automatic shipment creation failed; order stays retryable"
                );
            }
        }
    }

    /// The create → AWB → pickup sequence. Safe to re-run: a live sub-record
    /// with an AWB short-circuits to the existing identifiers, and a
    /// half-created shipment is resumed rather than duplicated.
    pub async fn ship_order(
        &self,
        order_ref: &str,
        carrier: Option<CarrierKind>,
        option_id: Option<&str>,
    ) -> Result<ShipOutcome, OrchestratorError> {
        let mut order = self.load(order_ref).await?;

        if matches!(
            order.order_status,
            OrderStatus::Cancelled | OrderStatus::Delivered
        ) {
            return Err(OrchestratorError::Lifecycle(
                LifecycleError::InvalidTransition {
                    from: order.order_status,
                    to: OrderStatus::Shipped,
                },
            ));
        }

        if let Some(live) = order.live_shipment() {
            if let Some(awb) = &live.awb {
                return Ok(ShipOutcome {
                    carrier: live.carrier,
                    courier_name: live
                        .courier_name
                        .clone()
                        .unwrap_or_else(|| live.carrier.to_string()),
                    awb: awb.clone(),
                    already_shipped: true,
                });
            }
        }

        let (is_cod, cod_amount, fallback) = carrier_payment(&order);
        if fallback {
            tracing::warn!(
                order = %order.order_number,
                "online payment still pending; shipping as COD"
            );
        }
        let snapshot = OrderSnapshot::from_order(&order, cod_amount);

        let resume = order.live_shipment().and_then(|live| {
            live.external_shipment_id.as_ref().map(|ext| {
                (
                    live.carrier,
                    ShipmentCreated {
                        external_shipment_id: ext.clone(),
                        waybill: live.awb.clone(),
                        label_url: live.label_url.clone(),
                    },
                    live.courier_option_id.clone(),
                    live.courier_name.clone(),
                )
            })
        });

        let (kind, created, option_for_awb, courier_name) = match resume {
            Some(parts) => parts,
            None => {
                let (kind, option) =
                    self.pick_option(&order, carrier, option_id, is_cod).await?;
                let client = self.client(kind)?;
                let created = client.create_shipment(&snapshot, &option).await?;

                let idx = upsert_shipment(&mut order, kind);
                let record = &mut order.shipments[idx];
                record.external_shipment_id = Some(created.external_shipment_id.clone());
                record.awb = created.waybill.clone();
                record.label_url = created.label_url.clone();
                record.courier_option_id = Some(option.option_id.clone());
                record.courier_name = Some(option.name.clone());
                record.cancelled_at = None;
                order.touch();
                // Persist before the AWB step so a retry resumes here
                self.save(&order).await?;

                (
                    kind,
                    created,
                    Some(option.option_id.clone()),
                    Some(option.name.clone()),
                )
            }
        };

        let client = self.client(kind)?;
        let assignment = match created.waybill.clone() {
            Some(waybill) => AwbAssignment {
                awb_code: waybill,
                courier_name: courier_name.unwrap_or_else(|| kind.to_string()),
            },
            None => {
                client
                    .generate_awb(
                        &created.external_shipment_id,
                        option_for_awb.as_deref().unwrap_or_default(),
                    )
                    .await?
            }
        };

        let idx = upsert_shipment(&mut order, kind);
        let record = &mut order.shipments[idx];
        record.awb = Some(assignment.awb_code.clone());
        record.courier_name = Some(assignment.courier_name.clone());
        order.tracking_id = Some(assignment.awb_code.clone());
        order.courier_name = Some(assignment.courier_name.clone());

        if let Err(e) = client.schedule_pickup(&created.external_shipment_id).await {
            tracing::warn!(
                order = %order.order_number,
                carrier = %kind,
                error = %e,
                "pickup scheduling failed; shipment continues"
            );
        }

        let note = format!(
            "Shipped via {} ({}), AWB {}",
            kind, assignment.courier_name, assignment.awb_code
        );
        apply_transition(
            &mut order,
            OrderStatus::Shipped,
            Some(note),
            TransitionSource::System,
            true,
        )?;
        self.save(&order).await?;
        self.notify(&order, OrderStatus::Shipped).await;

        Ok(ShipOutcome {
            carrier: kind,
            courier_name: assignment.courier_name,
            awb: assignment.awb_code,
            already_shipped: false,
        })
    }

    /// AWB-only manual step. A sub-record that already carries an AWB is
    /// returned as-is rather than treated as a failure.
    pub async fn generate_awb(
        &self,
        order_ref: &str,
    ) -> Result<AwbAssignment, OrchestratorError> {
        let mut order = self.load(order_ref).await?;
        let live = order
            .live_shipment()
            .ok_or(OrchestratorError::NoLiveShipment)?;

        if let Some(awb) = &live.awb {
            return Ok(AwbAssignment {
                awb_code: awb.clone(),
                courier_name: live
                    .courier_name
                    .clone()
                    .unwrap_or_else(|| live.carrier.to_string()),
            });
        }

        let kind = live.carrier;
        let ext = live
            .external_shipment_id
            .clone()
            .ok_or(OrchestratorError::ShipmentNotCreated)?;
        let option_id = live.courier_option_id.clone().unwrap_or_default();

        let assignment = self.client(kind)?.generate_awb(&ext, &option_id).await?;

        let idx = upsert_shipment(&mut order, kind);
        let record = &mut order.shipments[idx];
        record.awb = Some(assignment.awb_code.clone());
        record.courier_name = Some(assignment.courier_name.clone());
        order.tracking_id = Some(assignment.awb_code.clone());
        order.courier_name = Some(assignment.courier_name.clone());
        order.touch();
        self.save(&order).await?;

        Ok(assignment)
    }

    pub async fn schedule_pickup(&self, order_ref: &str) -> Result<(), OrchestratorError> {
        let order = self.load(order_ref).await?;
        let live = order
            .live_shipment()
            .ok_or(OrchestratorError::NoLiveShipment)?;
        let ext = live
            .external_shipment_id
            .clone()
            .ok_or(OrchestratorError::ShipmentNotCreated)?;
        self.client(live.carrier)?.schedule_pickup(&ext).await?;
        Ok(())
    }

    pub async fn track(&self, order_ref: &str) -> Result<TrackingInfo, OrchestratorError> {
        let mut order = self.load(order_ref).await?;
        let live = order
            .live_shipment()
            .ok_or(OrchestratorError::NoLiveShipment)?;
        let kind = live.carrier;
        let awb = live.awb.clone().ok_or(OrchestratorError::ShipmentNotCreated)?;

        let info = self.client(kind)?.track(&awb).await?;

        if let Some(record) = order.shipment_for_mut(kind) {
            record.raw_status = Some(info.raw_status.clone());
        }
        order.touch();
        self.save(&order).await?;
        Ok(info)
    }

    /// Carrier-level cancellation; the order itself keeps its status.
    pub async fn cancel_shipment(&self, order_ref: &str) -> Result<bool, OrchestratorError> {
        let mut order = self.load(order_ref).await?;
        let live = order
            .live_shipment()
            .ok_or(OrchestratorError::NoLiveShipment)?;
        let kind = live.carrier;
        let awb = live.awb.clone().ok_or(OrchestratorError::ShipmentNotCreated)?;

        let accepted = self.client(kind)?.cancel(&awb).await?;
        if accepted {
            if let Some(record) = order.shipment_for_mut(kind) {
                record.cancelled_at = Some(Utc::now());
            }
            order.tracking_id = None;
            order.courier_name = None;
            order.touch();
            self.save(&order).await?;
        }
        Ok(accepted)
    }

    pub async fn label(&self, order_ref: &str) -> Result<DocumentRef, OrchestratorError> {
        let mut order = self.load(order_ref).await?;
        let live = order
            .live_shipment()
            .ok_or(OrchestratorError::NoLiveShipment)?;
        let kind = live.carrier;
        let ext = live
            .external_shipment_id
            .clone()
            .ok_or(OrchestratorError::ShipmentNotCreated)?;

        let document = self.client(kind)?.label(&ext).await?;
        if let DocumentRef::Url(url) = &document {
            if let Some(record) = order.shipment_for_mut(kind) {
                record.label_url = Some(url.clone());
            }
            order.touch();
            self.save(&order).await?;
        }
        Ok(document)
    }

    pub async fn manifest(&self, order_ref: &str) -> Result<DocumentRef, OrchestratorError> {
        let mut order = self.load(order_ref).await?;
        let live = order
            .live_shipment()
            .ok_or(OrchestratorError::NoLiveShipment)?;
        let kind = live.carrier;
        let ext = live
            .external_shipment_id
            .clone()
            .ok_or(OrchestratorError::ShipmentNotCreated)?;

        let document = self.client(kind)?.manifest(&ext).await?;
        if let DocumentRef::Url(url) = &document {
            if let Some(record) = order.shipment_for_mut(kind) {
                record.manifest_url = Some(url.clone());
            }
            order.touch();
            self.save(&order).await?;
        }
        Ok(document)
    }

    /// Escape hatch for carriers without an integration: write the canonical
    /// tracking pair directly, no adapter involved.
    pub async fn manual_entry(
        &self,
        order_ref: &str,
        courier_name: &str,
        tracking_id: &str,
    ) -> Result<(), OrchestratorError> {
        let mut order = self.load(order_ref).await?;

        order.tracking_id = Some(tracking_id.to_string());
        order.courier_name = Some(courier_name.to_string());

        let note = format!("Manual entry: {courier_name}, AWB {tracking_id}");
        apply_transition(
            &mut order,
            OrderStatus::Shipped,
            Some(note),
            TransitionSource::Admin,
            true,
        )?;
        self.save(&order).await?;
        self.notify(&order, OrderStatus::Shipped).await;
        Ok(())
    }

    /// Order-level cancellation: guard the transition, best-effort carrier
    /// cancel, restock each line item exactly once.
    pub async fn cancel_order(
        &self,
        order_ref: &str,
        note: Option<String>,
        source: TransitionSource,
    ) -> Result<CancelOutcome, OrchestratorError> {
        let mut order = self.load(order_ref).await?;

        if order.order_status == OrderStatus::Cancelled {
            return Ok(CancelOutcome {
                already_cancelled: true,
            });
        }

        apply_transition(
            &mut order,
            OrderStatus::Cancelled,
            note.or_else(|| Some("Order cancelled".to_string())),
            source,
            false,
        )?;

        let live_awb = order
            .live_shipment()
            .and_then(|live| live.awb.clone().map(|awb| (live.carrier, awb)));
        if let Some((kind, awb)) = live_awb {
            match self.client(kind) {
                Ok(client) => match client.cancel(&awb).await {
                    Ok(true) => {
                        if let Some(record) = order.shipment_for_mut(kind) {
                            record.cancelled_at = Some(Utc::now());
                        }
                    }
                    Ok(false) => {
                        tracing::warn!(
                            order = %order.order_number,
                            carrier = %kind,
                            "carrier declined the cancellation"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            order = %order.order_number,
                            carrier = %kind,
                            error = %e,
                            "carrier cancellation failed; order cancellation proceeds"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(order = %order.order_number, error = %e, "carrier lookup failed");
                }
            }
        }
        order.tracking_id = None;
        order.courier_name = None;

        lifecycle::restock_items(self.stock.as_ref(), &order)
            .await
            .map_err(OrchestratorError::storage)?;
        self.save(&order).await?;
        self.notify(&order, OrderStatus::Cancelled).await;

        Ok(CancelOutcome {
            already_cancelled: false,
        })
    }

    /// Guarded manual status correction (e.g. Processing → Confirmed).
    /// Cancellations route through the full cancellation path so the
    /// restock side effect is never skipped.
    pub async fn update_status(
        &self,
        order_ref: &str,
        new_status: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, OrchestratorError> {
        if new_status == OrderStatus::Cancelled {
            self.cancel_order(order_ref, note, TransitionSource::Admin)
                .await?;
            return self.load(order_ref).await;
        }

        let mut order = self.load(order_ref).await?;
        apply_transition(
            &mut order,
            new_status,
            note,
            TransitionSource::Admin,
            false,
        )?;
        self.save(&order).await?;
        self.notify(&order, new_status).await;
        Ok(order)
    }
}
