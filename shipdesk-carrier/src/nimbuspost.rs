use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use shipdesk_core::carrier::{
    AwbAssignment, CarrierClient, CarrierError, CourierOption, DocumentRef, OrderSnapshot,
    ShipmentCreated, TrackingEvent, TrackingInfo,
};
use shipdesk_core::order::CarrierKind;

use crate::token::{send_authed, TokenCache, TokenProvider};

#[derive(Debug, Clone)]
pub struct NimbusConfig {
    pub base_url: String,
    pub email: String,
    pub password: String,
}

/// NimbusPost aggregator adapter. Auth is an email/password exchange; the
/// AWB comes back with shipment creation.
pub struct NimbusClient {
    http: reqwest::Client,
    cfg: NimbusConfig,
    tokens: TokenCache,
}

struct NimbusAuth {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct NpLoginResponse {
    status: bool,
    data: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl TokenProvider for NimbusAuth {
    async fn fetch_token(&self) -> Result<String, CarrierError> {
        let response = self
            .http
            .post(format!("{}/users/login", self.base_url))
            .json(&serde_json::json!({
                "email": self.email,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CarrierError::AuthFailure(format!(
                "NimbusPost login returned {}",
                response.status()
            )));
        }

        let body: NpLoginResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        if !body.status {
            return Err(CarrierError::AuthFailure(
                body.message
                    .unwrap_or_else(|| "NimbusPost login rejected".to_string()),
            ));
        }
        body.data
            .ok_or_else(|| CarrierError::AuthFailure("NimbusPost returned no token".to_string()))
    }
}

// ---- wire shapes, private to this adapter ----

#[derive(Deserialize)]
struct NpServiceabilityResponse {
    status: bool,
    data: Option<Vec<NpCourier>>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct NpCourier {
    id: i64,
    name: String,
    total_charges: f64,
    edd: Option<f64>,
    courier_type: Option<String>,
}

#[derive(Deserialize)]
struct NpCreateResponse {
    status: bool,
    data: Option<NpShipmentData>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct NpShipmentData {
    shipment_id: i64,
    awb_number: Option<String>,
    courier_name: Option<String>,
    label: Option<String>,
}

#[derive(Deserialize)]
struct NpTrackResponse {
    status: bool,
    data: Option<NpTrackData>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct NpTrackData {
    status: Option<String>,
    history: Option<Vec<NpTrackEvent>>,
}

#[derive(Deserialize)]
struct NpTrackEvent {
    status_time: Option<chrono::DateTime<chrono::Utc>>,
    event: Option<String>,
    location: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct NpActionResponse {
    status: bool,
    data: Option<String>,
    message: Option<String>,
}

fn options_from_couriers(couriers: Vec<NpCourier>) -> Vec<CourierOption> {
    couriers
        .into_iter()
        .map(|c| CourierOption {
            option_id: c.id.to_string(),
            name: c.name,
            total_charge: c.total_charges,
            estimated_days: c.edd,
            surface: c.courier_type.as_deref() != Some("air"),
        })
        .collect()
}

impl NimbusClient {
    pub fn new(cfg: NimbusConfig, token_ttl: Duration) -> Self {
        let http = reqwest::Client::new();
        let auth = NimbusAuth {
            http: http.clone(),
            base_url: cfg.base_url.clone(),
            email: cfg.email.clone(),
            password: cfg.password.clone(),
        };
        Self {
            http,
            cfg,
            tokens: TokenCache::new(Arc::new(auth), token_ttl),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url, path)
    }

    async fn api_error(response: reqwest::Response) -> CarrierError {
        let status = response.status();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| format!("NimbusPost returned {status}"));
        CarrierError::Api(message)
    }
}

#[async_trait]
impl CarrierClient for NimbusClient {
    fn kind(&self) -> CarrierKind {
        CarrierKind::Nimbuspost
    }

    async fn check_serviceability(
        &self,
        origin_pincode: &str,
        destination_pincode: &str,
        weight_kg: f64,
        is_cod: bool,
    ) -> Result<Vec<CourierOption>, CarrierError> {
        let url = self.url("/courier/serviceability");
        let grams = (weight_kg * 1000.0).round() as i64;
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "origin": origin_pincode,
                "destination": destination_pincode,
                "payment_type": if is_cod { "cod" } else { "prepaid" },
                "weight": grams,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: NpServiceabilityResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if !body.status {
            let message = body.message.unwrap_or_default();
            if message.to_lowercase().contains("serviceable") {
                return Err(CarrierError::ServiceUnavailable(
                    destination_pincode.to_string(),
                ));
            }
            return Err(CarrierError::Api(message));
        }

        Ok(options_from_couriers(body.data.unwrap_or_default()))
    }

    async fn create_shipment(
        &self,
        snapshot: &OrderSnapshot,
        option: &CourierOption,
    ) -> Result<ShipmentCreated, CarrierError> {
        let consignee = &snapshot.consignee;
        let payment_type = if snapshot.cod_amount > 0 { "cod" } else { "prepaid" };
        let order_items: Vec<serde_json::Value> = snapshot
            .items
            .iter()
            .map(|i| {
                serde_json::json!({
                    "name": i.title,
                    "qty": i.quantity,
                    "price": i.unit_price as f64 / 100.0,
                })
            })
            .collect();
        let payload = serde_json::json!({
            "order_number": snapshot.order_number,
            "payment_type": payment_type,
            "order_amount": snapshot.declared_value as f64 / 100.0,
            "cod_charges": snapshot.cod_amount as f64 / 100.0,
            "package_weight": (snapshot.weight_kg * 1000.0).round() as i64,
            "courier_id": option.option_id,
            "consignee": {
                "name": consignee.name,
                "address": consignee.line1,
                "address_2": consignee.line2,
                "city": consignee.city,
                "state": consignee.state,
                "pincode": consignee.pincode,
                "phone": consignee.phone,
            },
            "order_items": order_items,
        });

        let url = self.url("/shipments");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&payload)
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: NpCreateResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if !body.status {
            let message = body.message.unwrap_or_default();
            if message.to_lowercase().contains("already") {
                return Err(CarrierError::AlreadyExists(snapshot.order_number.clone()));
            }
            return Err(CarrierError::Api(message));
        }

        let data = body
            .data
            .ok_or_else(|| CarrierError::Api("NimbusPost returned no shipment".to_string()))?;
        Ok(ShipmentCreated {
            external_shipment_id: data.shipment_id.to_string(),
            waybill: data.awb_number,
            label_url: data.label,
        })
    }

    async fn generate_awb(
        &self,
        _external_shipment_id: &str,
        _option_id: &str,
    ) -> Result<AwbAssignment, CarrierError> {
        // The AWB is issued with shipment creation; a second assignment is
        // always a duplicate.
        Err(CarrierError::AlreadyAssigned)
    }

    async fn schedule_pickup(&self, external_shipment_id: &str) -> Result<(), CarrierError> {
        let url = self.url("/shipments/pickup");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": external_shipment_id,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn track(&self, tracking_id: &str) -> Result<TrackingInfo, CarrierError> {
        let url = self.url("/shipments/track");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "awb": tracking_id,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: NpTrackResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if !body.status {
            return Err(CarrierError::Api(
                body.message
                    .unwrap_or_else(|| "tracking lookup failed".to_string()),
            ));
        }

        let data = body
            .data
            .ok_or_else(|| CarrierError::Api("no tracking data for AWB".to_string()))?;
        Ok(TrackingInfo {
            raw_status: data.status.unwrap_or_default(),
            events: data
                .history
                .unwrap_or_default()
                .into_iter()
                .map(|e| TrackingEvent {
                    at: e.status_time,
                    status: e.event.unwrap_or_default(),
                    location: e.location,
                    remarks: e.message,
                })
                .collect(),
        })
    }

    async fn cancel(&self, tracking_id: &str) -> Result<bool, CarrierError> {
        let url = self.url("/shipments/cancel");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "awb": tracking_id,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: NpActionResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        if body.status {
            return Ok(true);
        }
        let message = body.message.unwrap_or_default();
        if message.to_lowercase().contains("delivered") {
            return Err(CarrierError::NotCancellable);
        }
        Ok(false)
    }

    async fn label(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        let url = self.url("/shipments/label");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": external_shipment_id,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: NpActionResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        match (body.status, body.data) {
            (true, Some(label_url)) => Ok(DocumentRef::Url(label_url)),
            _ => Err(CarrierError::Api(
                body.message
                    .unwrap_or_else(|| "label generation failed".to_string()),
            )),
        }
    }

    async fn manifest(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        let url = self.url("/shipments/manifest");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": external_shipment_id,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: NpActionResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        match (body.status, body.data) {
            (true, Some(manifest_url)) => Ok(DocumentRef::Url(manifest_url)),
            _ => Err(CarrierError::Api(
                body.message
                    .unwrap_or_else(|| "manifest generation failed".to_string()),
            )),
        }
    }
}
