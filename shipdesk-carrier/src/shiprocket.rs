use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use shipdesk_core::carrier::{
    AwbAssignment, CarrierClient, CarrierError, CourierOption, DocumentRef, OrderSnapshot,
    ShipmentCreated, TrackingEvent, TrackingInfo,
};
use shipdesk_core::order::CarrierKind;

use crate::token::{send_authed, TokenCache, TokenProvider};

#[derive(Debug, Clone)]
pub struct ShiprocketConfig {
    pub base_url: String,
    pub email: String,
    pub password: String,
    /// Named pickup location registered in the Shiprocket panel
    pub pickup_location: String,
}

/// Shiprocket aggregator adapter. Auth is an email/password exchange for a
/// bearer token; the AWB is assigned in a separate step after order creation.
pub struct ShiprocketClient {
    http: reqwest::Client,
    cfg: ShiprocketConfig,
    tokens: TokenCache,
}

struct ShiprocketAuth {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct SrLoginResponse {
    token: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl TokenProvider for ShiprocketAuth {
    async fn fetch_token(&self) -> Result<String, CarrierError> {
        let response = self
            .http
            .post(format!("{}/v1/external/auth/login", self.base_url))
            .json(&serde_json::json!({
                "email": self.email,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CarrierError::AuthFailure(format!(
                "Shiprocket login returned {}",
                response.status()
            )));
        }

        let body: SrLoginResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        body.token.ok_or_else(|| {
            CarrierError::AuthFailure(
                body.message
                    .unwrap_or_else(|| "Shiprocket login returned no token".to_string()),
            )
        })
    }
}

// ---- wire shapes, private to this adapter ----

#[derive(Deserialize)]
struct SrServiceabilityResponse {
    data: Option<SrServiceabilityData>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SrServiceabilityData {
    available_courier_companies: Option<Vec<SrCourierCompany>>,
}

#[derive(Deserialize)]
struct SrCourierCompany {
    courier_company_id: i64,
    courier_name: String,
    rate: f64,
    estimated_delivery_days: Option<String>,
    is_surface: Option<bool>,
}

#[derive(Serialize)]
struct SrOrderItem {
    name: String,
    sku: String,
    units: u32,
    selling_price: f64,
}

#[derive(Serialize)]
struct SrCreateOrder {
    order_id: String,
    order_date: String,
    pickup_location: String,
    billing_customer_name: String,
    billing_address: String,
    billing_city: String,
    billing_pincode: String,
    billing_state: String,
    billing_country: String,
    billing_email: String,
    billing_phone: String,
    shipping_is_billing: bool,
    order_items: Vec<SrOrderItem>,
    payment_method: String,
    sub_total: f64,
    weight: f64,
}

#[derive(Deserialize)]
struct SrOrderCreated {
    order_id: Option<i64>,
    shipment_id: Option<i64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SrAwbResponse {
    awb_assign_status: Option<i64>,
    response: Option<SrAwbInner>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SrAwbInner {
    data: Option<SrAwbData>,
}

#[derive(Deserialize)]
struct SrAwbData {
    awb_code: Option<String>,
    courier_name: Option<String>,
    awb_assign_error: Option<String>,
}

#[derive(Deserialize)]
struct SrTrackResponse {
    tracking_data: Option<SrTrackingData>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SrTrackingData {
    shipment_track: Option<Vec<SrShipmentTrack>>,
    shipment_track_activities: Option<Vec<SrTrackActivity>>,
}

#[derive(Deserialize)]
struct SrShipmentTrack {
    current_status: Option<String>,
}

#[derive(Deserialize)]
struct SrTrackActivity {
    date: Option<chrono::DateTime<chrono::Utc>>,
    status: Option<String>,
    activity: Option<String>,
    location: Option<String>,
}

#[derive(Deserialize)]
struct SrLabelResponse {
    label_created: Option<i64>,
    label_url: Option<String>,
    response: Option<String>,
}

#[derive(Deserialize)]
struct SrManifestResponse {
    manifest_url: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SrCancelResponse {
    message: Option<String>,
}

/// "2-4" or "3" as reported in `estimated_delivery_days`
fn parse_etd(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    let first = raw.split(['-', ' ']).next()?;
    first.parse::<f64>().ok()
}

fn options_from_companies(companies: Vec<SrCourierCompany>) -> Vec<CourierOption> {
    companies
        .into_iter()
        .map(|c| CourierOption {
            option_id: c.courier_company_id.to_string(),
            name: c.courier_name,
            total_charge: c.rate,
            estimated_days: parse_etd(c.estimated_delivery_days.as_deref()),
            surface: c.is_surface.unwrap_or(true),
        })
        .collect()
}

fn not_serviceable(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("serviceable") || lower.contains("pincode")
}

impl ShiprocketClient {
    pub fn new(cfg: ShiprocketConfig, token_ttl: Duration) -> Self {
        let http = reqwest::Client::new();
        let auth = ShiprocketAuth {
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
            .unwrap_or_else(|| format!("Shiprocket returned {status}"));
        CarrierError::Api(message)
    }
}

#[async_trait]
impl CarrierClient for ShiprocketClient {
    fn kind(&self) -> CarrierKind {
        CarrierKind::Shiprocket
    }

    async fn check_serviceability(
        &self,
        origin_pincode: &str,
        destination_pincode: &str,
        weight_kg: f64,
        is_cod: bool,
    ) -> Result<Vec<CourierOption>, CarrierError> {
        let url = self.url("/v1/external/courier/serviceability");
        let weight = weight_kg.to_string();
        let response = send_authed(&self.tokens, |token| {
            self.http
                .get(&url)
                .bearer_auth(token)
                .query(&[
                    ("pickup_postcode", origin_pincode),
                    ("delivery_postcode", destination_pincode),
                    ("weight", weight.as_str()),
                    ("cod", if is_cod { "1" } else { "0" }),
                ])
        })
        .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CarrierError::ServiceUnavailable(
                destination_pincode.to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SrServiceabilityResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if let Some(message) = body.message.as_deref() {
            if not_serviceable(message) {
                return Err(CarrierError::ServiceUnavailable(
                    destination_pincode.to_string(),
                ));
            }
        }

        let companies = body
            .data
            .and_then(|d| d.available_courier_companies)
            .unwrap_or_default();
        Ok(options_from_companies(companies))
    }

    async fn create_shipment(
        &self,
        snapshot: &OrderSnapshot,
        _option: &CourierOption,
    ) -> Result<ShipmentCreated, CarrierError> {
        let consignee = &snapshot.consignee;
        let payload = SrCreateOrder {
            order_id: snapshot.order_number.clone(),
            order_date: chrono::Utc::now().format("%Y-%m-%d %H:%M").to_string(),
            pickup_location: self.cfg.pickup_location.clone(),
            billing_customer_name: consignee.name.clone(),
            billing_address: match &consignee.line2 {
                Some(line2) => format!("{}, {}", consignee.line1, line2),
                None => consignee.line1.clone(),
            },
            billing_city: consignee.city.clone(),
            billing_pincode: consignee.pincode.clone(),
            billing_state: consignee.state.clone(),
            billing_country: "India".to_string(),
            billing_email: consignee.email.clone().unwrap_or_default(),
            billing_phone: consignee.phone.clone(),
            shipping_is_billing: true,
            order_items: snapshot
                .items
                .iter()
                .map(|i| SrOrderItem {
                    name: i.title.clone(),
                    sku: i.title.to_lowercase().replace(' ', "-"),
                    units: i.quantity,
                    selling_price: i.unit_price as f64 / 100.0,
                })
                .collect(),
            payment_method: if snapshot.cod_amount > 0 { "COD" } else { "Prepaid" }.to_string(),
            sub_total: snapshot.declared_value as f64 / 100.0,
            weight: snapshot.weight_kg,
        };

        let url = self.url("/v1/external/orders/create/adhoc");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&payload)
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SrOrderCreated = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        match (body.order_id, body.shipment_id) {
            (Some(_), Some(shipment_id)) => Ok(ShipmentCreated {
                external_shipment_id: shipment_id.to_string(),
                waybill: None,
                label_url: None,
            }),
            _ => Err(CarrierError::Api(body.message.unwrap_or_else(|| {
                "Shiprocket order creation returned no shipment id".to_string()
            }))),
        }
    }

    async fn generate_awb(
        &self,
        external_shipment_id: &str,
        option_id: &str,
    ) -> Result<AwbAssignment, CarrierError> {
        let url = self.url("/v1/external/courier/assign/awb");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": external_shipment_id,
                "courier_id": option_id,
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SrAwbResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        let data = body.response.and_then(|r| r.data);
        if body.awb_assign_status == Some(1) {
            if let Some(data) = data {
                if let Some(awb_code) = data.awb_code {
                    return Ok(AwbAssignment {
                        awb_code,
                        courier_name: data
                            .courier_name
                            .unwrap_or_else(|| "Shiprocket".to_string()),
                    });
                }
            }
            return Err(CarrierError::Api(
                "AWB assignment succeeded but no code was returned".to_string(),
            ));
        }

        let detail = data
            .and_then(|d| d.awb_assign_error)
            .or(body.message)
            .unwrap_or_default();
        if detail.to_lowercase().contains("already") {
            return Err(CarrierError::AlreadyAssigned);
        }
        Err(CarrierError::Api(detail))
    }

    async fn schedule_pickup(&self, external_shipment_id: &str) -> Result<(), CarrierError> {
        let url = self.url("/v1/external/courier/generate/pickup");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": [external_shipment_id],
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn track(&self, tracking_id: &str) -> Result<TrackingInfo, CarrierError> {
        let url = self.url(&format!("/v1/external/courier/track/awb/{tracking_id}"));
        let response = send_authed(&self.tokens, |token| {
            self.http.get(&url).bearer_auth(token)
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SrTrackResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        let data = body.tracking_data.ok_or_else(|| {
            CarrierError::Api(
                body.message
                    .unwrap_or_else(|| "no tracking data for AWB".to_string()),
            )
        })?;

        let raw_status = data
            .shipment_track
            .as_ref()
            .and_then(|t| t.first())
            .and_then(|t| t.current_status.clone())
            .unwrap_or_default();
        let events = data
            .shipment_track_activities
            .unwrap_or_default()
            .into_iter()
            .map(|a| TrackingEvent {
                at: a.date,
                status: a.status.unwrap_or_default(),
                location: a.location,
                remarks: a.activity,
            })
            .collect();

        Ok(TrackingInfo { raw_status, events })
    }

    async fn cancel(&self, tracking_id: &str) -> Result<bool, CarrierError> {
        let url = self.url("/v1/external/orders/cancel/shipment/awbs");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "awbs": [tracking_id],
            }))
        })
        .await?;

        if response.status().is_success() {
            return Ok(true);
        }

        let body: SrCancelResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        let message = body.message.unwrap_or_default();
        if message.to_lowercase().contains("delivered") {
            return Err(CarrierError::NotCancellable);
        }
        Err(CarrierError::Api(message))
    }

    async fn label(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        let url = self.url("/v1/external/courier/generate/label");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": [external_shipment_id],
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SrLabelResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        match (body.label_created, body.label_url) {
            (Some(1), Some(label_url)) => Ok(DocumentRef::Url(label_url)),
            _ => Err(CarrierError::Api(
                body.response
                    .unwrap_or_else(|| "label generation failed".to_string()),
            )),
        }
    }

    async fn manifest(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        let url = self.url("/v1/external/manifests/generate");
        let response = send_authed(&self.tokens, |token| {
            self.http.post(&url).bearer_auth(token).json(&serde_json::json!({
                "shipment_id": [external_shipment_id],
            }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: SrManifestResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        body.manifest_url.map(DocumentRef::Url).ok_or_else(|| {
            CarrierError::Api(
                body.message
                    .unwrap_or_else(|| "manifest generation failed".to_string()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etd_parses_ranges_and_plain_numbers() {
        assert_eq!(parse_etd(Some("2-4")), Some(2.0));
        assert_eq!(parse_etd(Some("3")), Some(3.0));
        assert_eq!(parse_etd(Some("")), None);
        assert_eq!(parse_etd(None), None);
    }

    #[test]
    fn courier_companies_map_to_options() {
        let options = options_from_companies(vec![SrCourierCompany {
            courier_company_id: 24,
            courier_name: "Xpressbees Surface".to_string(),
            rate: 78.5,
            estimated_delivery_days: Some("2-4".to_string()),
            is_surface: Some(true),
        }]);

        assert_eq!(options.len(), 1);
        assert_eq!(options[0].option_id, "24");
        assert_eq!(options[0].total_charge, 78.5);
        assert_eq!(options[0].estimated_days, Some(2.0));
        assert!(options[0].surface);
    }

    #[test]
    fn serviceability_message_detection() {
        assert!(not_serviceable("Delivery pincode is not serviceable"));
        assert!(!not_serviceable("Invalid token"));
    }
}
