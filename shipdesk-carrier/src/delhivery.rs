use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use shipdesk_core::carrier::{
    AwbAssignment, CarrierClient, CarrierError, CourierOption, DocumentRef, OrderSnapshot,
    ShipmentCreated, TrackingEvent, TrackingInfo,
};
use shipdesk_core::order::CarrierKind;

use crate::token::{send_authed, StaticToken, TokenCache};

#[derive(Debug, Clone)]
pub struct DelhiveryConfig {
    pub base_url: String,
    pub api_key: String,
    /// Registered warehouse name used for manifesting and pickups
    pub pickup_name: String,
}

/// Delhivery adapter. Auth is a static API token; the waybill is allocated
/// at manifest (creation) time, so there is no separate AWB step.
pub struct DelhiveryClient {
    http: reqwest::Client,
    cfg: DelhiveryConfig,
    tokens: TokenCache,
}

// ---- wire shapes, private to this adapter ----

#[derive(Deserialize)]
struct DlPinResponse {
    delivery_codes: Vec<DlPinEntry>,
}

#[derive(Deserialize)]
struct DlPinEntry {
    postal_code: DlPostalCode,
}

#[derive(Deserialize)]
struct DlPostalCode {
    cod: Option<String>,
    pre_paid: Option<String>,
}

#[derive(Deserialize)]
struct DlChargeEntry {
    total_amount: f64,
}

#[derive(Deserialize)]
struct DlCreateResponse {
    success: Option<bool>,
    packages: Option<Vec<DlPackage>>,
    rmk: Option<String>,
}

#[derive(Deserialize)]
struct DlPackage {
    waybill: Option<String>,
    status: Option<String>,
    remarks: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct DlTrackResponse {
    #[serde(rename = "ShipmentData")]
    shipment_data: Option<Vec<DlShipmentEntry>>,
}

#[derive(Deserialize)]
struct DlShipmentEntry {
    #[serde(rename = "Shipment")]
    shipment: DlShipment,
}

#[derive(Deserialize)]
struct DlShipment {
    #[serde(rename = "Status")]
    status: Option<DlStatus>,
    #[serde(rename = "Scans")]
    scans: Option<Vec<DlScanEntry>>,
}

#[derive(Deserialize)]
struct DlStatus {
    #[serde(rename = "Status")]
    status: Option<String>,
}

#[derive(Deserialize)]
struct DlScanEntry {
    #[serde(rename = "ScanDetail")]
    detail: DlScanDetail,
}

#[derive(Deserialize)]
struct DlScanDetail {
    #[serde(rename = "Scan")]
    scan: Option<String>,
    #[serde(rename = "ScanDateTime")]
    scanned_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "ScannedLocation")]
    location: Option<String>,
    #[serde(rename = "Instructions")]
    instructions: Option<String>,
}

#[derive(Deserialize)]
struct DlEditResponse {
    status: Option<bool>,
    remark: Option<String>,
}

#[derive(Deserialize)]
struct DlSlipResponse {
    packages: Option<Vec<DlSlipPackage>>,
}

#[derive(Deserialize)]
struct DlSlipPackage {
    pdf_download_link: Option<String>,
}

#[derive(Deserialize)]
struct DlManifestResponse {
    manifest_url: Option<String>,
}

fn pin_supports(entry: &DlPostalCode, is_cod: bool) -> bool {
    let flag = if is_cod { &entry.cod } else { &entry.pre_paid };
    flag.as_deref() == Some("Y")
}

impl DelhiveryClient {
    pub fn new(cfg: DelhiveryConfig) -> Self {
        // Static keys do not expire; the long TTL keeps the cache state
        // machine and the 401 retry path identical to the other carriers.
        let tokens = TokenCache::new(
            Arc::new(StaticToken(cfg.api_key.clone())),
            Duration::from_secs(365 * 24 * 3600),
        );
        Self {
            http: reqwest::Client::new(),
            cfg,
            tokens,
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
            .and_then(|v| {
                v["rmk"]
                    .as_str()
                    .or_else(|| v["remark"].as_str())
                    .or_else(|| v["error"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("Delhivery returned {status}"));
        CarrierError::Api(message)
    }
}

#[async_trait]
impl CarrierClient for DelhiveryClient {
    fn kind(&self) -> CarrierKind {
        CarrierKind::Delhivery
    }

    async fn check_serviceability(
        &self,
        origin_pincode: &str,
        destination_pincode: &str,
        weight_kg: f64,
        is_cod: bool,
    ) -> Result<Vec<CourierOption>, CarrierError> {
        let pin_url = self.url("/c/api/pin-codes/json");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .get(&pin_url)
                .header("Authorization", format!("Token {token}"))
                .query(&[("filter_codes", destination_pincode)])
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DlPinResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        let Some(entry) = body.delivery_codes.first() else {
            return Err(CarrierError::ServiceUnavailable(
                destination_pincode.to_string(),
            ));
        };
        if !pin_supports(&entry.postal_code, is_cod) {
            // Lane is served but not for this payment type
            return Ok(Vec::new());
        }

        let charges_url = self.url("/api/kinko/v1/invoice/charges/.json");
        let grams = ((weight_kg * 1000.0).round() as i64).to_string();
        let response = send_authed(&self.tokens, |token| {
            self.http
                .get(&charges_url)
                .header("Authorization", format!("Token {token}"))
                .query(&[
                    ("md", "S"),
                    ("ss", "Delivered"),
                    ("o_pin", origin_pincode),
                    ("d_pin", destination_pincode),
                    ("cgm", grams.as_str()),
                    ("pt", if is_cod { "COD" } else { "Pre-paid" }),
                ])
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let charges: Vec<DlChargeEntry> = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        Ok(charges
            .first()
            .map(|c| {
                vec![CourierOption {
                    option_id: "delhivery-surface".to_string(),
                    name: "Delhivery Surface".to_string(),
                    total_charge: c.total_amount,
                    estimated_days: None,
                    surface: true,
                }]
            })
            .unwrap_or_default())
    }

    async fn create_shipment(
        &self,
        snapshot: &OrderSnapshot,
        _option: &CourierOption,
    ) -> Result<ShipmentCreated, CarrierError> {
        let consignee = &snapshot.consignee;
        let full_address = match &consignee.line2 {
            Some(line2) => format!("{}, {}", consignee.line1, line2),
            None => consignee.line1.clone(),
        };
        let payment_mode = if snapshot.cod_amount > 0 { "COD" } else { "Prepaid" };
        let data = serde_json::json!({
            "shipments": [{
                "name": consignee.name,
                "add": full_address,
                "pin": consignee.pincode,
                "city": consignee.city,
                "state": consignee.state,
                "country": "India",
                "phone": consignee.phone,
                "order": snapshot.order_number,
                "payment_mode": payment_mode,
                "cod_amount": snapshot.cod_amount as f64 / 100.0,
                "total_amount": snapshot.declared_value as f64 / 100.0,
                "weight": (snapshot.weight_kg * 1000.0).round() as i64,
                "shipment_length": 10,
                "shipment_width": 10,
                "shipment_height": 10,
            }],
            "pickup_location": { "name": self.cfg.pickup_name },
        });

        // Delhivery's manifest API takes a form-encoded envelope around the
        // JSON payload rather than a JSON body.
        let url = self.url("/api/cmu/create.json");
        let form_body = format!("format=json&data={data}");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .post(&url)
                .header("Authorization", format!("Token {token}"))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(form_body.clone())
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DlCreateResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if body.success != Some(true) {
            return Err(CarrierError::Api(
                body.rmk
                    .unwrap_or_else(|| "Delhivery manifest rejected".to_string()),
            ));
        }

        let package = body
            .packages
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| CarrierError::Api("Delhivery returned no package".to_string()))?;

        if package.status.as_deref() == Some("Fail") {
            let remarks = package
                .remarks
                .map(|r| r.to_string())
                .unwrap_or_else(|| "package manifest failed".to_string());
            if remarks.to_lowercase().contains("duplicate") {
                return Err(CarrierError::AlreadyExists(snapshot.order_number.clone()));
            }
            return Err(CarrierError::Api(remarks));
        }

        let waybill = package
            .waybill
            .ok_or_else(|| CarrierError::Api("Delhivery returned no waybill".to_string()))?;
        Ok(ShipmentCreated {
            external_shipment_id: waybill.clone(),
            waybill: Some(waybill),
            label_url: None,
        })
    }

    async fn generate_awb(
        &self,
        _external_shipment_id: &str,
        _option_id: &str,
    ) -> Result<AwbAssignment, CarrierError> {
        // The waybill is allocated when the package is manifested; there is
        // nothing further to assign.
        Err(CarrierError::AlreadyAssigned)
    }

    async fn schedule_pickup(&self, _external_shipment_id: &str) -> Result<(), CarrierError> {
        let url = self.url("/fm/request/new/");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .post(&url)
                .header("Authorization", format!("Token {token}"))
                .json(&serde_json::json!({
                    "pickup_location": self.cfg.pickup_name,
                    "pickup_date": chrono::Utc::now().format("%Y-%m-%d").to_string(),
                    "expected_package_count": 1,
                }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn track(&self, tracking_id: &str) -> Result<TrackingInfo, CarrierError> {
        let url = self.url("/api/v1/packages/json");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .get(&url)
                .header("Authorization", format!("Token {token}"))
                .query(&[("waybill", tracking_id)])
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DlTrackResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        let shipment = body
            .shipment_data
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|e| e.shipment)
            .ok_or_else(|| CarrierError::Api("no shipment data for waybill".to_string()))?;

        Ok(TrackingInfo {
            raw_status: shipment
                .status
                .and_then(|s| s.status)
                .unwrap_or_default(),
            events: shipment
                .scans
                .unwrap_or_default()
                .into_iter()
                .map(|s| TrackingEvent {
                    at: s.detail.scanned_at,
                    status: s.detail.scan.unwrap_or_default(),
                    location: s.detail.location,
                    remarks: s.detail.instructions,
                })
                .collect(),
        })
    }

    async fn cancel(&self, tracking_id: &str) -> Result<bool, CarrierError> {
        let url = self.url("/api/p/edit");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .post(&url)
                .header("Authorization", format!("Token {token}"))
                .json(&serde_json::json!({
                    "waybill": tracking_id,
                    "cancellation": "true",
                }))
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DlEditResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;

        if body.status == Some(true) {
            return Ok(true);
        }
        let remark = body.remark.unwrap_or_default();
        if remark.to_lowercase().contains("delivered") {
            return Err(CarrierError::NotCancellable);
        }
        Ok(false)
    }

    async fn label(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        let url = self.url("/api/p/packing_slip");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .get(&url)
                .header("Authorization", format!("Token {token}"))
                .query(&[("wbns", external_shipment_id), ("pdf", "true")])
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DlSlipResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        body.packages
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|p| p.pdf_download_link)
            .map(DocumentRef::Url)
            .ok_or_else(|| CarrierError::Api("no packing slip for waybill".to_string()))
    }

    async fn manifest(&self, external_shipment_id: &str) -> Result<DocumentRef, CarrierError> {
        let url = self.url("/api/p/manifest");
        let response = send_authed(&self.tokens, |token| {
            self.http
                .get(&url)
                .header("Authorization", format!("Token {token}"))
                .query(&[("wbns", external_shipment_id)])
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: DlManifestResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Network(e.to_string()))?;
        body.manifest_url
            .map(DocumentRef::Url)
            .ok_or_else(|| CarrierError::Api("no manifest for waybill".to_string()))
    }
}
