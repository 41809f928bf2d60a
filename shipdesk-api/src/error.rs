use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use shipdesk_core::carrier::CarrierError;
use shipdesk_order::{LifecycleError, OrchestratorError};

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Validation(String),
    /// State or idempotence conflict; carries an operator hint
    Conflict {
        message: String,
        suggestion: Option<String>,
    },
    /// Destination cannot be served by the requested carrier
    Unserviceable {
        message: String,
        suggestion: Option<String>,
    },
    /// Carrier-side failure
    Upstream {
        message: String,
        suggestion: Option<String>,
    },
    Internal(anyhow::Error),
}

impl AppError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        AppError::Internal(anyhow::Error::msg(e.to_string()))
    }
}

const ALT_CARRIERS: &str =
    "Try another carrier (Shiprocket / Delhivery / NimbusPost) or Manual Entry instead.";

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::OrderNotFound(id) => AppError::NotFound(format!(
                "Order not found: {id}"
            )),
            OrchestratorError::NoLiveShipment | OrchestratorError::ShipmentNotCreated => {
                AppError::Conflict {
                    message: err.to_string(),
                    suggestion: Some(
                        "Create the shipment first, or use Manual Entry.".to_string(),
                    ),
                }
            }
            OrchestratorError::NoCourierOptions => AppError::Unserviceable {
                message: err.to_string(),
                suggestion: Some(ALT_CARRIERS.to_string()),
            },
            OrchestratorError::CarrierNotConfigured(_) => {
                AppError::Internal(anyhow::Error::msg(err.to_string()))
            }
            OrchestratorError::Carrier(carrier_err) => match &carrier_err {
                CarrierError::ServiceUnavailable(_) => AppError::Unserviceable {
                    message: carrier_err.to_string(),
                    suggestion: Some(ALT_CARRIERS.to_string()),
                },
                CarrierError::AuthFailure(_) => AppError::Upstream {
                    message: carrier_err.to_string(),
                    suggestion: Some(
                        "Check the carrier credentials in configuration.".to_string(),
                    ),
                },
                CarrierError::AlreadyAssigned | CarrierError::AlreadyExists(_) => {
                    AppError::Conflict {
                        message: carrier_err.to_string(),
                        suggestion: Some(
                            "Use the existing shipment identifiers.".to_string(),
                        ),
                    }
                }
                CarrierError::NotCancellable => AppError::Conflict {
                    message: carrier_err.to_string(),
                    suggestion: Some(
                        "The carrier reports this shipment as delivered.".to_string(),
                    ),
                },
                CarrierError::Network(_) => AppError::Upstream {
                    message: carrier_err.to_string(),
                    suggestion: Some("Transient carrier error, retry the operation.".to_string()),
                },
                CarrierError::Api(_) => AppError::Upstream {
                    message: carrier_err.to_string(),
                    suggestion: Some(ALT_CARRIERS.to_string()),
                },
            },
            OrchestratorError::Lifecycle(lifecycle_err) => match lifecycle_err {
                LifecycleError::InvalidTransition { .. } => AppError::Conflict {
                    message: lifecycle_err.to_string(),
                    suggestion: None,
                },
                LifecycleError::DuplicateStatus { .. } => AppError::Conflict {
                    message: lifecycle_err.to_string(),
                    suggestion: None,
                },
            },
            OrchestratorError::Storage(message) => {
                AppError::Internal(anyhow::Error::msg(message))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, suggestion) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Conflict {
                message,
                suggestion,
            } => (StatusCode::CONFLICT, message, suggestion),
            AppError::Unserviceable {
                message,
                suggestion,
            } => (StatusCode::UNPROCESSABLE_ENTITY, message, suggestion),
            AppError::Upstream {
                message,
                suggestion,
            } => (StatusCode::BAD_GATEWAY, message, suggestion),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "suggestion": suggestion,
        }));

        (status, body).into_response()
    }
}
