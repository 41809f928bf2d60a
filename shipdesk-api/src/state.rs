use std::sync::Arc;

use shipdesk_core::repository::OrderRepository;
use shipdesk_order::{ShipmentOrchestrator, WebhookReconciler};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub orchestrator: Arc<ShipmentOrchestrator>,
    pub reconciler: Arc<WebhookReconciler>,
}
