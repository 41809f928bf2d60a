use async_trait::async_trait;

use crate::order::{Order, OrderStatus};

/// Fire-and-forget customer notification dispatch. Failures are logged by
/// callers and never block order or shipment state changes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_status_changed(
        &self,
        order: &Order,
        status: OrderStatus,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Default notifier that records the dispatch in the log stream; the real
/// mail gateway is an external collaborator.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_status_changed(
        &self,
        order: &Order,
        status: OrderStatus,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            order_number = %order.order_number,
            customer = %order.customer_id,
            %status,
            "notification dispatched"
        );
        Ok(())
    }
}
