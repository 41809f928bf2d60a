use chrono::Utc;

use shipdesk_core::order::{Order, OrderStatus, StatusEntry};
use shipdesk_core::repository::StockRepository;

/// Who is driving a transition. The webhook path gets the duplicate-absorb
/// exception because carriers resend events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    System,
    Admin,
    Customer,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// History entry appended, status updated
    Applied,
    /// Repeated push of the current status, silently swallowed
    Absorbed,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order is already {status}")]
    DuplicateStatus { status: OrderStatus },
}

/// The single transition guard every status change goes through.
///
/// `tracking_changed` lets a same-status write through when the canonical
/// tracking pair was rewritten (e.g. a manual re-entry), so the history
/// records the identifier change.
pub fn apply_transition(
    order: &mut Order,
    new_status: OrderStatus,
    note: Option<String>,
    source: TransitionSource,
    tracking_changed: bool,
) -> Result<TransitionOutcome, LifecycleError> {
    let current = order.order_status;

    if current == OrderStatus::Delivered && new_status == OrderStatus::Cancelled {
        return Err(LifecycleError::InvalidTransition {
            from: current,
            to: new_status,
        });
    }

    if new_status == current && !tracking_changed {
        if source == TransitionSource::Webhook {
            return Ok(TransitionOutcome::Absorbed);
        }
        return Err(LifecycleError::DuplicateStatus { status: current });
    }

    order.status_history.push(StatusEntry {
        status: new_status,
        at: Utc::now(),
        note,
    });
    order.order_status = new_status;
    order.touch();
    Ok(TransitionOutcome::Applied)
}

/// Put every line item's quantity back on its product. Callers gate this on
/// the pre-transition status so a retried cancellation restocks exactly once.
pub async fn restock_items(
    stock: &dyn StockRepository,
    order: &Order,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    for item in &order.items {
        stock.adjust_stock(item.product_id, item.quantity as i64).await?;
    }
    Ok(())
}
