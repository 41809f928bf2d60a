use async_trait::async_trait;
use uuid::Uuid;

use crate::order::Order;

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>>;

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>>;

    async fn find_by_tracking_id(
        &self,
        tracking_id: &str,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// Write back the order's mutable fulfillment state (status, canonical
    /// tracking pair, sub-records, history, payment status).
    async fn save_order(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn list_orders(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Product stock adjustment, consumed as a collaborator interface
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Positive delta restocks, negative delta consumes
    async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
