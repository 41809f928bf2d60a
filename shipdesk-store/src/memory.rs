use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use shipdesk_core::order::Order;
use shipdesk_core::repository::{OrderRepository, StockRepository};

/// In-memory order store used by the test suites and local development.
#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order.id)
    }

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn find_by_tracking_id(
        &self,
        tracking_id: &str,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.tracking_id.as_deref() == Some(tracking_id))
            .cloned())
    }

    async fn save_order(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn list_orders(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| customer_id.is_empty() || o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

/// In-memory stock counters keyed by product id.
#[derive(Default)]
pub struct MemoryStockRepository {
    stock: RwLock<HashMap<Uuid, i64>>,
}

impl MemoryStockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_stock(&self, product_id: Uuid, quantity: i64) {
        self.stock.write().await.insert(product_id, quantity);
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i64 {
        self.stock.read().await.get(&product_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StockRepository for MemoryStockRepository {
    async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut stock = self.stock.write().await;
        *stock.entry(product_id).or_insert(0) += delta;
        Ok(())
    }
}
