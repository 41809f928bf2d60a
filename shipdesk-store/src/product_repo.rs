use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use shipdesk_core::repository::StockRepository;

pub struct PgStockRepository {
    pool: PgPool,
}

impl PgStockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockRepository for PgStockRepository {
    async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2")
            .bind(delta)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
