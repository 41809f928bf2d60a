use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use shipdesk_core::order::Order;
use shipdesk_core::repository::OrderRepository;

/// Postgres-backed order store. The full order document lives in a JSONB
/// column; the identifiers the lookups need are denormalized alongside it.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    doc: serde_json::Value,
}

fn order_from_row(row: OrderRow) -> Result<Order, Box<dyn std::error::Error + Send + Sync>> {
    Ok(serde_json::from_value(row.doc)?)
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let doc = serde_json::to_value(order)?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, order_status, tracking_id, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(order.order_status.as_str())
        .bind(&order.tracking_id)
        .bind(doc)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(order.id)
    }

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT doc FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(order_from_row).transpose()
    }

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT doc FROM orders WHERE order_number = $1")
                .bind(order_number)
                .fetch_optional(&self.pool)
                .await?;
        row.map(order_from_row).transpose()
    }

    async fn find_by_tracking_id(
        &self,
        tracking_id: &str,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT doc FROM orders WHERE tracking_id = $1")
                .bind(tracking_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(order_from_row).transpose()
    }

    async fn save_order(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let doc = serde_json::to_value(order)?;
        sqlx::query(
            r#"
            UPDATE orders
            SET order_status = $1, tracking_id = $2, doc = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(order.order_status.as_str())
        .bind(&order.tracking_id)
        .bind(doc)
        .bind(order.updated_at)
        .bind(order.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_orders(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>> {
        // An empty customer id lists every order (the staff view)
        let rows: Vec<OrderRow> = if customer_id.is_empty() {
            sqlx::query_as("SELECT doc FROM orders ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as(
                "SELECT doc FROM orders WHERE customer_id = $1 ORDER BY created_at DESC",
            )
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(order_from_row).collect()
    }
}
