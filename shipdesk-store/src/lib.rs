pub mod app_config;
pub mod database;
pub mod memory;
pub mod order_repo;
pub mod product_repo;

pub use database::DbClient;
pub use memory::{MemoryOrderRepository, MemoryStockRepository};
pub use order_repo::PgOrderRepository;
pub use product_repo::PgStockRepository;
