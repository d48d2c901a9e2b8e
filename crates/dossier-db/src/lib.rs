//! # dossier-db
//!
//! PostgreSQL database layer for dossier.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for orders, partners, and attachments
//! - The merge synchronizer that keeps derived merged artifacts consistent
//!
//! ## Example
//!
//! ```rust,ignore
//! use dossier_db::Database;
//! use dossier_core::CreateOrderRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/dossier").await?;
//!
//!     let order_id = db.orders.insert(CreateOrderRequest {
//!         reference: "PO-2026-0001".to_string(),
//!         partner_id: None,
//!     }).await?;
//!
//!     db.merge.sync_order(order_id).await?;
//!     Ok(())
//! }
//! ```

pub mod attachments;
pub mod merge_sync;
pub mod orders;
pub mod partners;
pub mod pool;

// Re-export core types
pub use dossier_core::*;

// Re-export repository implementations
pub use attachments::PgAttachmentRepository;
pub use merge_sync::{MergeSynchronizer, SyncAction, SyncReport};
pub use orders::PgOrderRepository;
pub use partners::PgPartnerRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Purchase order repository.
    pub orders: PgOrderRepository,
    /// Attachment repository.
    pub attachments: PgAttachmentRepository,
    /// Partner repository.
    pub partners: PgPartnerRepository,
    /// Merge synchronizer for derived merged artifacts.
    pub merge: MergeSynchronizer,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            orders: PgOrderRepository::new(pool.clone()),
            attachments: PgAttachmentRepository::new(pool.clone()),
            partners: PgPartnerRepository::new(pool.clone()),
            merge: MergeSynchronizer::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
