use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::job::GenImageJob;

pub mod queries;

pub use queries::PgJobStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Persistence for generation jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `GENERATING_IMAGE` job keyed by identity, replacing any
    /// record already stored under that key.
    async fn create_job(&self, identity: &str, prompt: &str) -> Result<GenImageJob, StoreError>;

    /// Atomically move the identity-keyed job to `identity->image_url` in
    /// `WAITING_FOR_APPROVAL`, keeping its prompt and creation time.
    async fn promote_job(&self, identity: &str, image_url: &str)
        -> Result<GenImageJob, StoreError>;

    /// Record that the job under `key` will not complete.
    async fn mark_failed(&self, key: &str, reason: &str) -> Result<(), StoreError>;

    /// The most recently modified job for an identity, across all keys.
    async fn most_recent_job(&self, identity: &str) -> Result<Option<GenImageJob>, StoreError>;

    /// Check store connectivity (for health checks).
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No job found for key {0}")]
    NotFound(String),

    #[error("Corrupt job record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
