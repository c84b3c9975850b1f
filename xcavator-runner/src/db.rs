//! Postgres connection and schema

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // One row per (tenant, work item) that was fully processed
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trackers (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL,
            url TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            CONSTRAINT tenant_url_uc UNIQUE (tenant_id, url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trackers_tenant_id ON trackers(tenant_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
