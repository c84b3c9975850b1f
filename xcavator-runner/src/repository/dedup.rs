//! Dedup oracle
//!
//! Answers "has this work item already been fully processed for this tenant?"
//! and records completion. Recording is idempotent: the same `(tenant, key)`
//! pair never produces a second fact and never errors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;
use xcavator_core::domain::tracker::Tracker;

/// Repository trait for dedup facts
///
/// Shared by the control loop (lookups) and every worker (records), so
/// implementations must tolerate concurrent calls.
#[async_trait]
pub trait DedupOracle: Send + Sync {
    /// Checks whether `key` was already processed for `tenant_id`
    async fn is_processed(&self, tenant_id: Uuid, key: &str) -> Result<bool>;

    /// Records `key` as processed for `tenant_id`
    async fn record(&self, tenant_id: Uuid, key: &str) -> Result<()>;
}

/// Postgres implementation backed by the `trackers` table
pub struct PgDedupOracle {
    pool: PgPool,
}

impl PgDedupOracle {
    /// Creates a new oracle over an existing pool
    ///
    /// The schema is expected to exist; see `db::run_migrations`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DedupOracle for PgDedupOracle {
    async fn is_processed(&self, tenant_id: Uuid, key: &str) -> Result<bool> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM trackers WHERE tenant_id = $1 AND url = $2 LIMIT 1")
                .bind(tenant_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to look up tracker")?;

        Ok(found.is_some())
    }

    async fn record(&self, tenant_id: Uuid, key: &str) -> Result<()> {
        let tracker = Tracker::new(tenant_id, key);

        let result = sqlx::query(
            r#"
            INSERT INTO trackers (id, tenant_id, url, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, url) DO NOTHING
            "#,
        )
        .bind(tracker.id)
        .bind(tracker.tenant_id)
        .bind(&tracker.key)
        .bind(tracker.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert tracker")?;

        if result.rows_affected() == 0 {
            tracing::debug!("Tracker for {} already present", key);
        } else {
            tracing::info!("Recorded tracker {} for {}", tracker.id, key);
        }

        Ok(())
    }
}

/// In-memory implementation
///
/// Facts live for the process lifetime only. Used when no database is
/// configured and in tests.
#[derive(Default)]
pub struct InMemoryDedupOracle {
    facts: Mutex<HashSet<(Uuid, String)>>,
}

impl InMemoryDedupOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded facts
    pub fn len(&self) -> usize {
        self.facts.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DedupOracle for InMemoryDedupOracle {
    async fn is_processed(&self, tenant_id: Uuid, key: &str) -> Result<bool> {
        let facts = self
            .facts
            .lock()
            .map_err(|_| anyhow::anyhow!("dedup facts lock poisoned"))?;
        Ok(facts.contains(&(tenant_id, key.to_string())))
    }

    async fn record(&self, tenant_id: Uuid, key: &str) -> Result<()> {
        let mut facts = self
            .facts
            .lock()
            .map_err(|_| anyhow::anyhow!("dedup facts lock poisoned"))?;
        facts.insert((tenant_id, key.to_string()));
        Ok(())
    }
}
