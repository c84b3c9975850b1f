//! Dedup record domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted "already processed" fact
///
/// Unique on `(tenant_id, key)`; recording the same pair twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

impl Tracker {
    pub fn new(tenant_id: Uuid, key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            key: key.into(),
            created_at: Utc::now(),
        }
    }
}
