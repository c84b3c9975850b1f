//! Publishing
//!
//! Posts the rendered media through the socials service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;
use xcavator_client::SocialsClient;
use xcavator_core::dto::post::{CreatePost, PostReceipt};

/// Service trait for publishing a post
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `post` for `tenant_id`
    async fn publish(&self, tenant_id: Uuid, post: &CreatePost) -> Result<PostReceipt>;
}

/// Publisher backed by the socials HTTP service
pub struct SocialsPublisher {
    client: SocialsClient,
}

impl SocialsPublisher {
    pub fn new(client: SocialsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for SocialsPublisher {
    async fn publish(&self, tenant_id: Uuid, post: &CreatePost) -> Result<PostReceipt> {
        self.client
            .create_post(tenant_id, post)
            .await
            .with_context(|| format!("Failed to publish on {}", post.platform))
    }
}
