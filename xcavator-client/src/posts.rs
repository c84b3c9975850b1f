//! Post publishing endpoints

use crate::SocialsClient;
use crate::error::{ClientError, Result};
use tracing::debug;
use uuid::Uuid;
use xcavator_core::dto::post::{CreatePost, PostReceipt};

impl SocialsClient {
    // =============================================================================
    // Publishing
    // =============================================================================

    /// Publish a post on behalf of a tenant
    ///
    /// # Arguments
    /// * `tenant_id` - Tenant whose platform credentials are used
    /// * `post` - Body, media attachments and target platform
    ///
    /// # Returns
    /// The platform receipt for the created post
    ///
    /// # Example
    /// ```no_run
    /// # use xcavator_client::SocialsClient;
    /// # use xcavator_core::dto::post::CreatePost;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = SocialsClient::new("http://127.0.0.1:8081");
    /// let receipt = client
    ///     .create_post(
    ///         uuid::Uuid::new_v4(),
    ///         &CreatePost {
    ///             post_body: "Hello".to_string(),
    ///             medias: vec!["/tmp/reel.mp4".to_string()],
    ///             platform: "youtube".to_string(),
    ///         },
    ///     )
    ///     .await?;
    /// println!("Posted {}", receipt.post_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_post(&self, tenant_id: Uuid, post: &CreatePost) -> Result<PostReceipt> {
        if post.medias.is_empty() {
            return Err(ClientError::InvalidRequest(
                "a post needs at least one media attachment".to_string(),
            ));
        }

        let url = format!("{}/tenants/socials/post", self.base_url);
        debug!("Publishing post for tenant {} on {}", tenant_id, post.platform);

        let response = self
            .client
            .post(&url)
            .query(&[("tenant_id", tenant_id.to_string())])
            .json(post)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Health
    // =============================================================================

    /// Check whether the socials service is reachable
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health-check", self.base_url);
        let response = self.client.get(&url).send().await?;

        Ok(response.status().is_success())
    }
}
