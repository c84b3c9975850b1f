//! Post DTOs

use serde::{Deserialize, Serialize};

/// Request to publish a post on a social platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    /// Caption / description of the post
    pub post_body: String,

    /// Local paths or URLs of the attached media
    pub medias: Vec<String>,

    /// Target platform (e.g. "youtube")
    pub platform: String,
}

/// Receipt returned by the platform after a successful post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReceipt {
    pub platform: String,
    pub post_id: String,
    #[serde(default)]
    pub post_content: serde_json::Value,
}
