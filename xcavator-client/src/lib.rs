//! Xcavator Socials Client
//!
//! A small, type-safe HTTP client for the socials publishing service that
//! posts rendered media on a tenant's platforms.
//!
//! # Example
//!
//! ```no_run
//! use xcavator_client::SocialsClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SocialsClient::new("http://127.0.0.1:8081");
//! if client.health().await? {
//!     println!("Socials service is up at {}", client.base_url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod posts;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the socials publishing API
#[derive(Debug, Clone)]
pub struct SocialsClient {
    /// Base URL of the service (e.g., "http://127.0.0.1:8081")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl SocialsClient {
    /// Create a new socials client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the socials API (e.g., "http://127.0.0.1:8081")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new socials client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use xcavator_client::SocialsClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = SocialsClient::with_client("http://127.0.0.1:8081", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Checks the HTTP status, then the body's own `status` field, before
    /// deserializing into `T`.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))?;

        parse_body(body)
    }
}

/// Rejects bodies that report an error status, then deserializes the rest
fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    if let Some(code) = body.get("status").and_then(|s| s.as_u64()) {
        if code >= 400 {
            let status = u16::try_from(code).map_err(|_| {
                ClientError::ParseError(format!("Body status {} is out of range", code))
            })?;
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            return Err(ClientError::api_error(status, message));
        }
    }

    serde_json::from_value(body)
        .map_err(|e| ClientError::ParseError(format!("Unexpected response shape: {}", e)))
}
