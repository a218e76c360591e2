//! HTTP client for the photo listing API.
//!
//! The listing endpoint is `GET {base}/list?page=N&limit=M` and returns a JSON
//! array of [`Product`] records. The API carries no pagination metadata, so
//! callers decide when to stop (see `FeedController`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_data::app_data;

/// User agent for API requests
const USER_AGENT: &str = concat!("photofeed/", env!("CARGO_PKG_VERSION"));

/// A photo entry from the listing API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub author: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub download_url: String,
}

/// Errors from a listing request
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server responded with {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid listing response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Listing API client
#[derive(Clone)]
pub struct PicsumClient {
    client: reqwest::Client,
    base_url: String,
}

impl PicsumClient {
    /// Create a client for the given API base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// URL of one listing page
    pub fn list_url(&self, page: u32, limit: u32) -> String {
        format!(
            "{}/{}?page={}&limit={}",
            self.base_url,
            app_data().api.list_path,
            page,
            limit
        )
    }

    /// Fetch one page of products.
    ///
    /// Non-success statuses are errors. The body is decoded separately from
    /// the transfer so a malformed payload reports as [`FeedError::Parse`].
    pub async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Product>, FeedError> {
        let start = std::time::Instant::now();
        let url = self.list_url(page, limit);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }

        let body = response.bytes().await?;
        let products: Vec<Product> = serde_json::from_slice(&body)?;

        tracing::info!(
            "Fetched page {} ({} products) in {:.1}s",
            page,
            products.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(products)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Product;

    /// Build a product whose fields are derived from its id
    pub fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            author: format!("Author {}", id),
            width: 100,
            height: 100,
            url: format!("u{}", id),
            download_url: format!("d{}", id),
        }
    }
}
