use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{FoodCandidate, FoodDatabase};

/// USDA FoodData Central search client.
#[derive(Clone)]
pub struct UsdaClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<FoodCandidate>,
}

impl UsdaClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FoodDatabase for UsdaClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, page_size: u32) -> anyhow::Result<Vec<FoodCandidate>> {
        let url = format!("{}/foods/search", self.base_url.trim_end_matches('/'));
        let page_size = page_size.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .context("usda search request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("USDA API error: HTTP {status}");
        }

        let body: SearchResponse = response.json().await.context("usda search body")?;
        debug!(count = body.foods.len(), "usda candidates");
        Ok(body.foods)
    }
}
