use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{SearchClient, SearchError, SearchRequest, SearchResponse};

pub const SERPER_HOST: &str = "https://google.serper.dev";

#[derive(Debug, Clone)]
pub struct SerperConfig {
    pub host: String,
    pub api_key: String,
}

/// Google search through serper.dev
pub struct SerperClient {
    client: Client,
    config: SerperConfig,
}

impl SerperClient {
    pub fn new(config: SerperConfig) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    async fn post(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let url = format!("{}/search", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SearchClient for SerperClient {
    async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, SearchError> {
        tracing::info!(query = %request.q, num = request.num, "searching the web");
        tokio::select! {
            _ = cancel.cancelled() => Err(SearchError::Cancelled),
            response = self.post(request) => response,
        }
    }
}
