//! Web search collaborators.
pub mod serper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Search cancelled")]
    Cancelled,
}

/// A query as sent to the search API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    pub num: u32,
}

impl SearchRequest {
    pub fn new<S: Into<String>>(q: S, num: u32) -> Self {
        Self { q: q.into(), num }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganicResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeopleAlsoAsk {
    pub question: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedSearch {
    pub query: String,
}

/// The parts of a search response we read. Anything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_box: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<Value>,
    #[serde(default)]
    pub people_also_ask: Vec<PeopleAlsoAsk>,
    #[serde(default)]
    pub related_searches: Vec<RelatedSearch>,
}

/// The projection of an organic result handed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

impl From<OrganicResult> for SearchResult {
    fn from(result: OrganicResult) -> Self {
        Self {
            title: result.title,
            link: result.link,
            snippet: result.snippet,
        }
    }
}

/// Trait for web search providers
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a search, giving up as soon as `cancel` fires
    async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, SearchError>;
}
