use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};
use crate::search::{SearchClient, SearchError, SearchRequest, SearchResult};
use crate::systems::System;

pub const SEARCH_WEB_TOOL: &str = "searchWeb";
pub const DEFAULT_NUM_RESULTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchWebArgs {
    query: String,
}

/// Gives the agent a single `searchWeb` tool backed by a [`SearchClient`]
pub struct WebSearchSystem {
    tools: Vec<Tool>,
    client: Arc<dyn SearchClient>,
    num_results: u32,
}

impl WebSearchSystem {
    pub fn new(client: Arc<dyn SearchClient>) -> Self {
        let search_tool = Tool::new(
            SEARCH_WEB_TOOL,
            "Search the web for up to date information. Returns the title, link and snippet of each result.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The query to search the web for"
                    }
                }
            }),
        );

        Self {
            tools: vec![search_tool],
            client,
            num_results: DEFAULT_NUM_RESULTS,
        }
    }

    pub fn with_num_results(mut self, num_results: u32) -> Self {
        self.num_results = num_results;
        self
    }

    async fn search_web(&self, args: Value, cancel: &CancellationToken) -> AgentResult<Value> {
        let args: SearchWebArgs = serde_json::from_value(args)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        let request = SearchRequest::new(args.query, self.num_results);
        let response = self
            .client
            .search(&request, cancel)
            .await
            .map_err(|e| match e {
                SearchError::Cancelled => AgentError::Cancelled(format!("search for '{}'", request.q)),
                other => AgentError::ExecutionError(other.to_string()),
            })?;

        let results: Vec<SearchResult> = response
            .organic
            .into_iter()
            .map(SearchResult::from)
            .collect();
        tracing::debug!(query = %request.q, results = results.len(), "search finished");

        serde_json::to_value(results).map_err(|e| AgentError::Internal(e.to_string()))
    }
}

#[async_trait]
impl System for WebSearchSystem {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web and returns organic results"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall, cancel: CancellationToken) -> AgentResult<Value> {
        match tool_call.name.as_str() {
            SEARCH_WEB_TOOL => self.search_web(tool_call.arguments, &cancel).await,
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}
