use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Add the counts of another step, treating a missing count on either side as zero
    pub fn accumulate(&mut self, other: &Usage) {
        fn add(a: Option<i32>, b: Option<i32>) -> Option<i32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            }
        }
        self.input_tokens = add(self.input_tokens, other.input_tokens);
        self.output_tokens = add(self.output_tokens, other.output_tokens);
        self.total_tokens = add(self.total_tokens, other.total_tokens);
    }
}

/// One increment of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    /// A piece of assistant text
    Text(String),
    /// The model started producing a tool call
    ToolCallStart { id: String, name: String },
    /// A fragment of the JSON encoded arguments of a tool call
    ToolCallArgs { id: String, delta: String },
    /// The completion finished; carries the assembled message
    Done { message: Message, usage: Usage },
}

pub type CompletionStream<'a> = BoxStream<'a, Result<CompletionChunk>>;

/// Base trait for AI providers (OpenAI, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message using the configured model and other parameters
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)>;

    /// Stream the next message as it is generated. The last chunk is always `Done`.
    ///
    /// Providers without a streaming API get this for free: the whole completion is
    /// produced first and then replayed as chunks.
    fn stream<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        tools: &'a [Tool],
    ) -> CompletionStream<'a> {
        Box::pin(async_stream::try_stream! {
            let (message, usage) = self.complete(system, messages, tools).await?;
            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        if !text.text.is_empty() {
                            yield CompletionChunk::Text(text.text.clone());
                        }
                    }
                    MessageContent::ToolRequest(request) => {
                        if let Ok(tool_call) = &request.tool_call {
                            yield CompletionChunk::ToolCallStart {
                                id: request.id.clone(),
                                name: tool_call.name.clone(),
                            };
                            yield CompletionChunk::ToolCallArgs {
                                id: request.id.clone(),
                                delta: tool_call.arguments.to_string(),
                            };
                        }
                    }
                    MessageContent::ToolResponse(_) => {}
                }
            }
            yield CompletionChunk::Done { message, usage };
        })
    }
}
