use anyhow::{anyhow, Result};
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::{CompletionChunk, Provider, Usage};
use crate::systems::System;

/// Upper bound on model calls in one reply
pub const DEFAULT_MAX_STEPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
}

/// What the agent produces while it works on a reply, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    StepStart {
        message_id: String,
    },
    TextDelta(String),
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCallDelta {
        id: String,
        delta: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: String,
        result: Value,
    },
    StepFinish {
        reason: FinishReason,
        usage: Usage,
        is_continued: bool,
    },
    Finish {
        reason: FinishReason,
        usage: Usage,
    },
}

/// Agent integrates a foundational LLM with the systems it needs to pilot
pub struct Agent {
    systems: Vec<Box<dyn System>>,
    provider: Arc<dyn Provider>,
    system_prompt: String,
    max_steps: usize,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            systems: Vec::new(),
            provider,
            system_prompt: String::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Add a system to the agent
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Every tool offered by every system
    pub fn tools(&self) -> Vec<Tool> {
        self.systems
            .iter()
            .flat_map(|system| system.tools().iter().cloned())
            .collect()
    }

    fn get_system_for_tool(&self, tool_name: &str) -> Option<&dyn System> {
        self.systems
            .iter()
            .find(|system| system.tools().iter().any(|tool| tool.name == tool_name))
            .map(|system| system.as_ref())
    }

    /// Dispatch a single tool call to the appropriate system
    async fn dispatch_tool_call(
        &self,
        tool_call: AgentResult<ToolCall>,
        cancel: CancellationToken,
    ) -> AgentResult<Value> {
        let call = tool_call?;
        let system = self
            .get_system_for_tool(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tracing::debug!(system = system.name(), tool = %call.name, "calling tool");
        system.call(call, cancel).await
    }

    /// Create a stream of everything the agent does for one reply: streamed model output,
    /// tool calls and their results, step boundaries and the final finish event.
    ///
    /// The reply stops early, without a finish event, once `cancel` fires. A failed
    /// tool call ends the stream with an error.
    pub fn reply<'a>(
        &'a self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<ReplyEvent>> {
        let mut messages = messages.to_vec();

        Box::pin(async_stream::try_stream! {
            let tools = self.tools();
            let mut total_usage = Usage::default();
            let mut reason = FinishReason::Stop;

            for step in 0..self.max_steps {
                if cancel.is_cancelled() {
                    tracing::debug!(step, "reply cancelled");
                    break;
                }

                yield ReplyEvent::StepStart {
                    message_id: format!("msg-{}", Uuid::new_v4()),
                };

                let (response, usage) = {
                    let mut chunks = self.provider.stream(&self.system_prompt, &messages, &tools);
                    let mut done = None;
                    while let Some(chunk) = chunks.next().await {
                        match chunk? {
                            CompletionChunk::Text(text) => {
                                yield ReplyEvent::TextDelta(text);
                            }
                            CompletionChunk::ToolCallStart { id, name } => {
                                yield ReplyEvent::ToolCallStart { id, name };
                            }
                            CompletionChunk::ToolCallArgs { id, delta } => {
                                yield ReplyEvent::ToolCallDelta { id, delta };
                            }
                            CompletionChunk::Done { message, usage } => {
                                done = Some((message, usage));
                            }
                        }
                    }
                    done.ok_or_else(|| anyhow!("completion stream ended without a message"))?
                };
                total_usage.accumulate(&usage);

                let tool_requests: Vec<ToolRequest> =
                    response.tool_requests().into_iter().cloned().collect();

                if tool_requests.is_empty() {
                    // No more tool calls, end the reply loop
                    reason = FinishReason::Stop;
                    yield ReplyEvent::StepFinish { reason, usage, is_continued: false };
                    break;
                }

                for request in &tool_requests {
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (tool_call.name.clone(), tool_call.arguments.clone()),
                        // an invalid call is still reported; dispatching it ends the reply
                        Err(_) => ("invalid name".to_string(), json!({})),
                    };
                    yield ReplyEvent::ToolCall { id: request.id.clone(), name, arguments };
                }

                tracing::debug!(step, count = tool_requests.len(), "dispatching tool calls");
                let futures: Vec<_> = tool_requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(request.tool_call.clone(), cancel.clone()))
                    .collect();

                // Process all the futures in parallel but wait until all are finished
                let outputs = futures::future::join_all(futures).await;
                if cancel.is_cancelled() {
                    tracing::debug!(step, "reply cancelled during tool calls");
                    break;
                }

                let mut results = Vec::with_capacity(outputs.len());
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    let value =
                        output.map_err(|e| anyhow!("tool call {} failed: {}", request.id, e))?;
                    results.push((request.id.clone(), value));
                }

                let mut message_tool_response = Message::user();
                for (id, result) in results {
                    yield ReplyEvent::ToolResult { id: id.clone(), result: result.clone() };
                    message_tool_response = message_tool_response.with_tool_response(id, Ok(result));
                }

                reason = FinishReason::ToolCalls;
                yield ReplyEvent::StepFinish { reason, usage, is_continued: false };

                messages.push(response);
                messages.push(message_tool_response);
            }

            if !cancel.is_cancelled() {
                yield ReplyEvent::Finish { reason, usage: total_usage };
            }
        })
    }
}
