use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{CompletionChunk, CompletionStream, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
    openai_usage, tools_to_openai_spec, SseDecoder, StreamAccumulator,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        // Convert messages and tools to OpenAI format
        let messages_spec = messages_to_openai_spec(messages);
        let tools_spec = if !tools.is_empty() {
            tools_to_openai_spec(tools)?
        } else {
            vec![]
        };

        // create messages array with system message first
        let mut messages_array = vec![system_message];
        messages_array.extend(messages_spec);

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        // Add optional parameters
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        Ok(payload)
    }

    async fn send(&self, payload: &Value) -> Result<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(err) = body
                    .get("error")
                    .and_then(check_openai_context_length_error)
                {
                    return Err(err.into());
                }
                Err(anyhow!("Request failed: {}\nResponse: {}", status, body))
            }
        }
    }
}

fn check_error(response: &Value) -> Result<()> {
    if let Some(error) = response.get("error").filter(|error| !error.is_null()) {
        if let Some(err) = check_openai_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("OpenAI API error: {}", error));
    }
    Ok(())
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let payload = self.build_payload(system, messages, tools)?;
        let response: Value = self.send(&payload).await?.json().await?;

        check_error(&response)?;

        let message = openai_response_to_message(response.clone())?;
        let usage = openai_usage(&response).unwrap_or_default();

        Ok((message, usage))
    }

    fn stream<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        tools: &'a [Tool],
    ) -> CompletionStream<'a> {
        Box::pin(async_stream::try_stream! {
            let mut payload = self.build_payload(system, messages, tools)?;
            payload["stream"] = json!(true);
            payload["stream_options"] = json!({"include_usage": true});

            let response = self.send(&payload).await?;
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::default();
            let mut accumulator = StreamAccumulator::default();

            'read: while let Some(bytes) = body.next().await {
                let bytes = bytes?;
                for data in decoder.push(&bytes) {
                    if data == "[DONE]" {
                        break 'read;
                    }
                    let chunk: Value = serde_json::from_str(&data)?;
                    check_error(&chunk)?;
                    for event in accumulator.push(&chunk)? {
                        yield event;
                    }
                }
            }

            let (message, usage) = accumulator.finish()?;
            tracing::debug!(?usage, "completion stream finished");
            yield CompletionChunk::Done { message, usage };
        })
    }
}
