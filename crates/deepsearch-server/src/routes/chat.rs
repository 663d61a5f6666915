use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{Html, IntoResponse},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use deepsearch::{
    agent::{FinishReason, ReplyEvent},
    models::message::Message,
    models::role::Role,
    models::tool::ToolCall,
    models::ui::{MessagePart, ToolInvocation, UiMessage},
    providers::base::Usage,
};
use futures::{stream::StreamExt, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// The only error detail a client ever sees
pub const STREAM_ERROR_MESSAGE: &str = "Oops, an error occured!";

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<UiMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest {
    role: Role,
    user_name: String,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

/// Streaming body speaking the AI SDK data stream protocol
pub struct DataStreamResponse {
    rx: ReceiverStream<String>,
}

impl DataStreamResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for DataStreamResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for DataStreamResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
                (HeaderName::from_static("x-vercel-ai-data-stream"), "v1"),
            ],
            body,
        )
            .into_response()
    }
}

// Convert incoming UI messages to our internal Message type
fn convert_messages(incoming: &[UiMessage]) -> Vec<Message> {
    let mut messages = Vec::new();

    for msg in incoming {
        match msg.role {
            Role::User => messages.push(Message::user().with_text(msg.text())),
            Role::System => messages.push(Message::system().with_text(msg.text())),
            Role::Assistant => {
                if msg.parts.is_empty() {
                    if !msg.content.is_empty() {
                        messages.push(Message::assistant().with_text(msg.content.clone()));
                    }
                    continue;
                }

                // Text accumulates until a finished tool invocation closes the message
                let mut pending = Message::assistant();
                for part in &msg.parts {
                    match part {
                        MessagePart::Text { text } => {
                            pending = pending.with_text(text.clone());
                        }
                        MessagePart::ToolInvocation {
                            tool_invocation:
                                ToolInvocation::Result {
                                    tool_call_id,
                                    tool_name,
                                    args,
                                    result,
                                    ..
                                },
                        } => {
                            let tool_call = ToolCall::new(tool_name.clone(), args.clone());
                            let request = std::mem::replace(&mut pending, Message::assistant())
                                .with_tool_request(tool_call_id.clone(), Ok(tool_call));
                            messages.push(request);
                            messages.push(
                                Message::user()
                                    .with_tool_response(tool_call_id.clone(), Ok(result.clone())),
                            );
                        }
                        _ => {}
                    }
                }
                if !pending.content.is_empty() {
                    messages.push(pending);
                }
            }
        }
    }

    messages
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_event(event: &ReplyEvent) -> String {
        match event {
            ReplyEvent::StepStart { message_id } => Self::format_step_start(message_id),
            ReplyEvent::TextDelta(text) => Self::format_text(text),
            ReplyEvent::ToolCallStart { id, name } => Self::format_tool_call_start(id, name),
            ReplyEvent::ToolCallDelta { id, delta } => Self::format_tool_call_delta(id, delta),
            ReplyEvent::ToolCall {
                id,
                name,
                arguments,
            } => Self::format_tool_call(id, name, arguments),
            ReplyEvent::ToolResult { id, result } => Self::format_tool_response(id, result),
            ReplyEvent::StepFinish {
                reason,
                usage,
                is_continued,
            } => Self::format_step_finish(*reason, usage, *is_continued),
            ReplyEvent::Finish { reason, usage } => Self::format_finish(*reason, usage),
        }
    }

    fn format_step_start(message_id: &str) -> String {
        format!("f:{}\n", json!({ "messageId": message_id }))
    }

    fn format_text(text: &str) -> String {
        format!("0:{}\n", Value::String(text.to_string()))
    }

    fn format_tool_call_start(id: &str, name: &str) -> String {
        format!("b:{}\n", json!({ "toolCallId": id, "toolName": name }))
    }

    fn format_tool_call_delta(id: &str, delta: &str) -> String {
        format!("c:{}\n", json!({ "toolCallId": id, "argsTextDelta": delta }))
    }

    fn format_tool_call(id: &str, name: &str, args: &Value) -> String {
        let tool_call = json!({
            "toolCallId": id,
            "toolName": name,
            "args": args
        });
        format!("9:{}\n", tool_call)
    }

    fn format_tool_response(id: &str, result: &Value) -> String {
        let response = json!({
            "toolCallId": id,
            "result": result,
        });
        format!("a:{}\n", response)
    }

    fn format_step_finish(reason: FinishReason, usage: &Usage, is_continued: bool) -> String {
        let finish = json!({
            "finishReason": reason,
            "usage": Self::usage(usage),
            "isContinued": is_continued,
        });
        format!("e:{}\n", finish)
    }

    fn format_finish(reason: FinishReason, usage: &Usage) -> String {
        let finish = json!({
            "finishReason": reason,
            "usage": Self::usage(usage),
        });
        format!("d:{}\n", finish)
    }

    fn format_error(message: &str) -> String {
        format!("3:{}\n", Value::String(message.to_string()))
    }

    fn usage(usage: &Usage) -> Value {
        json!({
            "promptTokens": usage.input_tokens.unwrap_or(0),
            "completionTokens": usage.output_tokens.unwrap_or(0),
        })
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<DataStreamResponse, (StatusCode, &'static str)> {
    let session = state.authenticator.session(&headers).await;
    let Some(user) = session.and_then(|session| session.user) else {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };
    // The body is only read once the caller is known
    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(user = %user.name, "rejecting chat request: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid chat request")
    })?;
    tracing::info!(
        user = %user.name,
        messages = request.messages.len(),
        "starting chat turn"
    );

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let agent = state.agent();
    let messages = convert_messages(&request.messages);
    let cancel = CancellationToken::new();

    // Spawn task to handle streaming
    tokio::spawn(async move {
        let mut stream = agent.reply(&messages, cancel.clone());

        loop {
            tokio::select! {
                response = stream.next() => {
                    match response {
                        Some(Ok(event)) => {
                            if let Err(e) = tx.send(ProtocolFormatter::format_event(&event)).await {
                                tracing::error!("Error sending message through channel: {}", e);
                                cancel.cancel();
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("Error processing message: {:#}", e);
                            let _ = tx
                                .send(ProtocolFormatter::format_error(STREAM_ERROR_MESSAGE))
                                .await;
                            break;
                        }
                        None => break,
                    }
                }
                _ = tx.closed() => {
                    // The client went away; stop the agent and any running searches
                    tracing::info!("client disconnected, cancelling chat turn");
                    cancel.cancel();
                    break;
                }
            }
        }
    });

    Ok(DataStreamResponse::new(stream))
}

async fn render_handler(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Html<String>, StatusCode> {
    state
        .renderer
        .render(request.role, &request.user_name, &request.parts)
        .map(Html)
        .map_err(|e| {
            tracing::error!("Failed to render message: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .route("/api/chat/render", post(render_handler))
        .with_state(state)
}
