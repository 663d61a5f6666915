//! Messages as the chat interface sends them: a role plus an ordered list of typed parts.
use super::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    /// Flattened text of the message, sent by older clients that predate parts
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl UiMessage {
    /// Text parts joined together, falling back to `content` when there are no parts
    pub fn text(&self) -> String {
        if self.parts.is_empty() {
            return self.content.clone();
        }
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        tool_invocation: ToolInvocation,
    },
    Reasoning {
        reasoning: String,
        #[serde(default)]
        details: Vec<Value>,
    },
    Source {
        source: Value,
    },
    File {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
    StepStart,
    #[serde(other)]
    Unknown,
}

impl MessagePart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn tool_invocation(tool_invocation: ToolInvocation) -> Self {
        MessagePart::ToolInvocation { tool_invocation }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolInvocationState {
    PartialCall,
    Call,
    Result,
}

/// A model initiated tool call as seen by the interface. Only the `result` state carries a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ToolInvocation {
    PartialCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
    },
    Call {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
    },
    Result {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
        result: Value,
    },
}

impl ToolInvocation {
    pub fn state(&self) -> ToolInvocationState {
        match self {
            ToolInvocation::PartialCall { .. } => ToolInvocationState::PartialCall,
            ToolInvocation::Call { .. } => ToolInvocationState::Call,
            ToolInvocation::Result { .. } => ToolInvocationState::Result,
        }
    }

    pub fn tool_call_id(&self) -> &str {
        match self {
            ToolInvocation::PartialCall { tool_call_id, .. }
            | ToolInvocation::Call { tool_call_id, .. }
            | ToolInvocation::Result { tool_call_id, .. } => tool_call_id,
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            ToolInvocation::PartialCall { tool_name, .. }
            | ToolInvocation::Call { tool_name, .. }
            | ToolInvocation::Result { tool_name, .. } => tool_name,
        }
    }

    pub fn args(&self) -> &Value {
        match self {
            ToolInvocation::PartialCall { args, .. }
            | ToolInvocation::Call { args, .. }
            | ToolInvocation::Result { args, .. } => args,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            ToolInvocation::Result { result, .. } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_chat_message_parts() {
        let message: UiMessage = serde_json::from_value(json!({
            "id": "msg-1",
            "role": "assistant",
            "content": "Paris is sunny.",
            "parts": [
                {"type": "step-start"},
                {
                    "type": "tool-invocation",
                    "toolInvocation": {
                        "state": "result",
                        "step": 0,
                        "toolCallId": "call_1",
                        "toolName": "searchWeb",
                        "args": {"query": "weather in Paris"},
                        "result": [{"title": "Forecast", "link": "https://a", "snippet": "sun"}]
                    }
                },
                {"type": "reasoning", "reasoning": "thinking"},
                {"type": "source", "source": {"url": "https://a"}},
                {"type": "text", "text": "Paris is sunny."}
            ]
        }))
        .unwrap();

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.parts.len(), 5);
        assert_eq!(message.parts[0], MessagePart::StepStart);
        match &message.parts[1] {
            MessagePart::ToolInvocation { tool_invocation } => {
                assert_eq!(tool_invocation.state(), ToolInvocationState::Result);
                assert_eq!(tool_invocation.tool_call_id(), "call_1");
                assert_eq!(tool_invocation.tool_name(), "searchWeb");
                assert_eq!(tool_invocation.args(), &json!({"query": "weather in Paris"}));
                assert!(tool_invocation.result().is_some());
            }
            other => panic!("Expected tool invocation, got {:?}", other),
        }
        assert_eq!(message.text(), "Paris is sunny.");
    }

    #[test]
    fn test_call_state_has_no_result() {
        let invocation: ToolInvocation = serde_json::from_value(json!({
            "state": "call",
            "toolCallId": "call_2",
            "toolName": "searchWeb",
            "args": {"query": "rust"}
        }))
        .unwrap();

        assert_eq!(invocation.state(), ToolInvocationState::Call);
        assert!(invocation.result().is_none());
    }

    #[test]
    fn test_unknown_part_kind() {
        let part: MessagePart =
            serde_json::from_value(json!({"type": "data-widget", "data": 1})).unwrap();
        assert_eq!(part, MessagePart::Unknown);
    }

    #[test]
    fn test_legacy_content_without_parts() {
        let message: UiMessage =
            serde_json::from_value(json!({"role": "user", "content": "hello"})).unwrap();
        assert!(message.parts.is_empty());
        assert_eq!(message.text(), "hello");
    }
}
