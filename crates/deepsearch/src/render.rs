//! Server side rendering of chat messages to HTML.
//!
//! Text parts go through markdown with the chat's element styling, tool invocations
//! get a small status card, everything else is skipped.
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Parser, Tag, TagEnd};
use pulldown_cmark_escape::{escape_href, escape_html};
use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};
use thiserror::Error;

use crate::models::role::Role;
use crate::models::ui::{MessagePart, ToolInvocation, ToolInvocationState};

const MESSAGE_TEMPLATE: &str = include_str!("templates/message.html");
const TOOL_INVOCATION_TEMPLATE: &str = include_str!("templates/tool_invocation.html");

const SAFE_SCHEMES: [&str; 7] = ["http", "https", "irc", "ircs", "mailto", "tel", "xmpp"];

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct MessageContext<'a> {
    is_ai: bool,
    user_name: &'a str,
    has_parts: bool,
    parts: Vec<String>,
}

#[derive(Serialize)]
struct ToolInvocationContext<'a> {
    tool_name: &'a str,
    state_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
}

pub struct MessageRenderer {
    tera: Tera,
}

impl MessageRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        // `.html` names keep tera's autoescaping on
        tera.add_raw_templates(vec![
            ("message.html", MESSAGE_TEMPLATE),
            ("tool_invocation.html", TOOL_INVOCATION_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    /// Render one chat message. The header reads `AI` for the assistant and
    /// `user_name` for everyone else.
    pub fn render(
        &self,
        role: Role,
        user_name: &str,
        parts: &[MessagePart],
    ) -> Result<String, RenderError> {
        let rendered = parts
            .iter()
            .map(|part| self.render_part(part))
            .collect::<Result<Vec<_>, _>>()?;

        let context = Context::from_serialize(MessageContext {
            is_ai: role == Role::Assistant,
            user_name,
            has_parts: !parts.is_empty(),
            parts: rendered.into_iter().filter(|html| !html.is_empty()).collect(),
        })?;
        Ok(self.tera.render("message.html", &context)?)
    }

    /// Render a single part; unsupported kinds produce an empty string
    pub fn render_part(&self, part: &MessagePart) -> Result<String, RenderError> {
        match part {
            MessagePart::Text { text } => Ok(render_markdown(text)),
            MessagePart::ToolInvocation { tool_invocation } => {
                self.render_tool_invocation(tool_invocation)
            }
            MessagePart::Reasoning { .. }
            | MessagePart::Source { .. }
            | MessagePart::File { .. }
            | MessagePart::StepStart
            | MessagePart::Unknown => Ok(String::new()),
        }
    }

    fn render_tool_invocation(&self, invocation: &ToolInvocation) -> Result<String, RenderError> {
        let state = invocation.state();
        let state_label = match state {
            ToolInvocationState::PartialCall => "⏳ Calling...",
            ToolInvocationState::Call => "✓ Called",
            ToolInvocationState::Result => "📊 Result",
        };

        let args = match (state, invocation.args()) {
            (ToolInvocationState::Result, _) | (_, Value::Null) => None,
            (_, args) => Some(serde_json::to_string_pretty(args)?),
        };
        let result = match invocation.result() {
            Some(Value::String(text)) => Some(text.clone()),
            Some(value) => Some(serde_json::to_string_pretty(value)?),
            None => None,
        };

        let context = Context::from_serialize(ToolInvocationContext {
            tool_name: invocation.tool_name(),
            state_label,
            args,
            result,
        })?;
        Ok(self.tera.render("tool_invocation.html", &context)?)
    }
}

/// Markdown to HTML with the chat's styling. Raw HTML in the source is escaped.
pub fn render_markdown(text: &str) -> String {
    let events = Parser::new(text).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Paragraph) => {
            Event::Html(r#"<p class="mb-4 first:mt-0 last:mb-0">"#.into())
        }
        Event::End(TagEnd::Paragraph) => Event::Html("</p>\n".into()),
        Event::Start(Tag::List(None)) => {
            Event::Html("<ul class=\"mb-4 list-disc pl-4\">\n".into())
        }
        Event::Start(Tag::List(Some(1))) => {
            Event::Html("<ol class=\"mb-4 list-decimal pl-4\">\n".into())
        }
        Event::Start(Tag::List(Some(start))) => Event::Html(
            format!("<ol class=\"mb-4 list-decimal pl-4\" start=\"{}\">\n", start).into(),
        ),
        Event::End(TagEnd::List(true)) => Event::Html("</ol>\n".into()),
        Event::End(TagEnd::List(false)) => Event::Html("</ul>\n".into()),
        Event::Start(Tag::Item) => Event::Html(r#"<li class="mb-1">"#.into()),
        Event::End(TagEnd::Item) => Event::Html("</li>\n".into()),
        Event::Start(Tag::CodeBlock(kind)) => {
            let language = match &kind {
                CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
                CodeBlockKind::Indented => None,
            };
            let code = match language {
                Some(lang) => format!(r#"<code class="language-{}">"#, escape_attr(lang)),
                None => "<code>".to_string(),
            };
            Event::Html(
                format!(
                    r#"<pre class="mb-4 overflow-x-auto rounded-lg bg-gray-700 p-4">{}"#,
                    code
                )
                .into(),
            )
        }
        Event::End(TagEnd::CodeBlock) => Event::Html("</code></pre>\n".into()),
        Event::Start(Tag::Link {
            dest_url, title, ..
        }) => {
            let title = if title.is_empty() {
                String::new()
            } else {
                format!(r#" title="{}""#, escape_attr(&title))
            };
            Event::InlineHtml(
                format!(
                    r#"<a href="{}"{} class="text-blue-400 underline" target="_blank" rel="noopener noreferrer">"#,
                    escape_url(sanitize_url(&dest_url)),
                    title
                )
                .into(),
            )
        }
        Event::End(TagEnd::Link) => Event::InlineHtml("</a>".into()),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::from(sanitize_url(&dest_url).to_string()),
            title,
            id,
        }),
        other => other,
    });

    let mut output = String::new();
    html::push_html(&mut output, events);
    output
}

/// Keep relative urls and the schemes in [`SAFE_SCHEMES`]; anything else becomes empty
fn sanitize_url(url: &str) -> &str {
    let Some(colon) = url.find(':') else {
        return url;
    };
    let scheme = &url[..colon];
    if scheme.contains(|c: char| matches!(c, '/' | '?' | '#')) {
        return url;
    }
    if SAFE_SCHEMES
        .iter()
        .any(|safe| scheme.eq_ignore_ascii_case(safe))
    {
        url
    } else {
        ""
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    escape_html(&mut escaped, value).expect("writing to a String cannot fail");
    escaped
}

fn escape_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    escape_href(&mut escaped, url).expect("writing to a String cannot fail");
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer() -> MessageRenderer {
        MessageRenderer::new().unwrap()
    }

    #[test]
    fn test_link_opens_in_new_tab() {
        let html = render_markdown("[x](http://a)");
        assert!(html.contains(r#"href="http://a""#));
        assert!(html.contains(r#"target="_blank""#));
        assert!(html.contains(r#"rel="noopener noreferrer""#));
        assert!(html.contains(r#"class="text-blue-400 underline""#));
        assert!(html.contains(">x</a>"));
    }

    #[test]
    fn test_unsafe_link_scheme_is_dropped() {
        let html = render_markdown("[click](javascript:alert(1))");
        assert!(html.contains(r#"href="""#));
        assert!(!html.contains("javascript"));

        assert!(render_markdown("[mail](mailto:a@b.c)").contains(r#"href="mailto:a@b.c""#));
        assert!(render_markdown("[rel](/docs?a=b:c)").contains(r#"href="/docs?a=b:c""#));
        assert!(render_markdown("[chat](xmpp:ada@example.org)")
            .contains(r#"href="xmpp:ada@example.org""#));
        assert!(render_markdown("[room](ircs://irc.example.org/rust)")
            .contains(r#"href="ircs://irc.example.org/rust""#));
        assert!(render_markdown("[file](file:///etc/passwd)").contains(r#"href="""#));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_block_styling() {
        let html = render_markdown("para\n\n- one\n- two\n\n3. three\n4. four\n");
        assert!(html.contains(r#"<p class="mb-4 first:mt-0 last:mb-0">para</p>"#));
        assert!(html.contains(r#"<ul class="mb-4 list-disc pl-4">"#));
        assert!(html.contains(r#"<li class="mb-1">one</li>"#));
        assert!(html.contains(r#"<ol class="mb-4 list-decimal pl-4" start="3">"#));
    }

    #[test]
    fn test_code_block_keeps_language_class() {
        let html = render_markdown("```rust\nfn main() {}\n```\n");
        assert!(html.starts_with(
            r#"<pre class="mb-4 overflow-x-auto rounded-lg bg-gray-700 p-4"><code class="language-rust">"#
        ));
        assert!(html.contains("fn main() {}"));
        assert!(html.trim_end().ends_with("</code></pre>"));
    }

    #[test]
    fn test_unsupported_parts_render_nothing() {
        let renderer = renderer();
        let reasoning = MessagePart::Reasoning {
            reasoning: "thinking hard".to_string(),
            details: vec![],
        };
        let source = MessagePart::Source {
            source: json!({"url": "https://a.example"}),
        };

        assert_eq!(renderer.render_part(&reasoning).unwrap(), "");
        assert_eq!(renderer.render_part(&source).unwrap(), "");
        assert_eq!(renderer.render_part(&MessagePart::StepStart).unwrap(), "");

        let html = renderer
            .render(Role::Assistant, "Ada", &[reasoning, source])
            .unwrap();
        assert!(!html.contains("thinking hard"));
        assert!(!html.contains("No content"));
    }

    #[test]
    fn test_empty_message_placeholder() {
        let html = renderer().render(Role::User, "Ada", &[]).unwrap();
        assert!(html.contains(r#"<p class="italic text-gray-500">No content</p>"#));
        assert!(html.contains(">Ada</p>"));
        assert!(html.contains("bg-gray-900"));
    }

    #[test]
    fn test_assistant_header_and_escaped_user_name() {
        let renderer = renderer();
        let parts = vec![MessagePart::text("Hi **there**")];

        let html = renderer.render(Role::Assistant, "Ada", &parts).unwrap();
        assert!(html.contains(">AI</p>"));
        assert!(html.contains("bg-gray-800"));
        assert!(html.contains("<strong>there</strong>"));

        let html = renderer.render(Role::User, "<b>Bob</b>", &parts).unwrap();
        assert!(html.contains("&lt;b&gt;Bob&lt;&#x2F;b&gt;"));
    }

    #[test]
    fn test_tool_invocation_call_state() {
        let part = MessagePart::tool_invocation(ToolInvocation::Call {
            tool_call_id: "call_1".to_string(),
            tool_name: "searchWeb".to_string(),
            args: json!({"query": "weather in Paris"}),
            step: None,
        });

        let html = renderer().render_part(&part).unwrap();
        assert!(html.contains("Tool: searchWeb"));
        assert!(html.contains("✓ Called"));
        assert!(html.contains("Arguments:"));
        assert!(html.contains("&quot;query&quot;: &quot;weather in Paris&quot;"));
        assert!(!html.contains("Result:"));
    }

    #[test]
    fn test_tool_invocation_result_state() {
        let renderer = renderer();
        let text_result = MessagePart::tool_invocation(ToolInvocation::Result {
            tool_call_id: "call_1".to_string(),
            tool_name: "searchWeb".to_string(),
            args: json!({"query": "rust"}),
            step: Some(0),
            result: json!("Error: Tool not found: nope"),
        });

        let html = renderer.render_part(&text_result).unwrap();
        assert!(html.contains("📊 Result"));
        assert!(html.contains("Error: Tool not found: nope"));
        assert!(!html.contains("Arguments:"));

        let json_result = MessagePart::tool_invocation(ToolInvocation::Result {
            tool_call_id: "call_2".to_string(),
            tool_name: "searchWeb".to_string(),
            args: json!({}),
            step: None,
            result: json!([{"title": "T", "link": "https://a", "snippet": "s"}]),
        });
        let html = renderer.render_part(&json_result).unwrap();
        assert!(html.contains("&quot;title&quot;: &quot;T&quot;"));
    }

    #[test]
    fn test_partial_call_label() {
        let part = MessagePart::tool_invocation(ToolInvocation::PartialCall {
            tool_call_id: "call_1".to_string(),
            tool_name: "searchWeb".to_string(),
            args: Value::Null,
            step: None,
        });

        let html = renderer().render_part(&part).unwrap();
        assert!(html.contains("⏳ Calling..."));
        assert!(!html.contains("Arguments:"));
    }
}
