use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Other,
}

/// One typed part of a structured (multimodal) message.
///
/// Only parts carrying a string `text` contribute to the captured input;
/// anything else (images, audio, non-object entries) is kept as `Other`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        text: String,
    },
    Other(Value),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            kind: Some("text".into()),
            text: text.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Plain text view: structured content joins its text-bearing parts with one space.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Canonical token usage.
///
/// `total_tokens` is taken as supplied; only the count-based normalizer derives it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageRecord {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl UsageRecord {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// Canonical tool call attributed on the span.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    /// JSON-encoded arguments; `None` when the source carried none.
    pub arguments: Option<String>,
}

/// Compact tool call as some bots embed it in their text responses:
/// `{"name": "pod_bay_doors", "parameters": {"action": "status"}}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompactToolCall {
    pub name: String,
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    /// Usually a JSON string; some providers send an object instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// OpenAI-shaped tool call: `{"type": "function", "function": {"name", "arguments"}}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OpenAiToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "default_tool_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn default_tool_type() -> String {
    "function".into()
}

impl OpenAiToolCall {
    pub fn function(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: default_tool_type(),
            function: FunctionCall {
                name: Some(name.into()),
                arguments: Some(Value::String(arguments.into())),
            },
        }
    }

    /// Canonical form; a missing function name reads as "unknown".
    pub fn to_canonical(&self) -> ToolCall {
        let name = self
            .function
            .name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let arguments = self.function.arguments.as_ref().map(|a| match a {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        ToolCall { name, arguments }
    }
}

/// Tool call in whichever shape it arrived.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum AnyToolCall {
    OpenAi(OpenAiToolCall),
    Compact(CompactToolCall),
}
