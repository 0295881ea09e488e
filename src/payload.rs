//! Structured view of a messages-API request payload
//!
//! The gateway only ever rewrites text leaves under `messages[*].content`;
//! everything else (model, max_tokens, stream flag, metadata, unknown
//! fields) is carried through untouched via flattened maps, so a payload
//! that was parsed and re-serialized differs from the original only where a
//! compression replacement was actually applied.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A messages-API request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesPayload {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One turn of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: ContentNode,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Conversation role; unknown roles round-trip verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    #[serde(untagged)]
    Other(String),
}

/// The `content` field of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentNode {
    /// Plain-string content; the whole string is one compression candidate
    Text(String),
    /// Structured content list
    Items(Vec<ContentItem>),
    /// Anything else is opaque and never visited
    Unknown(Value),
}

/// One entry of a structured content list
///
/// Items the gateway understands are matched by their `type` tag; everything
/// else falls through to `Other` and is only compressed when it carries a
/// string `text` field (or, for non-object items, via string coercion).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    Known(KnownItem),
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownItem {
    /// Prose block; its `text` field is a compression candidate
    Text {
        text: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// Structured tool invocation; never compressed
    ToolUse {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    /// Tool output; `content` is compressible as opaque text
    ToolResult {
        content: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

/// Coerce an arbitrary JSON value into candidate text
pub fn coerce_to_text(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}
