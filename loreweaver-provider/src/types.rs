//! Wire types shared by all adapters.
//!
//! The internal shape follows the OpenAI chat-completion layout —
//! messages with roles, choices, deltas — because three of the five
//! adapter families already speak it natively. The Anthropic adapter
//! maps to and from it explicitly.

use serde::{Deserialize, Serialize};

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user content.
    User,
    /// Model output.
    Assistant,
    /// Tool result content.
    Tool,
}

/// One part of a multi-part message (text or image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// An image, by URL or data URI.
    ImageUrl {
        /// `{"url": "..."}` wrapper, matching the OpenAI shape.
        image_url: ImageUrl,
    },
}

/// URL wrapper for image parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// An `https://` URL or a `data:<media>;base64,<data>` URI.
    pub url: String,
}

/// Message content: a bare string, a list of typed parts, or nothing
/// (assistant messages that only carry tool calls arrive with a null
/// content field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multi-part content (text and images).
    Parts(Vec<MessagePart>),
    /// No content (serialises as null).
    Empty,
}

impl MessageContent {
    /// The concatenated text of this content (images contribute nothing).
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    MessagePart::Text { text } => Some(text.as_str()),
                    MessagePart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            MessageContent::Empty => String::new(),
        }
    }

    /// Whether any part is an image.
    pub fn has_images(&self) -> bool {
        matches!(self, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, MessagePart::ImageUrl { .. })))
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSpec {
    /// Vendor-assigned call id.
    pub id: String,
    /// Called function name and JSON-encoded arguments.
    pub function: FunctionCall,
}

/// Function name + arguments inside a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// A tool the model may call, in JSON Schema form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of the tool input.
    pub parameters: serde_json::Value,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message content.
    pub content: MessageContent,
    /// Tool calls the assistant requested, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallSpec>>,
    /// For Tool-role messages: which call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    /// A user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    /// An assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A fully-specified request for one adapter call.
///
/// This is what adapters receive after the scheduler has chosen a
/// concrete model; `model` is therefore not optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Concrete model id.
    pub model: String,
    /// Maximum completion tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Whether a streaming response is requested.
    #[serde(default)]
    pub stream: bool,
    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    /// Tool-choice directive (vendor passthrough).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// System prompt, kept separate for Anthropic-style providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Thinking-token budget for providers that support one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_budget: Option<u32>,
}

impl ChatRequest {
    /// A minimal request: messages + model, everything else default.
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            max_tokens: None,
            temperature: None,
            stream: false,
            tools: None,
            tool_choice: None,
            system: None,
            reasoning_budget: None,
        }
    }

    /// Whether any message carries an image part.
    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| m.content.has_images())
    }
}

/// Token accounting for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub prompt_tokens: u64,
    /// Completion tokens generated.
    pub completion_tokens: u64,
    /// Prompt + completion.
    pub total_tokens: u64,
    /// Tokens written to the prompt cache, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
    /// Tokens read from the prompt cache, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
}

/// One completion choice in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Index within the response.
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped ("stop", "length", "tool_calls", ...).
    pub finish_reason: Option<String>,
}

/// A complete (non-streaming) chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Vendor response id.
    pub id: String,
    /// Model that produced the response.
    pub model: String,
    /// Unix creation time.
    pub created: i64,
    /// Generated choices (usually one).
    pub choices: Vec<Choice>,
    /// Token accounting, when the vendor reports it.
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// Text of the first choice, if present.
    pub fn first_text(&self) -> Option<String> {
        self.choices.first().map(|c| c.message.content.as_text())
    }
}

/// Incremental delta inside a streaming chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Role, present on the first chunk only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// New content since the previous chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice inside a streaming chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index within the response.
    pub index: u32,
    /// The incremental delta.
    pub delta: Delta,
    /// Non-null on the terminal chunk.
    pub finish_reason: Option<String>,
}

/// One frame of a streaming response.
///
/// A stream is an ordered sequence of chunks ending either with the
/// `[DONE]` sentinel (consumed by the SSE decoder) or a chunk whose
/// `finish_reason` is non-null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Vendor response id.
    pub id: String,
    /// Model producing the stream.
    pub model: String,
    /// Unix creation time.
    pub created: i64,
    /// Incremental choices.
    pub choices: Vec<ChunkChoice>,
}

impl ChatChunk {
    /// Whether this chunk terminates the stream.
    pub fn is_terminal(&self) -> bool {
        self.choices.iter().any(|c| c.finish_reason.is_some())
    }

    /// Content delta of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_untagged_accepts_string_and_parts() {
        let text: MessageContent = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(text.as_text(), "hello");

        let parts: MessageContent = serde_json::from_str(
            r#"[{"type":"text","text":"look: "},{"type":"image_url","image_url":{"url":"data:image/png;base64,AAAA"}}]"#,
        )
        .unwrap();
        assert!(parts.has_images());
        assert_eq!(parts.as_text(), "look: ");
    }

    #[test]
    fn request_detects_images_anywhere() {
        let mut req = ChatRequest::new(vec![ChatMessage::user("hi")], "m");
        assert!(!req.has_images());
        req.messages.push(ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![MessagePart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://example.com/a.png".into(),
                },
            }]),
            tool_calls: None,
            tool_call_id: None,
        });
        assert!(req.has_images());
    }

    #[test]
    fn null_content_deserializes_as_empty() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"role":"assistant","content":null,"tool_calls":[{"id":"c1","function":{"name":"roll","arguments":"{}"}}]}"#,
        )
        .unwrap();
        assert_eq!(msg.content, MessageContent::Empty);
        assert_eq!(msg.content.as_text(), "");
        assert!(msg.tool_calls.is_some());
    }

    #[test]
    fn terminal_chunk_detection() {
        let chunk = ChatChunk {
            id: "c1".into(),
            model: "m".into(),
            created: 0,
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some("stop".into()),
            }],
        };
        assert!(chunk.is_terminal());
    }
}
