//! Request/response mapping between the shared wire types and the
//! Anthropic Messages API.

use loreweaver_provider::{
    ChatMessage, ChatRequest, ChatResponse, Choice, MessageContent, MessagePart, ProviderError,
    Role, TokenUsage,
};
use serde_json::{json, Value};

/// Build the Anthropic request body from a [`ChatRequest`].
pub(crate) fn to_api_request(request: &ChatRequest, default_max_tokens: u32) -> Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens.unwrap_or(default_max_tokens),
        "messages": transform_messages(&request.messages),
    });

    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(system) = &request.system {
        body["system"] = json!(system);
    }
    if let Some(tools) = &request.tools {
        body["tools"] = Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect(),
        );
    }
    if let Some(choice) = &request.tool_choice {
        body["tool_choice"] = choice.clone();
    }
    if let Some(budget) = request.reasoning_budget {
        body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
    }

    body
}

/// Convert shared messages into Anthropic content blocks.
///
/// Tool-role messages become user messages carrying a `tool_result`
/// block; assistant tool calls become `tool_use` blocks; image data
/// URIs are decomposed into base64 source objects.
fn transform_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            // The system prompt travels as a top-level field, not a message.
            Role::System => continue,
            Role::Tool => {
                out.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                        "content": msg.content.as_text(),
                    }],
                }));
            }
            Role::User | Role::Assistant => {
                let mut blocks = content_blocks(&msg.content);
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        let input: Value = serde_json::from_str(&call.function.arguments)
                            .unwrap_or(Value::Null);
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.function.name,
                            "input": input,
                        }));
                    }
                }
                let role = if msg.role == Role::User { "user" } else { "assistant" };
                out.push(json!({ "role": role, "content": blocks }));
            }
        }
    }
    out
}

fn content_blocks(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Empty => vec![],
        MessageContent::Text(text) => vec![json!({"type": "text", "text": text})],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => json!({"type": "text", "text": text}),
                MessagePart::ImageUrl { image_url } => image_block(&image_url.url),
            })
            .collect(),
    }
}

/// Decompose a `data:<media>;base64,<data>` URI into Anthropic's
/// base64 source shape. Plain URLs pass through as url sources.
fn image_block(url: &str) -> Value {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((meta, data)) = rest.split_once(',') {
            let media_type = meta.split(';').next().unwrap_or("image/png");
            return json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": media_type,
                    "data": data,
                },
            });
        }
    }
    json!({
        "type": "image",
        "source": { "type": "url", "url": url },
    })
}

/// Map an Anthropic response body into the shared [`ChatResponse`].
pub(crate) fn from_api_response(body: &Value) -> Result<ChatResponse, ProviderError> {
    let content = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing content array".into()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in content {
        match block["type"].as_str() {
            Some("text") => text.push_str(block["text"].as_str().unwrap_or("")),
            Some("tool_use") => {
                tool_calls.push(loreweaver_provider::ToolCallSpec {
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    function: loreweaver_provider::types::FunctionCall {
                        name: block["name"].as_str().unwrap_or("").to_string(),
                        arguments: block["input"].to_string(),
                    },
                });
            }
            _ => {}
        }
    }

    let usage = body.get("usage").map(|u| {
        let prompt = u["input_tokens"].as_u64().unwrap_or(0);
        let completion = u["output_tokens"].as_u64().unwrap_or(0);
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            cache_creation_tokens: u["cache_creation_input_tokens"].as_u64(),
            cache_read_tokens: u["cache_read_input_tokens"].as_u64(),
        }
    });

    Ok(ChatResponse {
        id: body["id"].as_str().unwrap_or("").to_string(),
        model: body["model"].as_str().unwrap_or("").to_string(),
        created: 0,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: Role::Assistant,
                content: MessageContent::Text(text),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            },
            finish_reason: body["stop_reason"].as_str().map(String::from),
        }],
        usage,
    })
}
