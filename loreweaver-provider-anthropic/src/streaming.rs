//! SSE streaming for the Anthropic Messages API.
//!
//! Anthropic's stream interleaves typed events; only text deltas and
//! the final stop reason surface as chunks. Unparseable data lines
//! are skipped; the pending-line buffer is capped and overflow aborts
//! the stream.

use async_stream::stream;
use futures::StreamExt;
use loreweaver_provider::{
    ChatChunk, ChunkChoice, ChunkStream, Delta, ProviderError, SseFrame, SseLineBuffer,
};
use serde_json::Value;

pub(crate) fn stream_completion(response: reqwest::Response, model: String) -> ChunkStream {
    let mut bytes = response.bytes_stream();
    Box::pin(stream! {
        let mut buf = SseLineBuffer::new();
        let mut seq: u64 = 0;

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(loreweaver_provider::error::map_reqwest_error(e));
                    return;
                }
            };
            let frames = match buf.push(&chunk) {
                Ok(frames) => frames,
                Err(overflow) => {
                    yield Err(ProviderError::InvalidResponse(overflow.to_string()));
                    return;
                }
            };
            for frame in frames {
                match frame {
                    SseFrame::Done => return,
                    SseFrame::Data(data) => {
                        if let Some(chunk) = transform_event(&data, &model, &mut seq) {
                            let terminal = chunk.is_terminal();
                            yield Ok(chunk);
                            if terminal {
                                return;
                            }
                        }
                    }
                }
            }
        }

        if let Some(SseFrame::Data(data)) = buf.finish() {
            if let Some(chunk) = transform_event(&data, &model, &mut seq) {
                yield Ok(chunk);
            }
        }
    })
}

/// Map one Anthropic event payload to a chunk. Events that carry no
/// player-visible delta (pings, block boundaries) return None, as do
/// unparseable payloads.
fn transform_event(data: &str, model: &str, seq: &mut u64) -> Option<ChatChunk> {
    let json: Value = serde_json::from_str(data).ok()?;
    *seq += 1;

    let (content, finish_reason) = match json["type"].as_str()? {
        "content_block_delta" => {
            let delta = &json["delta"];
            if delta["type"].as_str()? != "text_delta" {
                return None;
            }
            (Some(delta["text"].as_str()?.to_string()), None)
        }
        "message_delta" => {
            let stop = json["delta"]["stop_reason"].as_str()?;
            (None, Some(stop.to_string()))
        }
        _ => return None,
    };

    Some(ChatChunk {
        id: format!("anthropic-{seq}"),
        model: model.to_string(),
        created: 0,
        choices: vec![ChunkChoice {
            index: 0,
            delta: Delta {
                role: None,
                content,
            },
            finish_reason,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_becomes_content_chunk() {
        let mut seq = 0;
        let chunk = transform_event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            "claude",
            &mut seq,
        )
        .unwrap();
        assert_eq!(chunk.first_content(), Some("Hi"));
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn message_delta_becomes_terminal_chunk() {
        let mut seq = 0;
        let chunk = transform_event(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":9}}"#,
            "claude",
            &mut seq,
        )
        .unwrap();
        assert!(chunk.is_terminal());
    }

    #[test]
    fn pings_and_garbage_are_skipped() {
        let mut seq = 0;
        assert!(transform_event(r#"{"type":"ping"}"#, "m", &mut seq).is_none());
        assert!(transform_event("not json", "m", &mut seq).is_none());
        assert!(
            transform_event(
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text"}}"#,
                "m",
                &mut seq
            )
            .is_none()
        );
    }
}
