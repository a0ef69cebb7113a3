//! SSE streaming for OpenAI-shaped endpoints.
//!
//! Chunks arrive already in the shared shape; each `data:` line is a
//! serialised [`ChatChunk`]. Unparseable lines are skipped, `[DONE]`
//! or a non-null `finish_reason` terminates.

use async_stream::stream;
use futures::StreamExt;
use loreweaver_provider::{ChatChunk, ChunkStream, ProviderError, SseFrame, SseLineBuffer};

pub(crate) fn stream_completion(response: reqwest::Response) -> ChunkStream {
    let mut bytes = response.bytes_stream();
    Box::pin(stream! {
        let mut buf = SseLineBuffer::new();

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
                        if let Ok(parsed) = serde_json::from_str::<ChatChunk>(&data) {
                            let terminal = parsed.is_terminal();
                            yield Ok(parsed);
                            if terminal {
                                return;
                            }
                        }
                        // Skip unparseable lines without aborting.
                    }
                }
            }
        }

        if let Some(SseFrame::Data(data)) = buf.finish() {
            if let Ok(parsed) = serde_json::from_str::<ChatChunk>(&data) {
                yield Ok(parsed);
            }
        }
    })
}
