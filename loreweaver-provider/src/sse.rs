//! Incremental SSE line decoding shared by streaming adapters.
//!
//! Vendors deliver streaming responses as line-delimited frames
//! (`data: <json>\n`, terminator `data: [DONE]`). Network chunks do
//! not respect line boundaries, so the buffer re-assembles partial
//! lines across chunks. Unparseable payload lines are skipped rather
//! than aborting the stream; a hard cap on buffered bytes guards
//! against a vendor that never sends a newline.

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A `data:` payload line (JSON text, unparsed).
    Data(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Re-assembles SSE lines from arbitrary byte chunks.
pub struct SseLineBuffer {
    buf: String,
    max_buffered: usize,
}

/// Default cap on pending (newline-less) bytes: 10 MiB.
pub const DEFAULT_MAX_BUFFERED: usize = 10 * 1024 * 1024;

impl SseLineBuffer {
    /// A buffer with the default 10 MiB pending cap.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_BUFFERED)
    }

    /// A buffer with a custom pending cap.
    pub fn with_capacity(max_buffered: usize) -> Self {
        Self {
            buf: String::new(),
            max_buffered,
        }
    }

    /// Feed one network chunk; returns the complete frames it unlocked.
    ///
    /// Returns an error when the pending buffer would exceed the cap,
    /// at which point the stream must be aborted.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, BufferOverflow> {
        let text = String::from_utf8_lossy(chunk);
        self.buf.push_str(&text);
        if self.buf.len() > self.max_buffered {
            return Err(BufferOverflow {
                buffered: self.buf.len(),
                cap: self.max_buffered,
            });
        }

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(frame) = parse_line(line.trim_end_matches(['\n', '\r'])) {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Flush any trailing line left when the stream ends without a
    /// final newline.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(rest.trim())
    }
}

impl Default for SseLineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// The pending-line buffer exceeded its cap; the stream must abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("SSE buffer overflow: {buffered} bytes pending, cap {cap}")]
pub struct BufferOverflow {
    /// Bytes currently buffered.
    pub buffered: usize,
    /// The configured cap.
    pub cap: usize,
}

fn parse_line(line: &str) -> Option<SseFrame> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseFrame::Done);
    }
    Some(SseFrame::Data(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_lines_are_rebuffered() {
        let mut buf = SseLineBuffer::new();
        assert_eq!(buf.push(b"data: {\"a\":").unwrap(), vec![]);
        assert_eq!(
            buf.push(b"1}\n").unwrap(),
            vec![SseFrame::Data("{\"a\":1}".into())]
        );
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut buf = SseLineBuffer::new();
        let frames = buf
            .push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n")
            .unwrap();
        assert_eq!(
            frames,
            vec![
                SseFrame::Data("{\"a\":1}".into()),
                SseFrame::Data("{\"b\":2}".into()),
            ]
        );
    }

    #[test]
    fn done_sentinel_is_recognised() {
        let mut buf = SseLineBuffer::new();
        assert_eq!(buf.push(b"data: [DONE]\n").unwrap(), vec![SseFrame::Done]);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut buf = SseLineBuffer::new();
        assert_eq!(
            buf.push(b"event: ping\n: comment\n\n").unwrap(),
            vec![]
        );
    }

    #[test]
    fn overflow_aborts() {
        let mut buf = SseLineBuffer::with_capacity(8);
        let err = buf.push(b"data: 123456789").unwrap_err();
        assert!(err.buffered > err.cap);
    }

    #[test]
    fn finish_flushes_trailing_line() {
        let mut buf = SseLineBuffer::new();
        buf.push(b"data: {\"tail\":true}").unwrap();
        assert_eq!(
            buf.finish(),
            Some(SseFrame::Data("{\"tail\":true}".into()))
        );
        assert_eq!(buf.finish(), None);
    }
}
