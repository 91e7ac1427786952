//! Server-Sent Events Frame Parser
//!
//! Incremental: bytes go in as they arrive off the socket, complete blocks
//! come out. Only `event` and `data` fields are kept. Blocks without data
//! (comment keep-alives) are still reported so the caller can tell a quiet
//! connection from a dead one.

use crate::error::{ClientError, Result};

/// Largest incomplete block held while waiting for its terminator
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// One dispatched SSE frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// A complete block off the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseBlock {
    Frame(SseFrame),
    KeepAlive,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a terminator
    scanned: usize,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every block it completed.
    ///
    /// Fails once an unterminated block grows past [`MAX_PENDING_BYTES`];
    /// the stream is unusable after that.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseBlock>> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut blocks = Vec::new();
        loop {
            // Back up one byte so a terminator split across chunks is found
            let from = self.scanned.saturating_sub(1);
            let Some(offset) = self.buffer[from..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.buffer.len();
                break;
            };

            let end = from + offset;
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            blocks.push(parse_block(&String::from_utf8_lossy(&block[..end])));
        }

        if self.buffer.len() > MAX_PENDING_BYTES {
            self.buffer.clear();
            self.scanned = 0;
            return Err(ClientError::Protocol(format!(
                "event block exceeds {MAX_PENDING_BYTES} bytes"
            )));
        }
        Ok(blocks)
    }
}

fn parse_block(block: &str) -> SseBlock {
    let mut frame = SseFrame::default();
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return SseBlock::KeepAlive;
    }
    frame.data = data_lines.join("\n");
    SseBlock::Frame(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(blocks: Vec<SseBlock>) -> Vec<SseFrame> {
        blocks
            .into_iter()
            .filter_map(|b| match b {
                SseBlock::Frame(frame) => Some(frame),
                SseBlock::KeepAlive => None,
            })
            .collect()
    }

    #[test]
    fn test_frames_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: sched").unwrap().is_empty());
        assert!(parser.feed(b"ule\ndata: {\"a\":").unwrap().is_empty());

        let frames = frames(parser.feed(b"1}\n\nevent: theme\ndata: {}\n\n").unwrap());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("schedule"));
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[1].event.as_deref(), Some("theme"));
    }

    #[test]
    fn test_terminator_split_between_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: x\n").unwrap().is_empty());
        let frames = frames(parser.feed(b"\ndata: y\n\n").unwrap());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "x");
        assert_eq!(frames[1].data, "y");
    }

    #[test]
    fn test_keep_alive_and_crlf() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed(b": keep-alive\r\n\r\n").unwrap(), vec![SseBlock::KeepAlive]);

        let blocks = parser.feed(b"data: first\r\ndata: second\r\n\r\n").unwrap();
        assert_eq!(blocks, vec![SseBlock::Frame(SseFrame {
            event: None,
            data: "first\nsecond".into(),
        })]);
    }

    #[test]
    fn test_unterminated_block_is_bounded() {
        let mut parser = SseParser::new();
        let chunk = vec![b'a'; 64 * 1024];
        let mut result = Ok(Vec::new());
        for _ in 0..=(MAX_PENDING_BYTES / chunk.len()) {
            result = parser.feed(&chunk);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }
}
