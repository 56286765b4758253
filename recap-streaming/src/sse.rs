//! Server-Sent Events (SSE) record framing.
//!
//! The completion endpoint pushes one JSON envelope per SSE record. Records
//! end at a blank line: two consecutive line endings, each `\n` or `\r\n`.
//! Bytes are buffered undecoded
//! until a whole record is present, so a multi-byte UTF-8 character split
//! across two network chunks is decoded intact.

use crate::error::{StreamError, StreamResult};

const MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Payload of the record that terminates a completion stream.
pub const DONE_MARKER: &str = "[DONE]";

/// A parsed SSE record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (if specified).
    pub event: Option<String>,
    /// Event data; multiple `data:` lines are joined with `\n`.
    pub data: String,
    /// Event ID (if specified).
    pub id: Option<String>,
}

impl SseEvent {
    /// Create a new SSE event with just data.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    /// Check if this is the terminating `[DONE]` record.
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }
}

/// Incremental SSE record parser.
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    max_buffer: usize,
    /// Offset where the next boundary search resumes. Everything before it
    /// holds no complete boundary.
    scan_from: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SseParser {
    /// Create a new SSE parser with the default 10 MiB record limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_buffer(MAX_BUFFER_SIZE)
    }

    /// Create a parser with a custom record size limit.
    #[must_use]
    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer,
            scan_from: 0,
        }
    }

    /// Feed a chunk and return every record it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<SseEvent>> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        self.buffer.extend_from_slice(chunk);
        let events = self.drain_records();

        if self.buffer.len() > self.max_buffer {
            self.buffer.clear();
            self.scan_from = 0;
            return Err(StreamError::BufferOverflow {
                limit: self.max_buffer,
            });
        }

        Ok(events)
    }

    /// End of input. Any incomplete record is dropped.
    ///
    /// Returns the number of non-whitespace bytes discarded.
    pub fn finish(&mut self) -> usize {
        let trailing = self
            .buffer
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .count();
        self.buffer.clear();
        self.scan_from = 0;
        trailing
    }

    /// Bytes waiting for a record boundary.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn drain_records(&mut self) -> Vec<SseEvent> {
        let mut parsed = Vec::new();

        while let Some((content_end, consumed)) = self.find_record_boundary() {
            let record: Vec<u8> = self.buffer.drain(..consumed).collect();
            let leading = self
                .buffer
                .iter()
                .take_while(|b| **b == b'\n' || **b == b'\r')
                .count();
            self.buffer.drain(..leading);
            self.scan_from = 0;

            if let Some(event) = self.parse_record(&record[..content_end]) {
                parsed.push(event);
            }
        }

        parsed
    }

    /// Find the first blank line at or after `scan_from`.
    ///
    /// Returns the end of the record content and the end of the separator.
    fn find_record_boundary(&mut self) -> Option<(usize, usize)> {
        let buf = &self.buffer;
        let mut from = self.scan_from;

        while let Some(offset) = buf[from..].iter().position(|b| *b == b'\n') {
            let newline = from + offset;
            let content_end = if newline > 0 && buf[newline - 1] == b'\r' {
                newline - 1
            } else {
                newline
            };

            match (buf.get(newline + 1), buf.get(newline + 2)) {
                (Some(b'\n'), _) => return Some((content_end, newline + 2)),
                (Some(b'\r'), Some(b'\n')) => return Some((content_end, newline + 3)),
                // Not enough bytes yet to tell; resume at this line ending.
                (None, _) | (Some(b'\r'), None) => {
                    self.scan_from = newline;
                    return None;
                }
                _ => from = newline + 1,
            }
        }

        self.scan_from = buf.len();
        None
    }

    fn parse_record(&self, bytes: &[u8]) -> Option<SseEvent> {
        let text = String::from_utf8_lossy(bytes);
        let mut event = None;
        let mut data_lines = Vec::new();
        let mut id = None;

        for line in text.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data_lines.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            } else if let Some(value) = line.strip_prefix("id:") {
                id = Some(value.trim().to_string());
            } else if line == "data" {
                data_lines.push(String::new());
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event,
            data: data_lines.join("\n"),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_parser_basic() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: hello\n\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_sse_parser_crlf_boundary() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: hello\r\n\r\ndata: world\r\n\r\n").unwrap();

        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["hello", "world"]);
    }

    #[test]
    fn test_sse_parser_mixed_line_endings() {
        let mut parser = SseParser::new();
        let events = parser
            .feed(b"data: a\r\n\ndata: b\n\r\ndata: c\r\n\r\n")
            .unwrap();

        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_separator_split_across_feeds() {
        let mut parser = SseParser::new();

        assert!(parser.feed(b"data: x\r\n").unwrap().is_empty());
        assert!(parser.feed(b"\r").unwrap().is_empty());
        let events = parser.feed(b"\ndata: y\n").unwrap();
        assert_eq!(events[0].data, "x");

        let events = parser.feed(b"\n").unwrap();
        assert_eq!(events[0].data, "y");
        assert_eq!(parser.pending_bytes(), 0);
    }

    #[test]
    fn test_long_record_fed_bytewise() {
        let record = format!("data: {}\n\n", "z".repeat(4096));
        let mut parser = SseParser::new();
        let mut events = Vec::new();

        for byte in record.as_bytes() {
            events.extend(parser.feed(std::slice::from_ref(byte)).unwrap());
            assert!(parser.scan_from <= parser.pending_bytes());
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.len(), 4096);
    }

    #[test]
    fn test_sse_parser_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: line1\ndata: line2\n\n").unwrap();
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_sse_parser_incremental() {
        let mut parser = SseParser::new();

        assert!(parser.feed(b"data: hel").unwrap().is_empty());
        assert!(parser.feed(b"lo\n").unwrap().is_empty());

        let events = parser.feed(b"\n").unwrap();
        assert_eq!(events[0].data, "hello");
        assert_eq!(parser.pending_bytes(), 0);
    }

    #[test]
    fn test_split_multibyte_character() {
        let payload = "data: caf\u{e9} \u{1f600}\n\n".as_bytes();
        let split = payload.len() - 4;
        let mut parser = SseParser::new();

        assert!(parser.feed(&payload[..split]).unwrap().is_empty());
        let events = parser.feed(&payload[split..]).unwrap();
        assert_eq!(events[0].data, "caf\u{e9} \u{1f600}");
    }

    #[test]
    fn test_sse_parser_with_id_and_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: delta\nid: 7\ndata: x\n\n").unwrap();

        assert_eq!(events[0].event.as_deref(), Some("delta"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_sse_parser_ignores_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": ping\n\ndata: hello\n\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_done_marker() {
        assert!(SseEvent::data("[DONE]").is_done());
        assert!(!SseEvent::data("{}").is_done());
    }

    #[test]
    fn test_finish_discards_partial_record() {
        let mut parser = SseParser::new();
        parser.feed(b"data: {\"partial\":").unwrap();

        assert!(parser.finish() > 0);
        assert_eq!(parser.pending_bytes(), 0);
        assert_eq!(parser.finish(), 0);
    }

    #[test]
    fn test_buffer_overflow() {
        let mut parser = SseParser::with_max_buffer(16);
        let err = parser.feed(b"data: this record never ends").unwrap_err();

        assert!(matches!(err, StreamError::BufferOverflow { limit: 16 }));
        assert_eq!(parser.pending_bytes(), 0);
    }

    #[test]
    fn test_complete_records_do_not_count_toward_limit() {
        let mut parser = SseParser::with_max_buffer(16);
        let events = parser
            .feed(b"data: aaaaaaaaaaaa\n\ndata: bbbbbbbbbbbb\n\n")
            .unwrap();
        assert_eq!(events.len(), 2);
    }
}
