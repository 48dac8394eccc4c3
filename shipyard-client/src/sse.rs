//! Server-sent event decoding
//!
//! Splits a `text/event-stream` byte stream on blank lines and parses the
//! `data:` payload of each frame into a `StreamEvent`. Comment frames (the
//! server's keep-alives) and frames without data are skipped.

use shipyard_core::event::StreamEvent;

use crate::error::{ClientError, Result};

/// Incremental decoder; chunks may split frames and UTF-8 sequences anywhere
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent>> {
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = frame_data(&String::from_utf8_lossy(&frame)) {
                events.push(
                    StreamEvent::from_sse_data(&data)
                        .map_err(|e| ClientError::ParseError(format!("Invalid stream event: {}", e))),
                );
            }
        }
        events
    }

    /// Whether an incomplete frame is still buffered
    pub fn has_partial_frame(&self) -> bool {
        self.buffer.iter().any(|b| !b.is_ascii_whitespace())
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Joined `data:` lines of one frame, if any
fn frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_core::event::EventType;

    const PROGRESS: &str =
        r#"data: {"type":"agent_progress","data":{"status":"running"},"timestamp":1700000000000}"#;

    #[test]
    fn test_decodes_complete_frame() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(format!("{}\n\n", PROGRESS).as_bytes());

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.event_type, EventType::AgentProgress);
        assert_eq!(event.timestamp, 1_700_000_000_000);
        assert!(!decoder.has_partial_frame());
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let frame = format!("{}\n\n", PROGRESS);
        let (head, tail) = frame.as_bytes().split_at(20);

        assert!(decoder.push(head).is_empty());
        assert!(decoder.has_partial_frame());
        let events = decoder.push(tail);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[test]
    fn test_skips_keep_alive_comments_and_handles_crlf() {
        let mut decoder = SseDecoder::new();
        let input = format!(":\n\n{}\r\n\r\n: keep-alive\n\n", PROGRESS);

        let events = decoder.push(input.as_bytes());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let input = format!(
            "{}\n\ndata: {{\"type\":\"pipeline_failed\",\"data\":{{}},\"timestamp\":2}}\n\n",
            PROGRESS
        );

        let events: Vec<_> = decoder.push(input.as_bytes()).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert!(events[1].event_type.is_terminal());
    }

    #[test]
    fn test_malformed_payload_is_reported() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {not json}\n\n");
        assert!(matches!(events[0], Err(ClientError::ParseError(_))));
    }
}
