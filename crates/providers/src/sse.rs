//! Server-Sent-Events line decoding for the inference stream.
//!
//! Bytes are buffered until a full line is available so that a UTF-8
//! sequence split across network chunks decodes intact. Only `data:` lines
//! matter; blank lines, comments and other fields are ignored, and a data
//! line that is not a valid [`StreamEvent`] is skipped.

use llmcode_core::provider::StreamEvent;
use tracing::trace;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the events completed by this chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }
}

/// Decode one SSE line into an event, if it carries one.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!(error = %e, payload = %payload, "Skipping undecodable SSE line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_complete_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b"data: {\"type\":\"start\",\"request_id\":\"r1\"}\n\ndata: {\"type\":\"token\",\"content\":\"Hi\"}\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::token("Hi"));
    }

    #[test]
    fn line_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"tok").is_empty());
        let events = decoder.push(b"en\",\"content\":\"abc\"}\n");
        assert_eq!(events, vec![StreamEvent::token("abc")]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let line = "data: {\"type\":\"token\",\"content\":\"안녕\"}\n".as_bytes();
        // Split inside the first Hangul syllable
        let cut = line.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&line[..cut]).is_empty());
        assert_eq!(decoder.push(&line[cut..]), vec![StreamEvent::token("안녕")]);
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b": keep-alive\nevent: message\ndata: not json\ndata: {\"type\":\"ping\"}\ndata:\ndata: {\"type\":\"done\"}\n",
        );
        assert_eq!(events, vec![StreamEvent::Done { usage: None }]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(decoder.finish(), Some(StreamEvent::Done { usage: None }));
        assert_eq!(decoder.finish(), None);
    }
}
