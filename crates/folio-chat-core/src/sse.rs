//! Incremental decoding of a server-sent-event generation stream.
//!
//! The generation provider answers with `data: {json}` lines. Network reads
//! do not respect line boundaries, so [`SseLineBuffer`] holds the trailing
//! partial line until the rest arrives and hands back only complete lines.
//! Splitting happens on raw bytes: `\n` never occurs inside a multi-byte
//! UTF-8 sequence, so every complete line is whole UTF-8.
//!
//! [`parse_frame`] turns one line into a typed [`StreamFrame`].

use serde::Deserialize;

const DATA_PREFIX: &str = "data:";

/// Buffers raw stream bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a network read and return every line it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Drain whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            "SAFETY" => FinishReason::Safety,
            "RECITATION" => FinishReason::Recitation,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }
}

/// One decoded `data:` event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamFrame {
    /// Text delta, if the frame carried non-empty text.
    pub text: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    candidates: Vec<CandidatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePayload {
    #[serde(default)]
    content: Option<ContentPayload>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentPayload {
    #[serde(default)]
    parts: Vec<PartPayload>,
}

#[derive(Debug, Deserialize)]
struct PartPayload {
    #[serde(default)]
    text: Option<String>,
}

/// Decode a single SSE line.
///
/// Returns `None` for blank lines, comments, non-`data` fields, and payloads
/// that are not valid generation frames.
pub fn parse_frame(line: &str) -> Option<StreamFrame> {
    let data = line.trim().strip_prefix(DATA_PREFIX)?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    let payload: FramePayload = serde_json::from_str(data).ok()?;
    let candidate = payload.candidates.into_iter().next()?;

    let text = candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty());

    Some(StreamFrame {
        text,
        finish_reason: candidate.finish_reason.as_deref().map(FinishReason::parse),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_line(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"{}\"}}],\"role\":\"model\"}}}}]}}",
            text
        )
    }

    #[test]
    fn test_complete_lines_returned() {
        let mut buf = SseLineBuffer::new();
        let input = format!("{}\n\n{}\n", frame_line("a"), frame_line("b"));
        let lines = buf.push(input.as_bytes());
        assert_eq!(lines.len(), 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_frame_split_across_reads_emitted_once() {
        let line = format!("{}\n", frame_line("Hello there"));
        let (first, second) = line.as_bytes().split_at(25);

        let mut buf = SseLineBuffer::new();
        assert!(buf.push(first).is_empty());
        let lines = buf.push(second);
        assert_eq!(lines.len(), 1);

        let frames: Vec<StreamFrame> = lines.iter().filter_map(|l| parse_frame(l)).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text.as_deref(), Some("Hello there"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let line = format!("{}\n", frame_line("café ☕"));
        let bytes = line.as_bytes();
        // Split inside the three-byte coffee cup sequence.
        let cut = line.find('☕').unwrap() + 1;
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(&bytes[..cut]).is_empty());
        let lines = buf.push(&bytes[cut..]);
        let frame = parse_frame(&lines[0]).unwrap();
        assert_eq!(frame.text.as_deref(), Some("café ☕"));
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(frame_line("tail").as_bytes()).is_empty());
        let rest = buf.finish().unwrap();
        assert_eq!(parse_frame(&rest).unwrap().text.as_deref(), Some("tail"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_finish_ignores_whitespace() {
        let mut buf = SseLineBuffer::new();
        buf.push(b"\r");
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_crlf_lines_parse() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(format!("{}\r\n", frame_line("x")).as_bytes());
        assert_eq!(parse_frame(&lines[0]).unwrap().text.as_deref(), Some("x"));
    }

    #[test]
    fn test_non_data_and_invalid_lines_skipped() {
        assert!(parse_frame("").is_none());
        assert!(parse_frame(": keep-alive").is_none());
        assert!(parse_frame("event: message").is_none());
        assert!(parse_frame("data: {not json").is_none());
        assert!(parse_frame("data: [DONE]").is_none());
        assert!(parse_frame("data: {\"candidates\":[]}").is_none());
    }

    #[test]
    fn test_finish_reason_decoded() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"partial"}]},"finishReason":"SAFETY"}]}"#;
        let frame = parse_frame(line).unwrap();
        assert_eq!(frame.text.as_deref(), Some("partial"));
        assert_eq!(frame.finish_reason, Some(FinishReason::Safety));
        assert!(!FinishReason::Safety.is_normal());

        let line = r#"data: {"candidates":[{"finishReason":"STOP"}]}"#;
        let frame = parse_frame(line).unwrap();
        assert!(frame.text.is_none());
        assert!(frame.finish_reason.unwrap().is_normal());
    }
}
