//! SSE frame encoding and provider line reassembly.

use bytes::Bytes;
use serde_json::Value;

/// One unit of the relay's `text/event-stream` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A non-empty provider line, emitted as `data: <line>\n`.
    Data(String),
    /// An empty provider line, emitted as a bare `\n` (event boundary).
    Boundary,
    /// Terminal failure, emitted as an `error` event with a JSON message.
    Error(String),
}

impl SseFrame {
    /// Frame for a single provider line.
    pub fn from_line(line: &str) -> Self {
        if line.is_empty() {
            SseFrame::Boundary
        } else {
            SseFrame::Data(line.to_string())
        }
    }

    /// Exact wire representation of this frame.
    pub fn to_wire(&self) -> String {
        match self {
            SseFrame::Data(line) => format!("data: {}\n", line),
            SseFrame::Boundary => "\n".to_string(),
            SseFrame::Error(message) => format!(
                "event: error\ndata: {{\"message\": {}}}\n\n",
                Value::String(message.clone())
            ),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.to_wire())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SseFrame::Error(_))
    }
}

/// Reassembles provider lines across arbitrary chunk boundaries.
///
/// Lines end at `\n`, `\r\n` or a bare `\r`. A `\r\n` split across two
/// chunks still ends exactly one line.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
    /// Previous chunk ended in `\r`; a leading `\n` belongs to that line.
    after_cr: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut rest = chunk;
        if self.after_cr && !rest.is_empty() {
            self.after_cr = false;
            rest = rest.strip_prefix(b"\n").unwrap_or(rest);
        }

        let mut lines = Vec::new();
        while let Some(pos) = rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            self.buffer.extend_from_slice(&rest[..pos]);
            lines.push(self.take_line());

            let was_cr = rest[pos] == b'\r';
            rest = &rest[pos + 1..];
            if was_cr {
                match rest.first() {
                    Some(b'\n') => rest = &rest[1..],
                    Some(_) => {}
                    None => self.after_cr = true,
                }
            }
        }
        self.buffer.extend_from_slice(rest);
        lines
    }

    /// Take the unterminated remainder, if any.
    pub fn finish(mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}
