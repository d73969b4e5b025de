use serde::Deserialize;

use super::types::CompletionError;

/// One meaningful event extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty incremental text fragment.
    Delta(String),
    /// The literal `[DONE]` terminal marker.
    Done,
}

/// Incremental line parser for `text/event-stream` bodies.
///
/// - Collects bytes until a newline, regardless of where chunk boundaries
///   fall (newline scanning on raw bytes is UTF-8 safe; a multi-byte scalar
///   never contains `0x0A`)
/// - `data:` lines carry either the `[DONE]` marker or a JSON payload with
///   an optional delta fragment
/// - Other lines (comments, `event:`, `id:`, `retry:`, blanks) are ignored
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Drop any buffered partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Feed raw response bytes. Returns the events for every line completed
    /// by this chunk, in order; a trailing partial line stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, CompletionError>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }

            match parse_line(&line) {
                Ok(Some(ev)) => out.push(Ok(ev)),
                Ok(None) => {}
                Err(e) => out.push(Err(e)),
            }
        }

        out
    }
}

fn parse_line(line: &[u8]) -> Result<Option<StreamEvent>, CompletionError> {
    let Some(rest) = line.strip_prefix(b"data:") else {
        return Ok(None);
    };
    // The SSE format allows one optional space after the field name.
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);

    let payload = std::str::from_utf8(rest)
        .map_err(|e| CompletionError::MalformedStreamChunk(e.to_string()))?;

    if payload.trim() == "[DONE]" {
        return Ok(Some(StreamEvent::Done));
    }

    let envelope: DeltaEnvelope = serde_json::from_str(payload)
        .map_err(|e| CompletionError::MalformedStreamChunk(e.to_string()))?;

    // Role-only opening events and keep-alives carry no fragment; that is
    // not an error, they just produce nothing.
    let fragment = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty());

    Ok(fragment.map(StreamEvent::Delta))
}

#[derive(Debug, Deserialize)]
struct DeltaEnvelope {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: DeltaContent,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaContent {
    #[serde(default)]
    content: Option<String>,
}
