use serde_json::{json, Value};

/// Events delivered to the client over the streaming channel, in order:
/// `start`, any number of `chunk`, then `end`. `error` only appears when the
/// run breaks after streaming has begun.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start,
    Chunk { text: String },
    End,
    Error { error: String },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { text: text.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Start => "start",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::End => "end",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Flat JSON payload carried in the `data:` line.
    pub fn payload(&self) -> Value {
        match self {
            StreamEvent::Start | StreamEvent::End => json!({}),
            StreamEvent::Chunk { text } => json!({ "text": text }),
            StreamEvent::Error { error } => json!({ "error": error }),
        }
    }
}
