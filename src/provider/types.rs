use serde::Serialize;
use thiserror::Error;

/// One request to the completion endpoint. Built once per invocation;
/// `stream` is always true, the endpoint is only ever used in streaming mode.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            stream: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Ways a completion can fail. Cancellation is not one of them: a cancelled
/// session resolves with `Ok(None)`.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The endpoint answered with a non-success status. `code` is the
    /// provider's error code, or `"unknown"` when the body gave none.
    #[error("completion endpoint rejected the request: HTTP {status} ({code})")]
    ProviderRejected { status: u16, code: String },

    /// A `data:` line in the event stream did not carry valid JSON.
    #[error("malformed stream chunk: {0}")]
    MalformedStreamChunk(String),

    /// Connection-level failure before or during streaming.
    #[error("transport failure: {0}")]
    TransportFailure(#[source] reqwest::Error),
}
