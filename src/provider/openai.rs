use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::sse::{SseParser, StreamEvent};
use super::types::{CompletionError, CompletionRequest};

const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Client for the streaming chat-completion endpoint. Cheap to clone; one
/// instance drives at most one request at a time via [`stream`].
///
/// [`stream`]: CompletionClient::stream
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    api_base: String,
}

impl CompletionClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_api_base(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Run one streaming completion.
    ///
    /// `on_text` receives the full running text after every delta, so the
    /// caller can overwrite a display field each call. Resolves with
    /// `Ok(Some(text))` when the stream ends, `Ok(None)` when `cancel` fires
    /// (cancellation is not an error), and `Err` otherwise. Once `cancel`
    /// has fired, no further `on_text` call is observable; dropping the
    /// response aborts the underlying transfer.
    pub async fn stream(
        &self,
        request: &CompletionRequest,
        api_key: &str,
        cancel: CancellationToken,
        mut on_text: impl FnMut(&str),
    ) -> Result<Option<String>, CompletionError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let url = format!("{}/v1/chat/completions", self.api_base);
        tracing::debug!(model = %request.model, "starting completion request");

        let send = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send();

        let resp = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            resp = send => resp.map_err(CompletionError::TransportFailure)?,
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.code)
                .unwrap_or_else(|_| "unknown".to_string());
            tracing::debug!(%status, %code, "completion request rejected");
            return Err(CompletionError::ProviderRejected {
                status: status.as_u16(),
                code,
            });
        }

        let mut parser = SseParser::new();
        let mut stream = resp.bytes_stream();
        let mut text = String::new();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                item = stream.next() => match item {
                    None => {
                        tracing::debug!(chars = text.len(), "stream closed");
                        return Ok(Some(text));
                    }
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => return Err(CompletionError::TransportFailure(e)),
                },
            };

            // A chunk already in flight when the token fired must not reach
            // the sink.
            if cancel.is_cancelled() {
                return Ok(None);
            }

            for event in parser.push(&chunk) {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                match event? {
                    StreamEvent::Done => {
                        tracing::debug!(chars = text.len(), "stream finished");
                        return Ok(Some(text));
                    }
                    StreamEvent::Delta(fragment) => {
                        text.push_str(&fragment);
                        on_text(&text);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
}
