//! Streaming POST to a provider, re-emitted as SSE frames.

use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;

use super::sse::{LineBuffer, SseFrame};

/// Path used when the engine has no `chat` path override.
pub const DEFAULT_CHAT_PATH: &str = "/chat/completions";

/// Everything needed to open one provider stream.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub base_url: String,
    /// Headers in precedence order; a later name replaces an earlier one
    /// regardless of case.
    pub headers: Vec<(String, String)>,
    pub payload: Value,
    /// Budget for the whole exchange (connect + full body drain).
    pub timeout: Duration,
    pub path: Option<String>,
}

impl RelayRequest {
    /// `base_url` without trailing slashes plus the resolved path.
    pub fn url(&self) -> String {
        let path = match self.path.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => DEFAULT_CHAT_PATH,
        };
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Failure anywhere in the provider exchange, carried as display text.
#[derive(Debug, thiserror::Error)]
enum RelayError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid header '{name}': {message}")]
    Header { name: String, message: String },
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, RelayError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| RelayError::Header {
            name: name.clone(),
            message: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| RelayError::Header {
            name: name.clone(),
            message: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Open a streaming POST and re-emit the provider body line by line.
///
/// The returned stream never fails: non-2xx status, connect errors, timeouts
/// and mid-stream disconnects all end it with exactly one
/// [`SseFrame::Error`]. The HTTP status is checked before any body is read,
/// so an error status yields no data frames. Dropping the stream drops the
/// in-flight response and closes the provider connection.
pub fn stream_relay(client: &Client, request: RelayRequest) -> impl Stream<Item = SseFrame> + Send + 'static {
    let client = client.clone();

    stream! {
        let url = request.url();

        let headers = match build_headers(&request.headers) {
            Ok(headers) => headers,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Rejected relay headers");
                yield SseFrame::Error(e.to_string());
                return;
            }
        };

        tracing::debug!(url = %url, timeout_secs = request.timeout.as_secs_f64(), "Opening provider stream");

        let response = client
            .post(&url)
            .headers(headers)
            .json(&request.payload)
            .timeout(request.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Provider request failed");
                yield SseFrame::Error(RelayError::from(e).to_string());
                return;
            }
        };

        let mut body = Box::pin(response.bytes_stream());
        let mut lines = LineBuffer::new();
        let mut forwarded = 0usize;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in lines.push(&bytes) {
                        forwarded += 1;
                        yield SseFrame::from_line(&line);
                    }
                }
                Err(e) => {
                    tracing::error!(url = %url, forwarded, error = %e, "Provider stream interrupted");
                    yield SseFrame::Error(RelayError::from(e).to_string());
                    return;
                }
            }
        }

        if let Some(tail) = lines.finish() {
            forwarded += 1;
            yield SseFrame::from_line(&tail);
        }

        tracing::debug!(url = %url, forwarded, "Provider stream finished");
    }
}
