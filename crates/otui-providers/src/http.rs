//! Shared HTTP client and response-classification/SSE-line helpers reused
//! by every adapter.

use std::sync::LazyLock;

use futures::Stream;

use crate::error::{Error, Result};

/// All adapters share one client to pool connections, DNS, and TLS
/// sessions rather than standing up a fresh one per request.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);
    &CLIENT
}

/// Map an HTTP response's status to the adapter failure-kind vocabulary,
/// consuming the body on failure so it can be folded into the error.
pub async fn classify_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after_ms = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .and_then(|secs| secs.checked_mul(1_000));
    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(Error::Auth(body)),
        429 => Err(Error::RateLimited { retry_after_ms }),
        _ => Err(Error::Transport(format!("HTTP {status}: {body}"))),
    }
}

/// Split a streaming HTTP body into `data: ...` lines (SSE framing used by
/// OpenAI-wire and Anthropic backends alike); any other line (blank,
/// `event: ...`, a stray comment) is dropped.
pub fn sse_data_lines(response: reqwest::Response) -> impl Stream<Item = Result<String>> {
    async_stream::stream! {
        let mut buf = String::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = futures::StreamExt::next(&mut bytes).await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(Error::Transport(e.to_string()));
                    return;
                },
            };
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim_end_matches('\r').to_string();
                buf.drain(..=pos);
                if let Some(data) = line.strip_prefix("data:") {
                    yield Ok(data.trim().to_string());
                }
            }
        }
    }
}
