//! HTTP-based transport shared by the SSE and streamable-HTTP transport
//! kinds. Both speak JSON-RPC over a single POST endpoint; they differ
//! only in the `Accept` header they advertise (`text/event-stream` vs.
//! `application/json`), per the MCP transport spec. Header-based auth
//! (including OAuth bearer tokens) is carried as a plain header map set at
//! construction time.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use reqwest::Client;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    traits::McpTransport,
    types::{Headers, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse},
};

pub struct HttpTransport {
    client: Client,
    url: String,
    headers: Headers,
    accept: &'static str,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new_sse(url: &str, headers: Headers) -> Result<Arc<Self>> {
        Self::new(url, headers, "text/event-stream")
    }

    pub fn new_streamable_http(url: &str, headers: Headers) -> Result<Arc<Self>> {
        Self::new(url, headers, "application/json")
    }

    fn new(url: &str, headers: Headers, accept: &'static str) -> Result<Arc<Self>> {
        let client = Client::builder().timeout(std::time::Duration::from_secs(60)).build()?;
        Ok(Arc::new(Self { client, url: url.to_string(), headers, accept, next_id: AtomicU64::new(1) }))
    }

    fn apply_headers(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder
    }
}

#[async_trait::async_trait]
impl McpTransport for HttpTransport {
    async fn request(&self, method: &str, params: Option<serde_json::Value>) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        debug!(method = %method, id = %id, url = %self.url, "HTTP client -> MCP server");

        let mut builder =
            self.client.post(&self.url).header("Content-Type", "application/json").header("Accept", self.accept).json(&req);
        builder = self.apply_headers(builder);

        let http_resp = builder.send().await.map_err(|e| Error::CallFailed { name: method.to_string(), reason: e.to_string() })?;

        if !http_resp.status().is_success() {
            let status = http_resp.status();
            let body = http_resp.text().await.unwrap_or_default();
            return Err(Error::CallFailed { name: method.to_string(), reason: format!("HTTP {status}: {body}") });
        }

        let resp: JsonRpcResponse =
            http_resp.json().await.map_err(|e| Error::CallFailed { name: method.to_string(), reason: e.to_string() })?;

        if let Some(ref err) = resp.error {
            return Err(Error::CallFailed { name: method.to_string(), reason: format!("code={} message={}", err.code, err.message) });
        }

        Ok(resp)
    }

    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        let notif = JsonRpcNotification { jsonrpc: "2.0".into(), method: method.into(), params };
        debug!(method = %method, url = %self.url, "HTTP client -> MCP server (notification)");

        let mut builder = self.client.post(&self.url).header("Content-Type", "application/json").json(&notif);
        builder = self.apply_headers(builder);

        let http_resp = builder.send().await?;
        if !http_resp.status().is_success() {
            warn!(method = %method, status = %http_resp.status(), "notification returned non-success");
        }
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        let mut builder = self.client.head(&self.url).timeout(std::time::Duration::from_secs(5));
        builder = self.apply_headers(builder);
        builder.send().await.is_ok()
    }

    async fn kill(&self) {
        // Remote transports hold no local process to kill.
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_and_streamable_variants_construct() {
        assert!(HttpTransport::new_sse("http://localhost:8080/mcp", Headers::new()).is_ok());
        assert!(HttpTransport::new_streamable_http("http://localhost:8080/mcp", Headers::new()).is_ok());
    }

    #[tokio::test]
    async fn is_alive_false_when_unreachable() {
        let transport = HttpTransport::new_sse("http://127.0.0.1:1/mcp", Headers::new()).unwrap();
        assert!(!transport.is_alive().await);
    }

    #[tokio::test]
    async fn request_fails_when_unreachable() {
        let transport = HttpTransport::new_streamable_http("http://127.0.0.1:1/mcp", Headers::new()).unwrap();
        assert!(transport.request("test", None).await.is_err());
    }

    #[tokio::test]
    async fn kill_is_a_no_op() {
        let transport = HttpTransport::new_sse("http://localhost:8080/mcp", Headers::new()).unwrap();
        transport.kill().await;
    }
}
