//! Regulatory tools over HTTP.
//!
//! Posts the same JSON-RPC envelope the stdio transport writes to a long-lived
//! service, avoiding a process spawn per call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::tool_protocol::{decode_response, JsonRpcRequest, ToolName};
use super::{ToolClient, ToolError};

/// JSON-RPC over HTTP tool client
pub struct HttpToolClient {
    endpoint: String,
    call_timeout: Duration,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpToolClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            call_timeout: super::stdio_tool::DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

#[async_trait]
impl ToolClient for HttpToolClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn call_tool(
        &self,
        tool: ToolName,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::tool_call(id, tool, arguments);

        debug!(%tool, id, endpoint = %self.endpoint, "Calling regulatory tool over HTTP");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.call_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool: tool.to_string(),
                        timeout: self.call_timeout,
                    }
                } else {
                    ToolError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Http(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(ToolError::Http(format!("{}: {}", status, body.trim())));
        }

        decode_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = HttpToolClient::new("http://127.0.0.1:1/rpc")
            .with_timeout(Duration::from_secs(2));
        let result = client
            .call_tool(ToolName::ValidateIngredients, json!({ "ingredients": ["water"] }))
            .await;

        let err = result.unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {:?}", err);
    }
}
