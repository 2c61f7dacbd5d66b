//! Regulatory tools over a short-lived stdio subprocess.
//!
//! Each call spawns the tool server, writes one JSON-RPC request line to its
//! stdin, closes stdin and takes the last stdout line as the response. The
//! child is killed when the timeout elapses or when the calling future is
//! dropped, so a cancelled run never leaves an orphaned process. A semaphore
//! caps how many servers run at once.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::tool_protocol::{decode_stdout, JsonRpcRequest, ToolName};
use super::{ToolClient, ToolError};

/// Default response timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on concurrently running tool servers
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Tool client using subprocess mode
pub struct StdioToolClient {
    /// Tool server executable
    command: String,

    /// Arguments passed to the executable
    args: Vec<String>,

    call_timeout: Duration,

    permits: Arc<Semaphore>,

    next_id: AtomicU64,
}

impl StdioToolClient {
    /// Create a client for a server command
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            call_timeout: DEFAULT_TIMEOUT,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    /// Spawn the server, exchange one request/response, collect stdout
    async fn exchange(&self, request_line: &str) -> Result<String, ToolError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn(format!("{}: {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A server that exits before reading closes the pipe; its exit status tells the story
            if let Err(e) = stdin.write_all(request_line.as_bytes()).await {
                debug!(error = %e, "Tool server closed stdin early");
            }
            // Drop stdin to signal EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::Spawn(format!("failed to wait for tool server: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ToolError::Malformed("tool output is not valid UTF-8".to_string()))
    }
}

#[async_trait]
impl ToolClient for StdioToolClient {
    fn name(&self) -> &str {
        "stdio"
    }

    async fn call_tool(
        &self,
        tool: ToolName,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request_line = JsonRpcRequest::tool_call(id, tool, arguments).to_line()?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ToolError::Spawn("tool client is shut down".to_string()))?;

        debug!(%tool, id, command = %self.command, "Calling regulatory tool");

        // Dropping the exchange future on timeout drops the child, which kills it
        let stdout = match timeout(self.call_timeout, self.exchange(&request_line)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%tool, timeout_ms = self.call_timeout.as_millis() as u64, "Tool server timed out");
                return Err(ToolError::Timeout {
                    tool: tool.to_string(),
                    timeout: self.call_timeout,
                });
            }
        };

        decode_stdout(&stdout)
    }
}
