//! JSON-RPC envelope for regulatory tool calls.
//!
//! Request: `{"jsonrpc":"2.0","id":N,"method":"tools/call","params":{"name":...,"arguments":{...}}}`
//! Response: the tool payload is a JSON document serialized as a string at
//! `result.content[0].text`, so it is decoded twice. Decoding happens here and
//! nowhere else; callers only ever see a `serde_json::Value` payload or a
//! `ToolError`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ToolError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Tools the regulatory data service exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ValidateIngredients,
    CheckAdditiveStatus,
    ValidateNutritionalClaims,
    CheckAllergenRequirements,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        Self::ValidateIngredients,
        Self::CheckAdditiveStatus,
        Self::ValidateNutritionalClaims,
        Self::CheckAllergenRequirements,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateIngredients => "validate_ingredients",
            Self::CheckAdditiveStatus => "check_additive_status",
            Self::ValidateNutritionalClaims => "validate_nutritional_claims",
            Self::CheckAllergenRequirements => "check_allergen_requirements",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("unknown tool '{}'", s))
    }
}

/// `tools/call` request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Option<ToolCallParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn tool_call(id: u64, tool: ToolName, arguments: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: METHOD_TOOLS_CALL.to_string(),
            params: Some(ToolCallParams {
                name: tool.as_str().to_string(),
                arguments,
            }),
        }
    }

    /// Single-line wire form, newline terminated
    pub fn to_line(&self) -> Result<String, ToolError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| ToolError::Malformed(format!("failed to encode request: {}", e)))?;
        line.push('\n');
        Ok(line)
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    #[serde(default)]
    pub id: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolCallResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,

    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    /// Successful tool response carrying `payload` as embedded JSON text
    pub fn tool_result(id: serde_json::Value, payload: &serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(ToolCallResult {
                content: vec![ContentItem {
                    kind: "text".to_string(),
                    text: Some(payload.to_string()),
                }],
                is_error: false,
            }),
            error: None,
        }
    }

    /// Tool-level failure (the call reached the tool, the tool refused it)
    pub fn tool_failure(id: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(ToolCallResult {
                content: vec![ContentItem {
                    kind: "text".to_string(),
                    text: Some(message.into()),
                }],
                is_error: true,
            }),
            error: None,
        }
    }

    /// Protocol-level error
    pub fn rpc_error(id: serde_json::Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Unwrap the doubly-encoded tool payload
    pub fn into_payload(self) -> Result<serde_json::Value, ToolError> {
        if let Some(error) = self.error {
            return Err(ToolError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = self
            .result
            .ok_or_else(|| ToolError::Malformed("response has neither result nor error".into()))?;

        let text = result
            .content
            .into_iter()
            .next()
            .and_then(|item| item.text)
            .ok_or_else(|| ToolError::Malformed("result.content[0].text is missing".into()))?;

        if result.is_error {
            return Err(ToolError::ToolFailed(text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ToolError::Malformed(format!("tool payload is not JSON: {}", e)))
    }
}

/// Decode a subprocess's stdout: the response is its last non-empty line
pub fn decode_stdout(stdout: &str) -> Result<serde_json::Value, ToolError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(ToolError::EmptyOutput)?;

    decode_response(line)
}

/// Decode one serialized response envelope
pub fn decode_response(body: &str) -> Result<serde_json::Value, ToolError> {
    let response: JsonRpcResponse = serde_json::from_str(body)
        .map_err(|e| ToolError::Malformed(format!("unparsable response line: {}", e)))?;
    response.into_payload()
}
