//! Wire types for the relay API.

use serde::{Deserialize, Serialize};

use crate::graph::ToolInvocation;

// ============================================================================
// Requests
// ============================================================================

/// POST /chat body.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// GET /chat/stream query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    /// Omitted entirely when the graph recorded no tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

/// A flattened tool invocation in the batch response.
#[derive(Debug, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: serde_json::Value,
}

impl From<ToolInvocation> for ToolCallRecord {
    fn from(call: ToolInvocation) -> Self {
        Self {
            name: call.name,
            args: call.args,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error body shared by every failure response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_omits_empty_tool_calls() {
        let response = ChatResponse {
            response: "hi".to_string(),
            session_id: "s1".to_string(),
            tool_calls: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn chat_response_includes_tool_calls_when_present() {
        let response = ChatResponse {
            response: "hi".to_string(),
            session_id: "s1".to_string(),
            tool_calls: Some(vec![ToolCallRecord {
                name: "search".to_string(),
                args: serde_json::json!({"q": "weather"}),
            }]),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"tool_calls\""));
        assert!(json.contains("\"search\""));
    }

    #[test]
    fn chat_request_session_id_defaults_to_none() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(req.message, "hello");
        assert!(req.session_id.is_none());
    }
}
