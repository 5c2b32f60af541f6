//! Request/response envelope types.
//!
//! One JSON object per line in, one JSON object per line out. `id` is an
//! opaque caller-supplied token echoed back verbatim so a client pipelining
//! several requests can match responses up; the engine never inspects it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl Response {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            content: Some(ContentBlock::text(result)),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: ErrorEnvelope) -> Self {
        Self { id, content: None, error: Some(error) }
    }
}

/// A single UTF-8 text payload carrying the JSON-serialized handler result
/// (spec.md §6 "content envelope").
#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ContentBlock {
    fn text(result: Value) -> Self {
        Self {
            kind: "text",
            text: result.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
}

impl From<taskgraph_core::EngineError> for ErrorEnvelope {
    fn from(e: taskgraph_core::EngineError) -> Self {
        Self { code: e.code.as_str().to_string(), message: e.message }
    }
}

impl ErrorEnvelope {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self { code: "parse_error".to_string(), message: message.into() }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self { code: "method_not_found".to_string(), message: format!("unknown method '{method}'") }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self { code: "invalid_input".to_string(), message: message.into() }
    }
}
