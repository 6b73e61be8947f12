use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Connection refused, DNS, timeout.
    Transport,
    /// Backend answered with a non-success HTTP status.
    Status,
    /// Payload did not have the expected shape.
    Decode,
    /// Backend answered but reported an application-level failure.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error body the backend framework emits for validation and server faults.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendErrorBody {
    pub detail: serde_json::Value,
}

impl BackendErrorBody {
    pub fn summary(&self) -> String {
        match &self.detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
