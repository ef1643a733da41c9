//! Request/response envelope exchanged with the tool worker subprocess.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single JSON object the parent writes to the worker's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Tool name to execute.
    pub tool: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: Value,
}

/// Single JSON object the worker writes to stdout before exiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Whether the tool ran successfully.
    pub ok: bool,
    /// Tool result when `ok` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Short failure trace when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl WorkerResponse {
    /// Successful response carrying a tool result.
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            trace: None,
        }
    }

    /// Failed response carrying an error and trace.
    pub fn failure(error: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
            trace: Some(trace.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{WorkerRequest, WorkerResponse};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn success_omits_error_fields() {
        let response = WorkerResponse::success(json!({"content": "hi"}));
        let encoded = serde_json::to_string(&response).expect("serialize");
        assert_eq!(encoded.contains("error"), false);
        assert_eq!(encoded.contains("trace"), false);
    }

    #[test]
    fn request_defaults_missing_args_to_null() {
        let request: WorkerRequest =
            serde_json::from_str("{\"tool\":\"file_read\"}").expect("deserialize");
        assert_eq!(request.tool, "file_read");
        assert_eq!(request.args, serde_json::Value::Null);
    }
}
