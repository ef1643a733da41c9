//! Tool plugin trait and metadata spec.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use warden_protocol::{PermissionRequirement, ToolError};

/// Tool metadata spec for discovery and permission planning.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON schema for tool arguments.
    pub args_schema: Value,
    /// Permissions the parent must check before execution.
    pub permission_requirements: Vec<PermissionRequirement>,
}

/// Interface for tools runnable inside the worker process.
pub trait ToolPlugin: Send + Sync + Debug {
    /// Return the tool name.
    fn name(&self) -> &str;
    /// Return the tool description.
    fn description(&self) -> &str;
    /// Return the JSON schema for tool arguments.
    fn args_schema(&self) -> Value;
    /// Return the permissions required before execution.
    fn permission_requirements(&self) -> Vec<PermissionRequirement>;

    /// Execute the tool against its arguments.
    fn run(&self, args: &Value) -> Result<Value, ToolError>;

    /// Build a `ToolSpec` describing this tool.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            args_schema: self.args_schema(),
            permission_requirements: self.permission_requirements(),
        }
    }
}

/// Deserialize tool arguments, mapping failures to `InvalidArguments`.
pub fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone())
        .map_err(|err| ToolError::InvalidArguments(err.to_string()))
}

/// Keep at most `max_chars` characters of `value`.
pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}
