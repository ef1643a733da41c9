//! Tool for reading one text file.

use crate::plugin::{ToolPlugin, parse_args, truncate_chars};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use warden_protocol::{Permission, PermissionRequirement, ToolError};

/// Maximum number of characters returned from one file.
const MAX_READ_CHARS: usize = 200_000;

#[derive(Debug, Deserialize)]
struct FileReadArgs {
    path: String,
}

/// Tool that reads a single text file.
#[derive(Debug, Default)]
pub struct FileReadTool;

impl ToolPlugin for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read text file content"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path"],
            "properties": {"path": {"type": "string"}}
        })
    }

    fn permission_requirements(&self) -> Vec<PermissionRequirement> {
        vec![PermissionRequirement::path_scoped(
            Permission::FilesystemRead,
        )]
    }

    fn run(&self, args: &Value) -> Result<Value, ToolError> {
        let input: FileReadArgs = parse_args(args)?;
        let path = resolve_existing(&input.path)?;
        let content = fs::read_to_string(&path)
            .map_err(|err| ToolError::ExecutionFailed(format!("failed to read {path:?}: {err}")))?;
        Ok(json!({
            "path": path.display().to_string(),
            "content": truncate_chars(&content, MAX_READ_CHARS),
        }))
    }
}

pub(crate) fn resolve_existing(raw: &str) -> Result<std::path::PathBuf, ToolError> {
    let path = Path::new(raw);
    path.canonicalize()
        .map_err(|err| ToolError::ExecutionFailed(format!("failed to resolve {raw}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::FileReadTool;
    use crate::plugin::ToolPlugin;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn reads_file_content() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hello worker").expect("write");

        let result = FileReadTool
            .run(&json!({"path": path.display().to_string()}))
            .expect("run");
        assert_eq!(result["content"], json!("hello worker"));
    }

    #[test]
    fn missing_file_is_an_execution_failure() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.txt");
        let err = FileReadTool
            .run(&json!({"path": path.display().to_string()}))
            .expect_err("missing");
        assert_eq!(err.to_string().contains("failed to resolve"), true);
    }

    #[test]
    fn missing_path_argument_is_invalid() {
        let err = FileReadTool.run(&json!({})).expect_err("invalid");
        assert_eq!(err.to_string().starts_with("invalid arguments"), true);
    }
}
