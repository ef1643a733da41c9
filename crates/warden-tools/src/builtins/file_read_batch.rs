//! Tool for reading several text files with per-file size limits.

use crate::plugin::{ToolPlugin, parse_args, truncate_chars};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use warden_protocol::{Permission, PermissionRequirement, ToolError};

fn default_max_chars() -> usize {
    5000
}

#[derive(Debug, Deserialize)]
struct FileReadBatchArgs {
    paths: Vec<String>,
    #[serde(default = "default_max_chars")]
    max_chars_per_file: usize,
}

/// Tool that reads several files, reporting per-file errors inline.
#[derive(Debug, Default)]
pub struct FileReadBatchTool;

impl ToolPlugin for FileReadBatchTool {
    fn name(&self) -> &str {
        "file_read_batch"
    }

    fn description(&self) -> &str {
        "Read multiple text files with size limits"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["paths"],
            "properties": {
                "paths": {"type": "array", "items": {"type": "string"}},
                "max_chars_per_file": {"type": "integer"}
            }
        })
    }

    fn permission_requirements(&self) -> Vec<PermissionRequirement> {
        vec![PermissionRequirement::unscoped(Permission::FilesystemRead)]
    }

    fn run(&self, args: &Value) -> Result<Value, ToolError> {
        let input: FileReadBatchArgs = parse_args(args)?;
        let mut files = Vec::with_capacity(input.paths.len());
        for raw in &input.paths {
            let path = Path::new(raw);
            match fs::read_to_string(path) {
                Ok(content) => files.push(json!({
                    "path": path.display().to_string(),
                    "content": truncate_chars(&content, input.max_chars_per_file),
                })),
                Err(err) => files.push(json!({
                    "path": path.display().to_string(),
                    "error": err.to_string(),
                })),
            }
        }
        Ok(json!({ "files": files }))
    }
}

#[cfg(test)]
mod tests {
    use super::FileReadBatchTool;
    use crate::plugin::ToolPlugin;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn mixes_successes_and_per_file_errors() {
        let dir = tempdir().expect("tempdir");
        let present = dir.path().join("here.txt");
        std::fs::write(&present, "content").expect("write");
        let absent = dir.path().join("gone.txt");

        let result = FileReadBatchTool
            .run(&json!({
                "paths": [present.display().to_string(), absent.display().to_string()],
            }))
            .expect("run");
        let files = result["files"].as_array().expect("files");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["content"], json!("content"));
        assert_eq!(files[1]["error"].is_string(), true);
    }

    #[test]
    fn per_file_char_limit_applies() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("long.txt");
        std::fs::write(&path, "abcdefghij").expect("write");

        let result = FileReadBatchTool
            .run(&json!({
                "paths": [path.display().to_string()],
                "max_chars_per_file": 4,
            }))
            .expect("run");
        assert_eq!(result["files"][0]["content"], json!("abcd"));
    }
}
