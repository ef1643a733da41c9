//! Tool for listing text files under a folder.

use crate::builtins::file_read::resolve_existing;
use crate::plugin::{ToolPlugin, parse_args};
use serde::Deserialize;
use serde_json::{Value, json};
use walkdir::WalkDir;
use warden_protocol::{Permission, PermissionRequirement, ToolError};

/// Extensions considered text for listing purposes.
const TEXT_EXTENSIONS: [&str; 8] = ["txt", "md", "py", "json", "yaml", "yml", "csv", "log"];

fn default_max_files() -> usize {
    25
}

#[derive(Debug, Deserialize)]
struct FileListArgs {
    path: String,
    #[serde(default = "default_max_files")]
    max_files: usize,
}

/// Tool that lists text files under a directory, recursively.
#[derive(Debug, Default)]
pub struct FileListTool;

impl ToolPlugin for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List text files in a folder"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path"],
            "properties": {
                "path": {"type": "string"},
                "max_files": {"type": "integer"}
            }
        })
    }

    fn permission_requirements(&self) -> Vec<PermissionRequirement> {
        vec![PermissionRequirement::path_scoped(
            Permission::FilesystemRead,
        )]
    }

    fn run(&self, args: &Value) -> Result<Value, ToolError> {
        let input: FileListArgs = parse_args(args)?;
        let base = resolve_existing(&input.path)?;
        let mut files = Vec::new();
        for entry in WalkDir::new(&base).into_iter().filter_map(Result::ok) {
            if files.len() >= input.max_files {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let is_text = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    TEXT_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                });
            if is_text {
                files.push(entry.path().display().to_string());
            }
        }
        Ok(json!({
            "path": base.display().to_string(),
            "files": files,
        }))
    }
}
