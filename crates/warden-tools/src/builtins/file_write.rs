//! Tool for writing one text file with a diff preview gate.

use crate::plugin::{ToolPlugin, parse_args};
use serde::Deserialize;
use serde_json::{Value, json};
use similar::TextDiff;
use std::fs;
use std::path::{Path, PathBuf};
use warden_protocol::{Permission, PermissionRequirement, ToolError};

/// Suffix appended to preview artifacts written next to the target.
const PREVIEW_SUFFIX: &str = ".warden.preview";

#[derive(Debug, Deserialize)]
struct FileWriteArgs {
    path: String,
    content: String,
    #[serde(default)]
    confirm: bool,
    #[serde(default)]
    preview_only: bool,
    #[serde(default)]
    write_preview_file: bool,
}

/// Tool that writes a file, gated behind a unified-diff preview unless the
/// caller confirmed the change.
#[derive(Debug, Default)]
pub struct FileWriteTool;

impl ToolPlugin for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write text file content"
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "content"],
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
                "confirm": {"type": "boolean"},
                "preview_only": {"type": "boolean"}
            }
        })
    }

    fn permission_requirements(&self) -> Vec<PermissionRequirement> {
        vec![PermissionRequirement::path_scoped(
            Permission::FilesystemWrite,
        )]
    }

    fn run(&self, args: &Value) -> Result<Value, ToolError> {
        let input: FileWriteArgs = parse_args(args)?;
        let path = absolute_path(&input.path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ToolError::ExecutionFailed(format!("failed to create directories: {err}"))
            })?;
        }

        let prior = if path.exists() {
            fs::read_to_string(&path).map_err(|err| {
                ToolError::ExecutionFailed(format!("failed to read {path:?}: {err}"))
            })?
        } else {
            String::new()
        };
        let path_text = path.display().to_string();
        let diff = TextDiff::from_lines(&prior, &input.content)
            .unified_diff()
            .header(&path_text, &path_text)
            .to_string();

        if input.write_preview_file {
            let preview_path = PathBuf::from(format!("{path_text}{PREVIEW_SUFFIX}"));
            fs::write(&preview_path, &input.content).map_err(|err| {
                ToolError::ExecutionFailed(format!("failed to write preview: {err}"))
            })?;
            return Ok(json!({
                "path": preview_path.display().to_string(),
                "preview_diff": diff,
                "requires_confirmation": true,
            }));
        }

        if input.preview_only || (path.exists() && !input.confirm) {
            return Ok(json!({
                "path": path_text,
                "preview_diff": diff,
                "requires_confirmation": true,
            }));
        }

        fs::write(&path, input.content.as_bytes())
            .map_err(|err| ToolError::ExecutionFailed(format!("failed to write file: {err}")))?;
        Ok(json!({
            "path": path_text,
            "written_chars": input.content.chars().count(),
            "preview_diff": diff,
        }))
    }
}

fn absolute_path(raw: &str) -> Result<PathBuf, ToolError> {
    let path = Path::new(raw);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| ToolError::ExecutionFailed(format!("failed to resolve {raw}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::FileWriteTool;
    use crate::plugin::ToolPlugin;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn new_file_is_written_directly() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("fresh.txt");
        let result = FileWriteTool
            .run(&json!({
                "path": path.display().to_string(),
                "content": "line one\n",
            }))
            .expect("run");

        assert_eq!(result["written_chars"], json!(9));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "line one\n");
    }

    #[test]
    fn overwrite_without_confirm_returns_preview() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, "old\n").expect("seed");

        let result = FileWriteTool
            .run(&json!({
                "path": path.display().to_string(),
                "content": "new\n",
            }))
            .expect("run");

        assert_eq!(result["requires_confirmation"], json!(true));
        let diff = result["preview_diff"].as_str().expect("diff");
        assert_eq!(diff.contains("-old"), true);
        assert_eq!(diff.contains("+new"), true);
        // The target is untouched.
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "old\n");
    }

    #[test]
    fn confirmed_overwrite_replaces_content() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, "old\n").expect("seed");

        FileWriteTool
            .run(&json!({
                "path": path.display().to_string(),
                "content": "new\n",
                "confirm": true,
            }))
            .expect("run");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new\n");
    }

    #[test]
    fn preview_file_lands_next_to_target() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("doc.md");
        let result = FileWriteTool
            .run(&json!({
                "path": path.display().to_string(),
                "content": "# heading\n",
                "write_preview_file": true,
            }))
            .expect("run");

        let preview = result["path"].as_str().expect("path");
        assert_eq!(preview.ends_with(".warden.preview"), true);
        assert_eq!(path.exists(), false);
        assert_eq!(
            std::fs::read_to_string(preview).expect("read"),
            "# heading\n"
        );
    }
}
