//! Built-in file tools.

mod file_list;
mod file_read;
mod file_read_batch;
mod file_write;

pub use file_list::FileListTool;
pub use file_read::FileReadTool;
pub use file_read_batch::FileReadBatchTool;
pub use file_write::FileWriteTool;

use crate::registry::ToolRegistry;
use std::sync::Arc;

/// Register every built-in tool into `registry`.
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(FileReadTool));
    registry.register(Arc::new(FileWriteTool));
    registry.register(Arc::new(FileListTool));
    registry.register(Arc::new(FileReadBatchTool));
}

/// Build a registry holding only the built-in tools.
pub fn builtin_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);
    registry
}
