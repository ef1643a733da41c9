//! Tool plugins executed inside the worker subprocess.
//!
//! Plugins are deliberately narrow: they see only their deserialized
//! arguments and the filesystem. Authorization happens in the parent before
//! a worker is ever spawned.

pub mod builtins;
pub mod plugin;
pub mod registry;
pub mod worker;

/// Built-in tool registration helpers.
pub use builtins::{builtin_registry, register_builtin_tools};
/// Plugin trait and metadata spec.
pub use plugin::{ToolPlugin, ToolSpec};
/// Tool registry type.
pub use registry::ToolRegistry;
/// Worker entry loop.
pub use worker::run_worker;
