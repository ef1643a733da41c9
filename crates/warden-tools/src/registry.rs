//! Registry for tool plugins.

use crate::plugin::{ToolPlugin, ToolSpec};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory registry for tool plugins.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    /// Map of tool name to implementation.
    tools: Arc<RwLock<HashMap<String, Arc<dyn ToolPlugin>>>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin by name.
    pub fn register(&self, plugin: Arc<dyn ToolPlugin>) {
        debug!("registering tool (name={})", plugin.name());
        self.tools.write().insert(plugin.name().to_string(), plugin);
    }

    /// Fetch a plugin by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolPlugin>> {
        self.tools.read().get(name).cloned()
    }

    /// List all registered tool names.
    pub fn list(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Return tool specs for all registered plugins.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.read().values().map(|tool| tool.spec()).collect()
    }
}
