//! Tool registry: a closed name→constructor map.
//!
//! Discovery is explicit registration — there is no directory scan or
//! import-by-name. A deployment lists the tools it ships, and the
//! registry instantiates them on demand. A version-compatibility hook
//! lets the host reject tools whose schemas it cannot serve.

use crate::schema::{Tool, ToolSchema};
use std::collections::HashMap;
use std::sync::Arc;

type Constructor = Box<dyn Fn() -> Arc<dyn Tool> + Send + Sync>;
type CompatCheck = Box<dyn Fn(&ToolSchema) -> bool + Send + Sync>;

/// Maps tool names to constructor functions.
pub struct ToolRegistry {
    constructors: HashMap<String, Constructor>,
    compat_check: Option<CompatCheck>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            compat_check: None,
        }
    }

    /// A registry pre-seeded with the built-in tools, rooted at the
    /// given directory for filesystem access.
    pub fn with_builtins(fs_root: std::path::PathBuf) -> Self {
        let mut registry = Self::new();
        registry.register("calculator", || Arc::new(crate::builtin::CalculatorTool));
        registry.register("time", || Arc::new(crate::builtin::TimeTool));
        registry.register("random", || Arc::new(crate::builtin::RandomTool));
        registry.register("search", || Arc::new(crate::builtin::SearchTool::new()));
        registry.register("weather", || Arc::new(crate::builtin::WeatherTool::new()));
        registry.register("filesystem", move || {
            Arc::new(crate::builtin::FileSystemTool::new(fs_root.clone()))
        });
        registry
    }

    /// Register a constructor under a name.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn Tool> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Install a compatibility hook consulted by [`create`](Self::create).
    pub fn set_compat_check<F>(&mut self, check: F)
    where
        F: Fn(&ToolSchema) -> bool + Send + Sync + 'static,
    {
        self.compat_check = Some(Box::new(check));
    }

    /// Instantiate a tool by name. Returns None for unknown names or
    /// tools rejected by the compatibility hook.
    pub fn create(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tool = self.constructors.get(name)?();
        if let Some(check) = &self.compat_check {
            if !check(&tool.schema()) {
                tracing::warn!(tool = name, "tool rejected by compatibility check");
                return None;
            }
        }
        Some(tool)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_all_constructible() {
        let dir = std::env::temp_dir();
        let registry = ToolRegistry::with_builtins(dir);
        for name in registry.names() {
            let tool = registry.create(&name).expect("constructor failed");
            assert_eq!(tool.schema().name, name);
        }
    }

    #[test]
    fn unknown_names_yield_none() {
        let registry = ToolRegistry::new();
        assert!(registry.create("nope").is_none());
    }

    #[test]
    fn compat_check_can_reject() {
        let mut registry = ToolRegistry::with_builtins(std::env::temp_dir());
        registry.set_compat_check(|schema| schema.name != "random");
        assert!(registry.create("random").is_none());
        assert!(registry.create("calculator").is_some());
    }
}
