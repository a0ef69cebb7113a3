//! The tool manager: registration, validated dispatch, statistics.

use crate::error::ToolError;
use crate::schema::{Tool, ToolSchema};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Outcome of one tool call.
///
/// A validation failure still produces a result (`ok = false`) — the
/// tool itself was never invoked, so no side effect can have happened.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The tool called.
    pub name: String,
    /// The returned value, on success.
    pub value: Option<Value>,
    /// Whether the call succeeded.
    pub ok: bool,
    /// Error description, on failure.
    pub error: Option<String>,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

/// Per-tool execution statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolStats {
    /// Calls that reached the tool or failed validation.
    pub calls: u64,
    /// Calls that returned a value.
    pub successes: u64,
    /// Calls that failed (validation or execution).
    pub failures: u64,
    /// Total wall-clock time across calls.
    pub total_elapsed: Duration,
}

/// Listing entry for one registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// The tool's schema.
    pub schema: ToolSchema,
    /// Category it was registered under.
    pub category: String,
    /// Statistics snapshot.
    pub stats: ToolStats,
}

struct Entry {
    tool: Arc<dyn Tool>,
    category: String,
    stats: Mutex<ToolStats>,
}

/// Registers tools and dispatches calls with schema validation.
#[derive(Default)]
pub struct ToolManager {
    tools: RwLock<HashMap<String, Arc<Entry>>>,
}

impl ToolManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under a category. Re-registering a name
    /// replaces the tool and resets its statistics.
    pub fn register(&self, tool: Arc<dyn Tool>, category: impl Into<String>) {
        let name = tool.schema().name;
        let entry = Arc::new(Entry {
            tool,
            category: category.into(),
            stats: Mutex::new(ToolStats::default()),
        });
        self.tools.write().expect("tool table poisoned").insert(name, entry);
    }

    /// Remove a tool. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools
            .write()
            .expect("tool table poisoned")
            .remove(name)
            .is_some()
    }

    /// Look up a registered tool.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .expect("tool table poisoned")
            .get(name)
            .map(|e| Arc::clone(&e.tool))
    }

    /// Call a tool by name with JSON arguments.
    ///
    /// Arguments are validated against the schema first: every
    /// required parameter must be present and enum parameters must
    /// hold a listed value. On violation the tool is NOT executed and
    /// the result carries `ok = false` with the reason. Declared
    /// defaults are injected for absent optional parameters.
    pub async fn call(&self, name: &str, args: Map<String, Value>) -> ToolResult {
        let started = Instant::now();

        let Some(entry) = self
            .tools
            .read()
            .expect("tool table poisoned")
            .get(name)
            .map(Arc::clone)
        else {
            return ToolResult {
                name: name.to_string(),
                value: None,
                ok: false,
                error: Some(ToolError::NotFound(name.to_string()).to_string()),
                elapsed: started.elapsed(),
            };
        };

        let schema = entry.tool.schema();
        let args = match validate_and_fill(&schema, args) {
            Ok(args) => args,
            Err(err) => {
                let result = ToolResult {
                    name: name.to_string(),
                    value: None,
                    ok: false,
                    error: Some(err.to_string()),
                    elapsed: started.elapsed(),
                };
                record(&entry, &result);
                return result;
            }
        };

        let outcome = entry.tool.execute(&args).await;
        let elapsed = started.elapsed();
        let result = match outcome {
            Ok(value) => {
                tracing::debug!(tool = name, ?elapsed, "tool call succeeded");
                ToolResult {
                    name: name.to_string(),
                    value: Some(value),
                    ok: true,
                    error: None,
                    elapsed,
                }
            }
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "tool call failed");
                ToolResult {
                    name: name.to_string(),
                    value: None,
                    ok: false,
                    error: Some(err.to_string()),
                    elapsed,
                }
            }
        };
        record(&entry, &result);
        result
    }

    /// List registered tools, optionally restricted to one category.
    pub fn list_tools(&self, category: Option<&str>) -> Vec<ToolInfo> {
        let tools = self.tools.read().expect("tool table poisoned");
        let mut infos: Vec<ToolInfo> = tools
            .values()
            .filter(|e| category.is_none_or(|c| e.category == c))
            .map(|e| ToolInfo {
                schema: e.tool.schema(),
                category: e.category.clone(),
                stats: e.stats.lock().expect("stats poisoned").clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.schema.name.cmp(&b.schema.name));
        infos
    }

    /// Statistics for one tool.
    pub fn stats(&self, name: &str) -> Option<ToolStats> {
        self.tools
            .read()
            .expect("tool table poisoned")
            .get(name)
            .map(|e| e.stats.lock().expect("stats poisoned").clone())
    }
}

fn record(entry: &Entry, result: &ToolResult) {
    let mut stats = entry.stats.lock().expect("stats poisoned");
    stats.calls += 1;
    stats.total_elapsed += result.elapsed;
    if result.ok {
        stats.successes += 1;
    } else {
        stats.failures += 1;
    }
}

/// Check required parameters and enum membership; inject defaults.
fn validate_and_fill(
    schema: &ToolSchema,
    mut args: Map<String, Value>,
) -> Result<Map<String, Value>, ToolError> {
    for param in &schema.parameters {
        match args.get(&param.name) {
            Some(value) => {
                if let Some(allowed) = &param.enum_values {
                    if !allowed.contains(value) {
                        return Err(ToolError::InvalidArgs(format!(
                            "parameter '{}' must be one of {allowed:?}, got {value}",
                            param.name
                        )));
                    }
                }
            }
            None if param.required => {
                return Err(ToolError::InvalidArgs(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            None => {
                if let Some(default) = &param.default {
                    args.insert(param.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(args)
}
