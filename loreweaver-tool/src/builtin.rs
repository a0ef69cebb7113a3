//! Built-in tools: calculator, time, random, filesystem, and the
//! search/weather stubs.
//!
//! The calculator evaluates through `evalexpr` — a pure expression
//! interpreter with no host access, so there is nothing to escape to.
//! The filesystem tool is confined to a configured root and rejects
//! any path that is absolute or walks upward.

use crate::error::ToolError;
use crate::schema::{ParamKind, Tool, ToolParameter, ToolSchema};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};

// ─── Calculator ──────────────────────────────────────────────────────────────

/// Sandboxed math expression evaluator.
pub struct CalculatorTool;

/// Rewrite the friendly function names players use into evalexpr's
/// `math::` namespace, and the constants into context variables.
fn prepare_expression(expr: &str) -> String {
    let mut prepared = expr.to_string();
    for (from, to) in [
        ("sqrt(", "math::sqrt("),
        ("sin(", "math::sin("),
        ("cos(", "math::cos("),
        ("tan(", "math::tan("),
        ("ln(", "math::ln("),
        ("exp(", "math::exp("),
        ("abs(", "math::abs("),
    ] {
        // Avoid double-rewriting already-qualified names.
        if !prepared.contains(&format!("math::{}", &from[..from.len() - 1])) {
            prepared = prepared.replace(from, to);
        }
    }
    prepared
}

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculator".into(),
            description: "Evaluates a math expression. Supports +-*/%^, \
                          sqrt, sin, cos, tan, ln, exp, abs, min, max, \
                          floor, round, and the constants pi and e."
                .into(),
            parameters: vec![ToolParameter::required(
                "expression",
                ParamKind::String,
                "the expression to evaluate, e.g. '2 + 3 * 4' or 'sqrt(16)'",
            )],
            returns: "the numeric result".into(),
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        use evalexpr::ContextWithMutableVariables;

        let expression = args.get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArgs("expression must be a string".into()))?;

        let mut context: evalexpr::HashMapContext = evalexpr::HashMapContext::new();
        let _ = context.set_value("pi".into(), evalexpr::Value::Float(std::f64::consts::PI));
        let _ = context.set_value("e".into(), evalexpr::Value::Float(std::f64::consts::E));

        let prepared = prepare_expression(expression);
        match evalexpr::eval_with_context(&prepared, &context) {
            Ok(evalexpr::Value::Int(n)) => Ok(json!(n)),
            Ok(evalexpr::Value::Float(f)) => Ok(json!(f)),
            Ok(evalexpr::Value::Boolean(b)) => Ok(json!(b)),
            Ok(other) => Ok(json!(format!("{other:?}"))),
            Err(err) => Err(ToolError::ExecutionFailed(format!(
                "cannot evaluate '{expression}': {err}"
            ))),
        }
    }
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// Reports the current wall-clock time.
pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "time".into(),
            description: "Returns the current UTC time.".into(),
            parameters: vec![ToolParameter::optional(
                "format",
                ParamKind::String,
                "strftime format string",
                json!("%Y-%m-%d %H:%M:%S"),
            )],
            returns: "the formatted time".into(),
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let format = args.get("format").and_then(Value::as_str).unwrap_or("%Y-%m-%d %H:%M:%S");
        let now = chrono::Utc::now();
        Ok(json!(now.format(format).to_string()))
    }
}

// ─── Random ──────────────────────────────────────────────────────────────────

/// Generates a random number in a range.
pub struct RandomTool;

#[async_trait]
impl Tool for RandomTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "random".into(),
            description: "Generates a random number.".into(),
            parameters: vec![
                ToolParameter::optional("kind", ParamKind::String, "int or float", json!("int"))
                    .with_enum(vec![json!("int"), json!("float")]),
                ToolParameter::optional("min", ParamKind::Number, "lower bound", json!(0)),
                ToolParameter::optional("max", ParamKind::Number, "upper bound", json!(100)),
            ],
            returns: "the generated number".into(),
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let min = args.get("min").and_then(Value::as_f64).unwrap_or(0.0);
        let max = args.get("max").and_then(Value::as_f64).unwrap_or(100.0);
        if min > max {
            return Err(ToolError::InvalidArgs(format!(
                "min {min} is greater than max {max}"
            )));
        }
        let mut rng = rand::thread_rng();
        match args.get("kind").and_then(Value::as_str).unwrap_or("int") {
            "float" => Ok(json!(rng.gen_range(min..=max))),
            _ => Ok(json!(rng.gen_range(min as i64..=max as i64))),
        }
    }
}

// ─── Filesystem ──────────────────────────────────────────────────────────────

/// Root-confined filesystem access.
pub struct FileSystemTool {
    root: PathBuf,
}

impl FileSystemTool {
    /// A tool confined to `root`. Paths that are absolute or contain
    /// `..` are rejected before any IO happens.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(raw);
        if path.is_absolute() {
            return Err(ToolError::InvalidArgs(format!(
                "absolute paths are not allowed: {raw}"
            )));
        }
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    return Err(ToolError::InvalidArgs(format!(
                        "path traversal is not allowed: {raw}"
                    )));
                }
                Component::Prefix(_) | Component::RootDir => {
                    return Err(ToolError::InvalidArgs(format!(
                        "absolute paths are not allowed: {raw}"
                    )));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl Tool for FileSystemTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "filesystem".into(),
            description: "Reads, writes, and lists files under the \
                          configured data root."
                .into(),
            parameters: vec![
                ToolParameter::required("operation", ParamKind::String, "what to do").with_enum(
                    vec![json!("read"), json!("write"), json!("list"), json!("exists")],
                ),
                ToolParameter::required("path", ParamKind::String, "path relative to the root"),
                ToolParameter::optional(
                    "content",
                    ParamKind::String,
                    "content for write operations",
                    Value::Null,
                ),
            ],
            returns: "operation-dependent result".into(),
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let operation = args.get("operation").and_then(Value::as_str).unwrap_or_default();
        let raw_path = args.get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArgs("path must be a string".into()))?;
        let path = self.resolve(raw_path)?;

        match operation {
            "read" => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("read {raw_path}: {e}")))?;
                Ok(json!(content))
            }
            "write" => {
                let content = args
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::InvalidArgs("write requires content".into()))?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        ToolError::ExecutionFailed(format!("mkdir for {raw_path}: {e}"))
                    })?;
                }
                tokio::fs::write(&path, content)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("write {raw_path}: {e}")))?;
                Ok(json!({ "written": raw_path }))
            }
            "list" => {
                let mut entries = tokio::fs::read_dir(&path)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("list {raw_path}: {e}")))?;
                let mut names = Vec::new();
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
                {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
                names.sort();
                Ok(json!(names))
            }
            "exists" => Ok(json!(path.exists())),
            other => Err(ToolError::InvalidArgs(format!("unknown operation {other}"))),
        }
    }
}

// ─── Search / weather stubs ──────────────────────────────────────────────────

/// In-memory search stub used until a real search backend is wired in.
pub struct SearchTool {
    corpus: Vec<(&'static str, &'static str)>,
}

impl SearchTool {
    /// A stub with a tiny fixed corpus.
    pub fn new() -> Self {
        Self {
            corpus: vec![
                ("goblin", "Small, cowardly humanoids that attack in groups."),
                ("fireball", "A third-level evocation spell dealing fire damage."),
                ("tavern", "Where every adventure seems to begin."),
                ("lich", "An undead spellcaster sustained by a phylactery."),
            ],
        }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search".into(),
            description: "Searches reference material for a term.".into(),
            parameters: vec![
                ToolParameter::required("query", ParamKind::String, "the search term"),
                ToolParameter::optional("max_results", ParamKind::Integer, "result cap", json!(5)),
            ],
            returns: "a list of {title, content} entries".into(),
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = args.get("query").and_then(Value::as_str).unwrap_or_default().to_lowercase();
        let cap = args.get("max_results").and_then(Value::as_u64).unwrap_or(5) as usize;
        let results: Vec<Value> = self
            .corpus
            .iter()
            .filter(|(title, _)| title.contains(&query) || query.contains(title))
            .take(cap)
            .map(|(title, content)| json!({ "title": title, "content": content }))
            .collect();
        Ok(json!(results))
    }
}

/// Weather stub producing stable fictional readings.
pub struct WeatherTool {
    conditions: Vec<&'static str>,
}

impl WeatherTool {
    /// A stub tool.
    pub fn new() -> Self {
        Self {
            conditions: vec!["clear", "overcast", "drizzle", "storm", "fog"],
        }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "weather".into(),
            description: "Reports the weather at a location.".into(),
            parameters: vec![ToolParameter::required(
                "location",
                ParamKind::String,
                "the location to report on",
            )],
            returns: "a weather description".into(),
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let location = args.get("location").and_then(Value::as_str).unwrap_or("somewhere");
        // Stable per location so repeated queries agree within a session.
        let index = location.bytes().map(usize::from).sum::<usize>() % self.conditions.len();
        Ok(json!(format!("{location}: {}", self.conditions[index])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn calculator_evaluates_arithmetic() {
        let result = CalculatorTool
            .execute(&args(&[("expression", json!("2 + 3 * 4"))]))
            .await
            .unwrap();
        assert_eq!(result, json!(14));
    }

    #[tokio::test]
    async fn calculator_supports_math_functions_and_constants() {
        let result = CalculatorTool
            .execute(&args(&[("expression", json!("sqrt(16)"))]))
            .await
            .unwrap();
        assert_eq!(result.as_f64().unwrap(), 4.0);

        let result = CalculatorTool
            .execute(&args(&[("expression", json!("sin(0) + pi - pi"))]))
            .await
            .unwrap();
        assert_eq!(result.as_f64().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn calculator_rejects_non_math_input() {
        let err = CalculatorTool
            .execute(&args(&[("expression", json!("system('rm -rf /')"))]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn random_respects_bounds() {
        for _ in 0..50 {
            let value = RandomTool
                .execute(&args(&[
                    ("kind", json!("int")),
                    ("min", json!(1)),
                    ("max", json!(6)),
                ]))
                .await
                .unwrap();
            let n = value.as_i64().unwrap();
            assert!((1..=6).contains(&n));
        }
    }

    #[tokio::test]
    async fn random_rejects_inverted_bounds() {
        let err = RandomTool
            .execute(&args(&[("min", json!(10)), ("max", json!(1)), ("kind", json!("int"))]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn filesystem_round_trips_within_root() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSystemTool::new(dir.path().to_path_buf());

        tool.execute(&args(&[
            ("operation", json!("write")),
            ("path", json!("notes/session1.txt")),
            ("content", json!("the party met elara")),
        ]))
        .await
        .unwrap();

        let content = tool
            .execute(&args(&[
                ("operation", json!("read")),
                ("path", json!("notes/session1.txt")),
            ]))
            .await
            .unwrap();
        assert_eq!(content, json!("the party met elara"));

        let listing = tool
            .execute(&args(&[("operation", json!("list")), ("path", json!("notes"))]))
            .await
            .unwrap();
        assert_eq!(listing, json!(["session1.txt"]));
    }

    #[tokio::test]
    async fn filesystem_rejects_traversal_and_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSystemTool::new(dir.path().to_path_buf());

        for bad in ["../secrets.txt", "a/../../b", "/etc/passwd"] {
            let err = tool
                .execute(&args(&[("operation", json!("read")), ("path", json!(bad))]))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgs(_)), "path: {bad}");
        }
    }

    #[tokio::test]
    async fn search_stub_matches_substrings() {
        let results = SearchTool::new()
            .execute(&args(&[("query", json!("goblin")), ("max_results", json!(5))]))
            .await
            .unwrap();
        assert_eq!(results.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn weather_stub_is_stable_per_location() {
        let tool = WeatherTool::new();
        let a = tool
            .execute(&args(&[("location", json!("Neverwinter"))]))
            .await
            .unwrap();
        let b = tool
            .execute(&args(&[("location", json!("Neverwinter"))]))
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
