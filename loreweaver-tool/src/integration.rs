//! Batch and chained tool invocation on top of [`ToolManager`].

use crate::manager::{ToolManager, ToolResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Key under which a chain step receives the previous step's output.
pub const PREVIOUS_RESULT_KEY: &str = "previous_result";

/// One call in a batch or chain.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Tool name.
    pub name: String,
    /// JSON arguments.
    pub args: Map<String, Value>,
}

impl ToolCall {
    /// Build a call spec.
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Execute calls concurrently, capped by `concurrency`. Results come
/// back in call order; a failed call is an `ok = false` result, never
/// a batch-wide failure.
pub async fn batch_call(
    manager: Arc<ToolManager>,
    calls: Vec<ToolCall>,
    concurrency: usize,
) -> Vec<ToolResult> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let handles: Vec<_> = calls
        .into_iter()
        .map(|call| {
            let manager = Arc::clone(&manager);
            let semaphore = Arc::clone(&semaphore);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                manager.call(&call.name, call.args).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => results.push(ToolResult {
                name: "<join>".into(),
                value: None,
                ok: false,
                error: Some(join_err.to_string()),
                elapsed: std::time::Duration::ZERO,
            }),
        }
    }
    results
}

/// Execute calls sequentially, injecting step N−1's output into step
/// N's arguments under [`PREVIOUS_RESULT_KEY`]. The chain stops at the
/// first failure and returns the results so far.
pub async fn chain_tools(manager: Arc<ToolManager>, calls: Vec<ToolCall>) -> Vec<ToolResult> {
    let mut results: Vec<ToolResult> = Vec::with_capacity(calls.len());
    let mut previous: Option<Value> = None;

    for mut call in calls {
        if let Some(prev) = previous.take() {
            call.args.insert(PREVIOUS_RESULT_KEY.to_string(), prev);
        }
        let result = manager.call(&call.name, call.args).await;
        let ok = result.ok;
        previous = result.value.clone();
        results.push(result);
        if !ok {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::schema::{ParamKind, Tool, ToolParameter, ToolSchema};
    use async_trait::async_trait;
    use serde_json::json;

    /// Adds `amount` to `previous_result` (or to `start`).
    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "add".into(),
                description: "adds a number".into(),
                parameters: vec![
                    ToolParameter::required("amount", ParamKind::Number, "amount to add"),
                    ToolParameter::optional("start", ParamKind::Number, "starting value", json!(0)),
                ],
                returns: "the running total".into(),
            }
        }

        async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
            let amount = args["amount"].as_f64().unwrap_or(0.0);
            let base = args
                .get(PREVIOUS_RESULT_KEY)
                .or_else(|| args.get("start"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            Ok(json!(base + amount))
        }
    }

    fn manager() -> Arc<ToolManager> {
        let manager = ToolManager::new();
        manager.register(Arc::new(AddTool), "math");
        Arc::new(manager)
    }

    fn call(amount: f64) -> ToolCall {
        let mut args = Map::new();
        args.insert("amount".into(), json!(amount));
        ToolCall::new("add", args)
    }

    #[tokio::test]
    async fn batch_preserves_call_order() {
        let results = batch_call(manager(), vec![call(1.0), call(2.0), call(3.0)], 2).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].value, Some(json!(1.0)));
        assert_eq!(results[1].value, Some(json!(2.0)));
        assert_eq!(results[2].value, Some(json!(3.0)));
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let mut bad = ToolCall::new("add", Map::new()); // missing `amount`
        bad.args.clear();
        let results = batch_call(manager(), vec![call(1.0), bad, call(3.0)], 4).await;
        assert!(results[0].ok);
        assert!(!results[1].ok);
        assert!(results[2].ok);
    }

    #[tokio::test]
    async fn chain_threads_previous_result() {
        let results = chain_tools(manager(), vec![call(1.0), call(10.0), call(100.0)]).await;
        assert_eq!(results[2].value, Some(json!(111.0)));
    }

    #[tokio::test]
    async fn chain_stops_at_first_failure() {
        let bad = ToolCall::new("add", Map::new());
        let results = chain_tools(manager(), vec![call(1.0), bad, call(100.0)]).await;
        assert_eq!(results.len(), 2);
        assert!(!results[1].ok);
    }
}
