//! The Tool Dispatcher: a name-keyed registry of JSON-schema-described
//! handlers (ground: `autofram.tools.mcp` / `get_tools_for_openai` /
//! `execute_tool`, generalized from FastMCP's tool manager to a plain map).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use af_domain::wire::ToolDefinition;
use serde_json::Value;

pub use crate::builtins::ToolContext;

type ToolFuture = Pin<Box<dyn Future<Output = af_domain::Result<String>> + Send>>;
type Handler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

struct Registered {
    definition: ToolDefinition,
    handler: Handler,
}

/// Registry of callable tools, keyed by name. Built once at startup and
/// shared (read-only) across the work cycle / sub-loop.
#[derive(Default)]
pub struct ToolDispatcher {
    tools: HashMap<String, Registered>,
    order: Vec<String>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = af_domain::Result<String>> + Send + 'static,
    {
        let name = name.into();
        let definition = ToolDefinition::new(name.clone(), description, parameters);
        self.order.push(name.clone());
        self.tools.insert(
            name,
            Registered {
                definition,
                handler: Arc::new(move |args| Box::pin(handler(args))),
            },
        );
    }

    /// Tool schemas in model-facing order (ground: `get_tools_for_openai`).
    pub fn list_schemas(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|r| r.definition.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool by name. Handler errors are converted to
    /// `"Error: <message>"` strings here and never propagate past this
    /// call (spec §4.2/§7): the caller always gets a `String` to hand back
    /// to the model as a `tool` message.
    pub async fn execute(&self, name: &str, arguments_json: &str) -> String {
        let Some(registered) = self.tools.get(name) else {
            return format!("Error: unknown tool: {name}");
        };

        let args: Value = match serde_json::from_str(arguments_json) {
            Ok(v) => v,
            Err(e) => return format!("Error: invalid arguments JSON: {e}"),
        };

        match (registered.handler)(args).await {
            Ok(output) => output,
            Err(e) => format!("Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(props: &[&str]) -> Value {
        let properties: serde_json::Map<String, Value> = props
            .iter()
            .map(|p| (p.to_string(), serde_json::json!({"type": "string"})))
            .collect();
        serde_json::json!({"type": "object", "properties": properties, "required": props})
    }

    #[tokio::test]
    async fn unknown_tool_reports_error_string() {
        let dispatcher = ToolDispatcher::new();
        let result = dispatcher.execute("nope", "{}").await;
        assert_eq!(result, "Error: unknown tool: nope");
    }

    #[tokio::test]
    async fn registered_handler_runs_and_returns_output() {
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.register("echo", "echo back", schema(&["text"]), |args| async move {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        });
        let result = dispatcher
            .execute("echo", r#"{"text": "hi"}"#)
            .await;
        assert_eq!(result, "hi");
    }

    #[tokio::test]
    async fn handler_error_is_prefixed() {
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.register("boom", "always fails", schema(&[]), |_args| async move {
            Err(af_domain::Error::Other("kaboom".to_string()))
        });
        let result = dispatcher.execute("boom", "{}").await;
        assert_eq!(result, "Error: kaboom");
    }

    #[tokio::test]
    async fn invalid_json_reports_error() {
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.register("echo", "echo back", schema(&["text"]), |args| async move {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        });
        let result = dispatcher.execute("echo", "not json").await;
        assert!(result.starts_with("Error: invalid arguments JSON"));
    }

    #[test]
    fn list_schemas_preserves_registration_order() {
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.register("a", "first", schema(&[]), |_| async { Ok(String::new()) });
        dispatcher.register("b", "second", schema(&[]), |_| async { Ok(String::new()) });
        let names: Vec<_> = dispatcher
            .list_schemas()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
