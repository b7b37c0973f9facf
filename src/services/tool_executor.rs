//! Tool Registry & Executor (C5, spec overview row): catalogs tools, runs
//! them behind a pre-execution policy gate, then delegates to a sandbox.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::ports::{SandboxRunner, ToolExecutor as ToolExecutorPort, ToolOutcome, ToolRegistry};

/// A pre-execution policy gate: given the resolved tool name and call
/// arguments, decides whether the call may proceed. Boxed so callers can
/// wire in allow-lists, rate limits, or argument validation without this
/// service knowing the policy's shape.
pub type PolicyGate = Box<dyn Fn(&str, &serde_json::Value) -> bool + Send + Sync>;

/// Allows every call; the default gate when no policy is configured.
pub fn allow_all_gate() -> PolicyGate {
    Box::new(|_, _| true)
}

/// Looks tools up in a `ToolRegistry`, runs the policy gate, and on pass
/// delegates to a `SandboxRunner`. Rejects unregistered tools and
/// gate failures with `CoreError::InvariantViolation` per the port contract.
pub struct GatedToolExecutor {
    registry: Arc<dyn ToolRegistry>,
    sandbox: Arc<dyn SandboxRunner>,
    gate: PolicyGate,
}

impl GatedToolExecutor {
    pub fn new(registry: Arc<dyn ToolRegistry>, sandbox: Arc<dyn SandboxRunner>) -> Self {
        Self { registry, sandbox, gate: allow_all_gate() }
    }

    pub fn with_gate(registry: Arc<dyn ToolRegistry>, sandbox: Arc<dyn SandboxRunner>, gate: PolicyGate) -> Self {
        Self { registry, sandbox, gate }
    }
}

#[async_trait]
impl ToolExecutorPort for GatedToolExecutor {
    #[instrument(skip(self, args), fields(tool_name))]
    async fn execute(&self, tool_name: &str, args: serde_json::Value) -> CoreResult<ToolOutcome> {
        let spec = self.registry.get(tool_name).await?.ok_or_else(|| {
            CoreError::InvariantViolation(format!("tool '{tool_name}' is not registered"))
        })?;

        if !(self.gate)(tool_name, &args) {
            warn!(tool_name, "tool call rejected by policy gate");
            return Err(CoreError::InvariantViolation(format!(
                "tool '{tool_name}' call rejected by policy gate"
            )));
        }

        self.sandbox.run(&spec, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ToolSpec;
    use crate::infrastructure::tools::{InMemoryToolRegistry, MockSandboxRunner};
    use std::time::Duration;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "a tool".to_string(),
            parameters_schema: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn unregistered_tool_is_rejected() {
        let registry = Arc::new(InMemoryToolRegistry::new());
        let sandbox = Arc::new(MockSandboxRunner::new(Duration::from_millis(1)));
        let executor = GatedToolExecutor::new(registry, sandbox);

        let err = executor.execute("missing", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn registered_tool_runs_through_sandbox() {
        let registry = Arc::new(InMemoryToolRegistry::new());
        registry.register(spec("search"));
        let sandbox = Arc::new(MockSandboxRunner::new(Duration::from_millis(1)));
        let executor = GatedToolExecutor::new(registry, sandbox.clone());

        let outcome = executor.execute("search", serde_json::json!({"q": "x"})).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(sandbox.call_count(), 1);
    }

    #[tokio::test]
    async fn gate_rejection_skips_sandbox() {
        let registry = Arc::new(InMemoryToolRegistry::new());
        registry.register(spec("search"));
        let sandbox = Arc::new(MockSandboxRunner::new(Duration::from_millis(1)));
        let executor = GatedToolExecutor::with_gate(
            registry,
            sandbox.clone(),
            Box::new(|name, _| name != "search"),
        );

        let err = executor.execute("search", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
        assert_eq!(sandbox.call_count(), 0);
    }
}
