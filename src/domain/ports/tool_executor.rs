//! Tool Registry & Executor port (C5, spec §4 overview row, §1 "out of
//! scope" collaborators: knowledge graph/vector stores via a tool-call
//! abstraction, sandboxed code execution via a blocking `Execute`
//! contract).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreResult;

/// Declarative tool descriptor as catalogued by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// Outcome of one tool invocation: `(stdout, exit, artifacts)` per the
/// spec's sandboxed-execution contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub stdout: String,
    pub exit_code: i32,
    pub artifacts: Vec<String>,
}

#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn list(&self) -> CoreResult<Vec<ToolSpec>>;
    async fn get(&self, name: &str) -> CoreResult<Option<ToolSpec>>;
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// A pre-execution policy gate runs before dispatch; implementations
    /// MUST reject calls to tools not present in the registry or that
    /// fail the gate, surfacing `CoreError::InvariantViolation`.
    async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> CoreResult<ToolOutcome>;
}

/// Sandboxed code/tool execution (spec §1 "out of scope": a blocking
/// `Execute(code, lang, ctx) -> (stdout, exit, artifacts)` contract).
/// Treated as an external collaborator, analogous to `LlmProvider`; a
/// `ToolExecutor` implementation drives this after its policy gate passes.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, tool: &ToolSpec, args: serde_json::Value) -> CoreResult<ToolOutcome>;
}
