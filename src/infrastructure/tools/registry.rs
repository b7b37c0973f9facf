use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::errors::CoreResult;
use crate::domain::ports::{ToolRegistry, ToolSpec};

/// In-process tool catalog standing in for the external knowledge-graph
/// and vector-store tool collaborators (spec §1).
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: Mutex<HashMap<String, ToolSpec>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, spec: ToolSpec) {
        self.tools.lock().expect("tool registry mutex poisoned").insert(spec.name.clone(), spec);
    }
}

#[async_trait]
impl ToolRegistry for InMemoryToolRegistry {
    async fn list(&self) -> CoreResult<Vec<ToolSpec>> {
        Ok(self.tools.lock().expect("tool registry mutex poisoned").values().cloned().collect())
    }

    async fn get(&self, name: &str) -> CoreResult<Option<ToolSpec>> {
        Ok(self.tools.lock().expect("tool registry mutex poisoned").get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "a tool".to_string(),
            parameters_schema: serde_json::json!({ "type": "object" }),
        }
    }

    #[tokio::test]
    async fn registered_tool_is_listed_and_gettable() {
        let registry = InMemoryToolRegistry::new();
        registry.register(spec("search"));

        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert!(registry.get("search").await.unwrap().is_some());
        assert!(registry.get("missing").await.unwrap().is_none());
    }
}
