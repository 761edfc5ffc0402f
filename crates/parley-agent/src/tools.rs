//! Tools the agent may call, and the registry holding them.

use std::sync::Arc;

use async_trait::async_trait;

/// A named capability the agent can invoke with a free-text query.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// Run the tool. Tools report failures in the returned text.
    async fn invoke(&self, query: &str) -> String;
}

/// Web search placeholder. Acknowledges the query without searching.
#[derive(Debug, Clone, Default)]
pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "Search"
    }

    fn description(&self) -> &str {
        "Use this tool for searching the web."
    }

    async fn invoke(&self, query: &str) -> String {
        format!("Search results for: {}", query)
    }
}

/// Tools available to the agent, in registration order.
///
/// Built once at startup and read-only afterwards: the agent only ever
/// receives a shared reference.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock tool set: web search.
    pub fn with_defaults() -> Self {
        Self::new().with_tool(SearchTool)
    }

    /// Add a tool, replacing any tool registered under the same name.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!(tool = %tool.name(), "Replacing tool with duplicate name");
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
        self
    }

    /// Look a tool up by exact name, ignoring surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        let name = name.trim();
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// `> name: description` lines for the prompt.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("> {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
