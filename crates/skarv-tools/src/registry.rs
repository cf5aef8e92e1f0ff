// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use skarv_model::FunctionDeclaration;

use crate::tool::Tool;

struct Entry {
    tool: Arc<dyn Tool>,
    /// True for tools found via external discovery (MCP); re-discovery
    /// replaces these while leaving manually-registered tools untouched.
    discovered: bool,
}

/// Central name → tool mapping.  Read-only during a turn.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manually-built tool.  Last writer wins.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.insert(tool, false);
    }

    /// Register a tool found via external discovery.
    pub fn register_discovered(&mut self, tool: Arc<dyn Tool>) {
        self.insert(tool, true);
    }

    fn insert(&mut self, tool: Arc<dyn Tool>, discovered: bool) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            warn!(tool = %name, "overwriting previously registered tool");
        }
        self.tools.insert(name, Entry { tool, discovered });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| Arc::clone(&e.tool))
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Function declarations for the model request tool list, sorted by name.
    pub fn function_declarations(&self) -> Vec<FunctionDeclaration> {
        let mut decls: Vec<FunctionDeclaration> = self
            .tools
            .values()
            .map(|e| FunctionDeclaration {
                name: e.tool.name().to_string(),
                description: e.tool.description().to_string(),
                parameters: e.tool.parameter_schema(),
            })
            .collect();
        decls.sort_by(|a, b| a.name.cmp(&b.name));
        decls
    }

    /// Tools originating from the given MCP server, sorted by name.
    pub fn tools_by_server(&self, server_name: &str) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self
            .tools
            .values()
            .filter(|e| e.tool.server_name() == Some(server_name))
            .map(|e| Arc::clone(&e.tool))
            .collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Atomically replace the externally-discovered tool set.
    ///
    /// Manually-registered tools always survive; a discovered tool whose name
    /// collides with a manual registration is dropped with a warning.
    pub fn replace_discovered(&mut self, tools: Vec<Arc<dyn Tool>>) {
        self.tools.retain(|_, e| !e.discovered);
        for tool in tools {
            let name = tool.name().to_string();
            if self.tools.contains_key(&name) {
                warn!(
                    tool = %name,
                    "discovered tool shadows a manually-registered one; keeping the manual tool"
                );
                continue;
            }
            self.tools.insert(
                name,
                Entry {
                    tool,
                    discovered: true,
                },
            );
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::tool::{ExecutionContext, ToolResult};

    struct EchoTool {
        name: &'static str,
        server: Option<&'static str>,
    }

    impl EchoTool {
        fn named(name: &'static str) -> Self {
            Self { name, server: None }
        }

        fn from_server(name: &'static str, server: &'static str) -> Self {
            Self {
                name,
                server: Some(server),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn display_name(&self) -> &str {
            "Echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameter_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn server_name(&self) -> Option<&str> {
            self.server
        }
        fn validate_params(&self, _args: &Value) -> Option<String> {
            None
        }
        fn describe(&self, _args: &Value) -> String {
            "echo".into()
        }
        async fn execute(&self, args: &Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
            Ok(ToolResult::text(format!("echo:{args}")))
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("echo"));
        assert!(reg.get("echo").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn registering_same_name_twice_overwrites() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("t"));
        reg.register(EchoTool::named("t"));
        assert_eq!(reg.names().len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("zeta"));
        reg.register(EchoTool::named("alpha"));
        assert_eq!(reg.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn function_declarations_expose_schema() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("echo"));
        let decls = reg.function_declarations();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "echo");
        assert_eq!(decls[0].parameters["type"], "object");
    }

    #[test]
    fn tools_by_server_filters_on_origin() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("local"));
        reg.register_discovered(Arc::new(EchoTool::from_server("remote_a", "files")));
        reg.register_discovered(Arc::new(EchoTool::from_server("remote_b", "files")));
        reg.register_discovered(Arc::new(EchoTool::from_server("other", "web")));
        let files = reg.tools_by_server("files");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name(), "remote_a");
        assert_eq!(files[1].name(), "remote_b");
    }

    #[test]
    fn replace_discovered_swaps_only_discovered_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("manual"));
        reg.register_discovered(Arc::new(EchoTool::from_server("old", "files")));

        reg.replace_discovered(vec![Arc::new(EchoTool::from_server("new", "files"))]);

        assert!(reg.get("manual").is_some(), "manual tool must survive");
        assert!(reg.get("old").is_none(), "stale discovered tool must be gone");
        assert!(reg.get("new").is_some());
    }

    #[test]
    fn replace_discovered_never_shadows_manual_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::named("shared"));
        reg.replace_discovered(vec![Arc::new(EchoTool::from_server("shared", "files"))]);
        let kept = reg.get("shared").unwrap();
        assert!(kept.server_name().is_none(), "manual registration must win");
    }
}
