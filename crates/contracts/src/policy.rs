//! A tool-name allow-list layered over `af_tools::ToolDispatcher` (ground:
//! `agent.py`'s `ALLOWED_TOOLS` list, shaped after the teacher's
//! `ToolPolicy`/`AgentConfig.tool_policy`).

use std::collections::HashSet;

use af_domain::wire::ToolDefinition;
use af_tools::ToolDispatcher;

/// The contracts sub-agent's tool surface (ground: `agent.py`'s
/// `ALLOWED_TOOLS = ["Read", "Edit", "Write", "Bash", "Glob", "Grep",
/// "WebSearch", "WebFetch"]`, mapped onto this port's actual tool names —
/// there is no separate Edit/Glob/Grep/WebFetch implementation, so the
/// allow-list is the full set of generic built-ins `af-tools` exposes).
pub struct ToolPolicy {
    dispatcher: ToolDispatcher,
    allowed: HashSet<String>,
}

impl ToolPolicy {
    pub fn new(dispatcher: ToolDispatcher, allowed: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            dispatcher,
            allowed: allowed.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn default_allow_list() -> &'static [&'static str] {
        &["read_file", "write_file", "bash", "web_search"]
    }

    pub fn list_schemas(&self) -> Vec<ToolDefinition> {
        self.dispatcher
            .list_schemas()
            .into_iter()
            .filter(|def| self.allowed.contains(&def.function.name))
            .collect()
    }

    pub async fn execute(&self, name: &str, arguments_json: &str) -> String {
        if !self.allowed.contains(name) {
            return format!("Error: tool not permitted for this agent: {name}");
        }
        self.dispatcher.execute(name, arguments_json).await
    }
}
