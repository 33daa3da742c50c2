use std::collections::BTreeMap;

use piata_config::{PiataConfig, default_servers};
use piata_core::{PiataError, Result, ToolDescriptor, ToolServer};
use tracing::info;

/// Read-only catalogue of tool-servers, keyed by kind.
///
/// Built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct ToolServerRegistry {
    servers: BTreeMap<String, ToolServer>,
}

impl ToolServerRegistry {
    /// Build a registry from a server list. Duplicate kinds are rejected.
    pub fn new(servers: Vec<ToolServer>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for server in servers {
            let kind = server.kind.as_str().to_string();
            if map.contains_key(&kind) {
                return Err(PiataError::Config(format!(
                    "duplicate tool-server kind '{kind}'"
                )));
            }
            map.insert(kind, server);
        }
        info!(servers = map.len(), "tool-server registry built");
        Ok(Self { servers: map })
    }

    /// The built-in marketplace catalogue (advertising, database, stock).
    pub fn defaults() -> Self {
        let servers = default_servers()
            .into_iter()
            .map(|s| (s.kind.as_str().to_string(), s))
            .collect();
        Self { servers }
    }

    pub fn from_config(config: &PiataConfig) -> Result<Self> {
        Self::new(config.servers.clone())
    }

    /// All servers, ordered by kind.
    pub fn list_servers(&self) -> impl Iterator<Item = &ToolServer> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.servers.contains_key(kind)
    }

    pub fn get(&self, kind: &str) -> Result<&ToolServer> {
        self.servers
            .get(kind)
            .ok_or_else(|| PiataError::UnknownTool(format!("no tool-server of kind '{kind}'")))
    }

    pub fn has_tool(&self, kind: &str, tool_name: &str) -> bool {
        self.servers
            .get(kind)
            .is_some_and(|s| s.has_tool(tool_name))
    }

    pub fn tool(&self, kind: &str, tool_name: &str) -> Result<ToolDescriptor> {
        let server = self.get(kind)?;
        if !server.has_tool(tool_name) {
            return Err(PiataError::UnknownTool(format!("{kind}.{tool_name}")));
        }
        Ok(ToolDescriptor {
            server: server.kind.clone(),
            tool_name: tool_name.to_string(),
        })
    }
}
