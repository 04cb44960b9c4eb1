//! Cherry Servers resource kinds

mod floating_ip;
mod project;
mod server;
mod ssh_key;
mod storage;

pub use floating_ip::FloatingIp;
pub use project::Project;
pub use server::Server;
pub use ssh_key::SshKey;
pub use storage::Storage;

use crate::error::CherryError;
use cherryflow_cloud::ResourceKind;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Resource types managed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    SshKey,
    Project,
    Server,
    FloatingIp,
    Storage,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::SshKey,
        ResourceType::Project,
        ResourceType::Server,
        ResourceType::FloatingIp,
        ResourceType::Storage,
    ];

    pub(crate) const NAMES: [&'static str; 5] =
        ["ssh-key", "project", "server", "floating-ip", "storage"];

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::SshKey => "ssh-key",
            ResourceType::Project => "project",
            ResourceType::Server => "server",
            ResourceType::FloatingIp => "floating-ip",
            ResourceType::Storage => "storage",
        }
    }

    pub fn kind(self) -> Arc<dyn ResourceKind> {
        match self {
            ResourceType::SshKey => Arc::new(SshKey),
            ResourceType::Project => Arc::new(Project),
            ResourceType::Server => Arc::new(Server),
            ResourceType::FloatingIp => Arc::new(FloatingIp),
            ResourceType::Storage => Arc::new(Storage),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = CherryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|resource_type| resource_type.name() == s)
            .ok_or_else(|| CherryError::UnknownResourceType(s.to_string()))
    }
}

/// JSON object literal as a payload map
pub(crate) fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
