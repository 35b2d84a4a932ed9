//! Resources an action can be bound to.
//!
//! A resource is an opaque handle (a tool, a database, a knowledge base).
//! Actions store it and pass it along; only its category and a display value
//! are ever looked at, when a result is stamped for audit or rendering.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Resource category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Database,
    Knowledge,
    Internet,
    Tool,
    Plugin,
    File,
    App,
    Custom(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Database => "database",
            ResourceType::Knowledge => "knowledge",
            ResourceType::Internet => "internet",
            ResourceType::Tool => "tool",
            ResourceType::Plugin => "plugin",
            ResourceType::File => "file",
            ResourceType::App => "app",
            ResourceType::Custom(name) => name,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Resource: Send + Sync + fmt::Debug {
    fn resource_type(&self) -> ResourceType;

    fn name(&self) -> &str;

    /// Value recorded on results that consumed this resource.
    fn value(&self) -> serde_json::Value {
        serde_json::Value::String(self.name().to_string())
    }
}

pub type ResourceRef = Arc<dyn Resource>;

/// A resource that is nothing more than a named handle.
#[derive(Debug, Clone)]
pub struct NamedResource {
    resource_type: ResourceType,
    name: String,
}

impl NamedResource {
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
        }
    }
}

impl Resource for NamedResource {
    fn resource_type(&self) -> ResourceType {
        self.resource_type.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
