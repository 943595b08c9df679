//! `CapabilityInfo` — the descriptor every plugin publishes about itself.
//!
//! This replaces the YAML-importable capability-bundle model the registry
//! used to resolve; a capability here is a live plugin instance, not a
//! file on disk, and its descriptor exists for introspection (the
//! built-in `capabilities` handler, MCP tool exposure, the router) rather
//! than for driving an external adapter binding.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A trait a capability supports. A plugin may declare several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTrait {
    Text,
    Multimodal,
    AiFunction,
    Streaming,
    Stateful,
}

/// Supported input/output content modes for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    Text,
    Data,
    Mixed,
}

/// Descriptor a plugin publishes when it registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: HashSet<CapabilityTrait>,
    pub input_mode: ContentMode,
    pub output_mode: ContentMode,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    /// 0 (lowest) to 100 (highest); used to order capability matches when
    /// more than one plugin claims it can handle a task.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub config_schema: Option<Value>,
    pub plugin_name: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_priority() -> u8 {
    50
}

impl CapabilityInfo {
    pub fn supports(&self, trait_: CapabilityTrait) -> bool {
        self.capabilities.contains(&trait_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> CapabilityInfo {
        CapabilityInfo {
            id: "echo".into(),
            name: "Echo".into(),
            version: "1.0.0".into(),
            capabilities: HashSet::from([CapabilityTrait::Text]),
            input_mode: ContentMode::Text,
            output_mode: ContentMode::Text,
            required_scopes: vec![],
            priority: default_priority(),
            config_schema: None,
            plugin_name: "echo".into(),
            system_prompt: None,
        }
    }

    #[test]
    fn default_priority_is_midpoint() {
        assert_eq!(info().priority, 50);
    }

    #[test]
    fn supports_checks_declared_trait_set() {
        let info = info();
        assert!(info.supports(CapabilityTrait::Text));
        assert!(!info.supports(CapabilityTrait::Streaming));
    }
}
