//! Authentication and scope-based authorization for inbound requests.
//!
//! Three provider kinds (JWT, static bearer token, API key) are tried in
//! the order they're declared in `security.auth`; the first provider that
//! recognizes the presented credential produces an `AuthContext`. Scope
//! checks expand a subject's declared scopes against the configured
//! `scope_hierarchy` before comparing against what a capability requires.

mod scope;

pub use scope::ScopeHierarchy;

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::config::{AuthProviderConfig, BearerCredential, SecuritySection};
use crate::error::AgentError;

/// How a request was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Jwt,
    Bearer,
    ApiKey,
}

/// The identity and granted scopes of an authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub subject: String,
    pub auth_type: AuthType,
    pub scopes: Vec<String>,
}

impl AuthContext {
    /// Whether this context carries `scope` after hierarchy expansion.
    /// `has_scope` is the single call site a capability or MCP tool
    /// wrapper should use before executing privileged work.
    pub fn has_scope(&self, scope: &str, hierarchy: &ScopeHierarchy) -> bool {
        let expanded = hierarchy.expand(&self.scopes);
        expanded.iter().any(|s| s == "*" || s == scope)
    }

    /// Every scope in `required` must be satisfied; returns the missing
    /// subset (empty means authorized).
    pub fn missing_scopes(&self, required: &[String], hierarchy: &ScopeHierarchy) -> Vec<String> {
        let expanded = hierarchy.expand(&self.scopes);
        if expanded.iter().any(|s| s == "*") {
            return Vec::new();
        }
        required
            .iter()
            .filter(|needed| !expanded.contains(*needed))
            .cloned()
            .collect()
    }
}

/// A single authentication scheme. Implementations inspect the presented
/// credential and either recognize it (`Ok(Some(_))`), decline it
/// (`Ok(None)`, so the next provider gets a turn), or reject it outright
/// (`Err`, which stops the chain — used only for a credential this
/// provider positively recognizes as invalid, e.g. a JWT with a bad
/// signature, not for "wrong scheme").
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    fn auth_type(&self) -> AuthType;
    async fn authenticate(&self, credential: &Credential) -> Result<Option<AuthContext>, AgentError>;
}

/// The credential extracted from a request, independent of transport.
#[derive(Debug, Clone)]
pub enum Credential {
    Bearer(String),
    ApiKey { header: String, value: String },
}

pub struct JwtProvider {
    secret: String,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtProvider {
    pub fn new(secret: String, algorithm: &str, issuer: Option<String>, audience: Option<String>) -> Result<Self, AgentError> {
        let algorithm = parse_algorithm(algorithm)?;
        Ok(Self {
            secret,
            algorithm,
            issuer,
            audience,
        })
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, AgentError> {
    match name {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        other => Err(AgentError::Config(format!("unsupported JWT algorithm: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[async_trait]
impl AuthenticationProvider for JwtProvider {
    fn auth_type(&self) -> AuthType {
        AuthType::Jwt
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Option<AuthContext>, AgentError> {
        let token = match credential {
            Credential::Bearer(token) => token,
            Credential::ApiKey { .. } => return Ok(None),
        };

        let mut validation = Validation::new(self.algorithm);
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss.as_str()]);
        }
        if let Some(aud) = &self.audience {
            validation.set_audience(&[aud.as_str()]);
        } else {
            validation.validate_aud = false;
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let data = decode::<JwtClaims>(token, &decoding_key, &validation)
            .map_err(|e| AgentError::Auth(format!("invalid JWT: {e}")))?;

        let mut scopes = data.claims.scopes;
        if let Some(space_separated) = data.claims.scope {
            scopes.extend(space_separated.split_whitespace().map(str::to_string));
        }

        Ok(Some(AuthContext {
            subject: data.claims.sub,
            auth_type: AuthType::Jwt,
            scopes,
        }))
    }
}

pub struct BearerProvider {
    tokens: HashMap<String, BearerCredential>,
}

impl BearerProvider {
    pub fn new(tokens: HashMap<String, BearerCredential>) -> Self {
        Self { tokens }
    }
}

/// Constant-time lookup: compares the presented token against every
/// configured token rather than short-circuiting on length or an early
/// byte mismatch, so a timing side channel can't narrow down the secret.
fn constant_time_lookup<'a>(
    presented: &str,
    candidates: &'a HashMap<String, BearerCredential>,
) -> Option<&'a BearerCredential> {
    let presented_bytes = presented.as_bytes();
    let mut found = None;
    for (candidate, cred) in candidates {
        let candidate_bytes = candidate.as_bytes();
        let equal = candidate_bytes.len() == presented_bytes.len()
            && bool::from(candidate_bytes.ct_eq(presented_bytes));
        if equal {
            found = Some(cred);
        }
    }
    found
}

#[async_trait]
impl AuthenticationProvider for BearerProvider {
    fn auth_type(&self) -> AuthType {
        AuthType::Bearer
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Option<AuthContext>, AgentError> {
        let token = match credential {
            Credential::Bearer(token) => token,
            Credential::ApiKey { .. } => return Ok(None),
        };
        match constant_time_lookup(token, &self.tokens) {
            Some(cred) => Ok(Some(AuthContext {
                subject: cred.user_id.clone(),
                auth_type: AuthType::Bearer,
                scopes: cred.scopes.clone(),
            })),
            None => Ok(None),
        }
    }
}

pub struct ApiKeyProvider {
    header: String,
    keys: HashMap<String, BearerCredential>,
}

impl ApiKeyProvider {
    pub fn new(header: String, keys: HashMap<String, BearerCredential>) -> Self {
        Self { header, keys }
    }
}

#[async_trait]
impl AuthenticationProvider for ApiKeyProvider {
    fn auth_type(&self) -> AuthType {
        AuthType::ApiKey
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Option<AuthContext>, AgentError> {
        let (header, value) = match credential {
            Credential::ApiKey { header, value } => (header, value),
            Credential::Bearer(_) => return Ok(None),
        };
        if !header.eq_ignore_ascii_case(&self.header) {
            return Ok(None);
        }
        match constant_time_lookup(value, &self.keys) {
            Some(cred) => Ok(Some(AuthContext {
                subject: cred.user_id.clone(),
                auth_type: AuthType::ApiKey,
                scopes: cred.scopes.clone(),
            })),
            None => Ok(None),
        }
    }
}

/// Tries every configured provider in declared order; the first one that
/// recognizes the credential wins. No provider recognizing it is an
/// authentication failure, not a fallthrough to "anonymous".
pub struct AuthManager {
    providers: Vec<Box<dyn AuthenticationProvider>>,
    pub hierarchy: ScopeHierarchy,
    enabled: bool,
}

impl AuthManager {
    pub fn from_config(section: &SecuritySection) -> Result<Self, AgentError> {
        let mut providers: Vec<Box<dyn AuthenticationProvider>> = Vec::new();
        for provider_config in &section.auth {
            match provider_config {
                AuthProviderConfig::Jwt {
                    secret,
                    algorithm,
                    issuer,
                    audience,
                } => {
                    providers.push(Box::new(JwtProvider::new(
                        secret.clone(),
                        algorithm,
                        issuer.clone(),
                        audience.clone(),
                    )?));
                }
                AuthProviderConfig::Bearer { tokens } => {
                    providers.push(Box::new(BearerProvider::new(tokens.clone())));
                }
                AuthProviderConfig::ApiKey { header, keys } => {
                    providers.push(Box::new(ApiKeyProvider::new(header.clone(), keys.clone())));
                }
            }
        }
        Ok(Self {
            providers,
            hierarchy: ScopeHierarchy::new(section.scope_hierarchy.clone()),
            enabled: section.enabled,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn authenticate(&self, credential: &Credential) -> Result<AuthContext, AgentError> {
        for provider in &self.providers {
            if let Some(context) = provider.authenticate(credential).await? {
                return Ok(context);
            }
        }
        Err(AgentError::Auth("no provider recognized the presented credential".into()))
    }

    pub fn require_scopes(&self, context: &AuthContext, required: &[String]) -> Result<(), AgentError> {
        let missing = context.missing_scopes(required, &self.hierarchy);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Authorization {
                subject: context.subject.clone(),
                missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn bearer_section() -> SecuritySection {
        let mut tokens = Map::new();
        tokens.insert(
            "secret-token".to_string(),
            BearerCredential {
                user_id: "alice".into(),
                scopes: vec!["files:read".into()],
            },
        );
        SecuritySection {
            enabled: true,
            auth: vec![AuthProviderConfig::Bearer { tokens }],
            scope_hierarchy: Map::new(),
        }
    }

    #[tokio::test]
    async fn bearer_provider_matches_known_token() {
        let manager = AuthManager::from_config(&bearer_section()).unwrap();
        let ctx = manager
            .authenticate(&Credential::Bearer("secret-token".into()))
            .await
            .unwrap();
        assert_eq!(ctx.subject, "alice");
    }

    #[tokio::test]
    async fn bearer_provider_rejects_unknown_token() {
        let manager = AuthManager::from_config(&bearer_section()).unwrap();
        let result = manager.authenticate(&Credential::Bearer("wrong".into())).await;
        assert!(result.is_err());
    }

    #[test]
    fn missing_scopes_reports_unsatisfied_subset() {
        let hierarchy = ScopeHierarchy::new(Map::new());
        let ctx = AuthContext {
            subject: "bob".into(),
            auth_type: AuthType::Bearer,
            scopes: vec!["files:read".into()],
        };
        let missing = ctx.missing_scopes(&["files:read".into(), "files:write".into()], &hierarchy);
        assert_eq!(missing, vec!["files:write".to_string()]);
    }

    #[test]
    fn wildcard_scope_satisfies_everything() {
        let hierarchy = ScopeHierarchy::new(Map::new());
        let ctx = AuthContext {
            subject: "root".into(),
            auth_type: AuthType::Bearer,
            scopes: vec!["*".into()],
        };
        assert!(ctx.has_scope("anything:at-all", &hierarchy));
    }

    #[test]
    fn unsupported_jwt_algorithm_is_rejected_at_construction() {
        let result = JwtProvider::new("s".into(), "none", None, None);
        assert!(result.is_err());
    }
}
