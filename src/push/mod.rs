//! Webhook push notifications for task status/artifact events.
//!
//! Each task may have zero or more registered webhook configs
//! (`tasks/pushNotificationConfig/set`). Delivery signs the envelope with
//! HMAC-SHA256 over the raw JSON body and retries with bounded exponential
//! backoff, modeled directly on the MCP client's own retry loop. Delivery
//! failures are logged and never propagate back into the task's own
//! status — a webhook endpoint being down is not the agent's failure.

use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AgentError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotificationConfig {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Per-task registered webhook configs, keyed by `task_id`.
#[derive(Debug, Default)]
pub struct PushConfigStore {
    configs: DashMap<String, Vec<PushNotificationConfig>>,
}

impl PushConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, task_id: &str, config: PushNotificationConfig) {
        let mut entry = self.configs.entry(task_id.to_string()).or_default();
        if let Some(existing) = entry.iter_mut().find(|c| c.id == config.id) {
            *existing = config;
        } else {
            entry.push(config);
        }
    }

    pub fn get(&self, task_id: &str, config_id: &str) -> Option<PushNotificationConfig> {
        self.configs
            .get(task_id)
            .and_then(|list| list.iter().find(|c| c.id == config_id).cloned())
    }

    pub fn list(&self, task_id: &str) -> Vec<PushNotificationConfig> {
        self.configs.get(task_id).map(|l| l.clone()).unwrap_or_default()
    }

    pub fn delete(&self, task_id: &str, config_id: &str) -> bool {
        match self.configs.get_mut(task_id) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|c| c.id != config_id);
                before != list.len()
            }
            None => false,
        }
    }
}

pub struct PushNotifier {
    client: reqwest::Client,
    signing_secret: Option<String>,
    max_retries: u32,
}

impl PushNotifier {
    pub fn new(signing_secret: Option<String>, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            signing_secret,
            max_retries: max_retries.max(1),
        }
    }

    /// Delivers `payload` to every configured webhook for `task_id`,
    /// logging (not propagating) per-delivery failures.
    pub async fn notify(&self, store: &PushConfigStore, task_id: &str, payload: &serde_json::Value) {
        for config in store.list(task_id) {
            if let Err(e) = self.deliver(&config, payload).await {
                tracing::warn!(task_id, url = %config.url, error = %e, "push notification delivery failed");
            }
        }
    }

    async fn deliver(&self, config: &PushNotificationConfig, payload: &serde_json::Value) -> Result<(), AgentError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| AgentError::Delivery(format!("failed to encode payload: {e}")))?;

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match self.attempt_delivery(config, &body).await {
                Ok(()) => return Ok(()),
                Err(DeliveryAttemptError::NonRetryable(msg)) => {
                    return Err(AgentError::Delivery(msg));
                }
                Err(DeliveryAttemptError::Retryable(msg)) => {
                    last_error = Some(msg);
                }
            }
            if attempt + 1 < self.max_retries {
                let wait = Duration::from_secs(2u64.pow(attempt));
                tokio::time::sleep(wait).await;
            }
        }
        Err(AgentError::Delivery(
            last_error.unwrap_or_else(|| "exhausted retries".to_string()),
        ))
    }

    async fn attempt_delivery(&self, config: &PushNotificationConfig, body: &[u8]) -> Result<(), DeliveryAttemptError> {
        let mut request = self
            .client
            .post(&config.url)
            .header("Content-Type", "application/json")
            .body(body.to_vec());

        if let Some(token) = &config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }
        if let Some(secret) = &self.signing_secret {
            let signature = sign(secret, body)
                .map_err(|e| DeliveryAttemptError::NonRetryable(e.to_string()))?;
            request = request.header("X-Hub-Signature-256", format!("sha256={signature}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryAttemptError::Retryable(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let code = status.as_u16();
        // 429 and 5xx are transient; any other 4xx means the endpoint
        // rejected the request itself and retrying won't help.
        if code == 429 || status.is_server_error() {
            Err(DeliveryAttemptError::Retryable(format!("webhook returned {code}")))
        } else {
            Err(DeliveryAttemptError::NonRetryable(format!("webhook returned {code}")))
        }
    }
}

enum DeliveryAttemptError {
    Retryable(String),
    NonRetryable(String),
}

fn sign(secret: &str, body: &[u8]) -> Result<String, AgentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AgentError::Delivery(format!("invalid signing secret: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// A minimal SSRF guard for `tasks/pushNotificationConfig/set`: rejects
/// non-http(s) schemes and literal loopback/private/link-local addresses.
/// This is a literal-IP check, not a DNS-resolving one — a hostname that
/// resolves to a private address at delivery time still gets through, the
/// same tradeoff the MCP HTTP transport makes for its own target URLs.
pub fn validate_webhook_url(url: &str) -> Result<(), AgentError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| AgentError::Config(format!("invalid push notification url: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AgentError::Config(
            "push notification url must use http or https".into(),
        ));
    }
    let host = parsed.host_str().unwrap_or("");
    if host.eq_ignore_ascii_case("localhost") {
        return Err(AgentError::Config(
            "push notification url may not target localhost".into(),
        ));
    }
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if is_non_routable(&ip) {
            return Err(AgentError::Config(
                "push notification url resolves to a non-routable address".into(),
            ));
        }
    }
    Ok(())
}

fn is_non_routable(ip: &std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified(),
        std::net::IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_store_set_is_upsert_by_id() {
        let store = PushConfigStore::new();
        store.set(
            "task-1",
            PushNotificationConfig {
                id: "cfg-1".into(),
                url: "https://example.com/a".into(),
                token: None,
                headers: HashMap::new(),
            },
        );
        store.set(
            "task-1",
            PushNotificationConfig {
                id: "cfg-1".into(),
                url: "https://example.com/b".into(),
                token: None,
                headers: HashMap::new(),
            },
        );
        let list = store.list("task-1");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].url, "https://example.com/b");
    }

    #[test]
    fn config_store_delete_reports_whether_removed() {
        let store = PushConfigStore::new();
        store.set(
            "task-2",
            PushNotificationConfig {
                id: "cfg-1".into(),
                url: "https://example.com".into(),
                token: None,
                headers: HashMap::new(),
            },
        );
        assert!(store.delete("task-2", "cfg-1"));
        assert!(!store.delete("task-2", "cfg-1"));
    }

    #[test]
    fn signature_is_deterministic_for_same_secret_and_body() {
        let a = sign("secret", b"hello").unwrap();
        let b = sign("secret", b"hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_differs_across_secrets() {
        let a = sign("secret-a", b"hello").unwrap();
        let b = sign("secret-b", b"hello").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn validate_webhook_url_accepts_public_https() {
        assert!(validate_webhook_url("https://example.com/hooks/agentup").is_ok());
    }

    #[test]
    fn validate_webhook_url_rejects_loopback() {
        assert!(validate_webhook_url("http://127.0.0.1:9000/hook").is_err());
    }

    #[test]
    fn validate_webhook_url_rejects_private_range() {
        assert!(validate_webhook_url("http://10.0.0.5/hook").is_err());
    }

    #[test]
    fn validate_webhook_url_rejects_non_http_scheme() {
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
    }
}
