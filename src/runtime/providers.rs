//! A concrete `LlmProvider` speaking the OpenAI-compatible chat-completions
//! wire format over `reqwest`, used when `ai_provider.provider` selects
//! native function calling. Self-hosted/compatible backends that speak the
//! same wire format (the common case for `base_url` overrides) work
//! unchanged.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;

use super::dispatcher::{LlmProvider, LlmReply, ToolCall};

/// Chat-completions provider: builds the request body the way
/// `llms::providers::openai::OpenAICompletion::build_request_body` does,
/// but actually places the HTTP call and parses the response into an
/// `LlmReply`.
pub struct OpenAiChatProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl fmt::Debug for OpenAiChatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChatProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiChatProvider {
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok()),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn build_request_body(&self, messages: &[Value], tools: &[Value]) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            let openai_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.get("name"),
                            "description": t.get("description"),
                            "parameters": t.get("inputSchema").cloned().unwrap_or_else(|| serde_json::json!({})),
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(openai_tools);
            body["tool_choice"] = serde_json::json!("auto");
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiChatProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn supports_function_calling(&self) -> bool {
        true
    }

    async fn acall(&self, messages: &[Value], tools: &[Value]) -> Result<LlmReply, AgentError> {
        let body = self.build_request_body(messages, tools);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut req = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AgentError::Dispatch(format!("chat completion request failed: {e}")))?;
        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Dispatch(format!("chat completion response was not JSON: {e}")))?;

        if !status.is_success() {
            return Err(AgentError::Dispatch(format!(
                "chat completion provider returned {status}: {value}"
            )));
        }

        let message = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| AgentError::Dispatch("chat completion response had no choices[0].message".into()))?;

        if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
            if !tool_calls.is_empty() {
                let calls = tool_calls
                    .iter()
                    .filter_map(|call| {
                        let id = call.get("id")?.as_str()?.to_string();
                        let function = call.get("function")?;
                        let name = function.get("name")?.as_str()?.to_string();
                        let arguments = function
                            .get("arguments")
                            .and_then(Value::as_str)
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or(Value::Null);
                        Some(ToolCall { id, name, arguments })
                    })
                    .collect::<Vec<_>>();
                return Ok(LlmReply::ToolCalls(calls));
            }
        }

        let text = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(LlmReply::Text(text))
    }
}
