//! AI-mode dispatch: a provider-agnostic function-calling loop.
//!
//! Mirrors the shape of `llms::base_llm::BaseLLM` (`model`, `acall`,
//! `supports_function_calling`) but scoped to what the dispatcher needs:
//! send a conversation, get back either a final text answer or a batch of
//! function calls to run before calling the provider again. Providers
//! that don't support native function calling fall back to a prompt-based
//! grammar the dispatcher parses itself.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::error::AgentError;

use super::function_registry::FunctionRegistry;

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub enum LlmReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// A provider capable of running one turn of a conversation, optionally
/// with function-calling tool declarations attached.
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    fn model(&self) -> &str;

    fn supports_function_calling(&self) -> bool {
        false
    }

    async fn acall(&self, messages: &[Value], tools: &[Value]) -> Result<LlmReply, AgentError>;
}

/// Caps the number of function-call round trips per dispatch, per
/// configuration default.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

pub struct Dispatcher {
    provider: Arc<dyn LlmProvider>,
    max_iterations: u32,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn LlmProvider>, max_iterations: u32) -> Self {
        Self {
            provider,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Runs the function-calling loop to completion: calls the provider,
    /// executes any requested tool calls in order, feeds their results
    /// back, and repeats until a text answer arrives or `max_iterations`
    /// is reached.
    ///
    /// A tool call that the function registry rejects (unknown function,
    /// scope failure, handler error) is surfaced back to the provider as
    /// a function-error message, not as a dispatch failure — the model
    /// gets a chance to recover or apologize rather than the whole task
    /// failing on one bad tool call.
    pub async fn dispatch(
        &self,
        functions: &FunctionRegistry,
        initial_messages: Vec<Value>,
        auth: Option<&AuthContext>,
    ) -> Result<String, AgentError> {
        let mut messages = initial_messages;
        let tools = functions.all_schemas();

        for _ in 0..self.max_iterations {
            let reply = if self.provider.supports_function_calling() {
                self.provider.acall(&messages, &tools).await?
            } else {
                self.call_with_prompt_grammar(&messages, &tools).await?
            };

            match reply {
                LlmReply::Text(text) => return Ok(text),
                LlmReply::ToolCalls(calls) => {
                    messages.push(serde_json::json!({
                        "role": "assistant",
                        "tool_calls": calls.iter().map(|c| serde_json::json!({
                            "id": c.id, "name": c.name, "arguments": c.arguments
                        })).collect::<Vec<_>>(),
                    }));

                    for call in calls {
                        let result = functions.call(&call.name, call.arguments.clone(), auth).await;
                        let content = match result {
                            Ok(value) => value,
                            Err(e) => serde_json::json!({ "error": e.to_string() }),
                        };
                        messages.push(serde_json::json!({
                            "role": "tool",
                            "tool_call_id": call.id,
                            "name": call.name,
                            "content": content,
                        }));
                    }
                }
            }
        }

        Err(AgentError::Dispatch(format!(
            "exceeded max_iterations ({}) without a final answer",
            self.max_iterations
        )))
    }

    /// Providers without native function calling get their tool schemas
    /// rendered into the prompt as a `FUNCTION_CALL: name(param="value", ...)`
    /// grammar and are expected to reply in kind; this parses that grammar
    /// back into `ToolCall`s, one per matching line.
    async fn call_with_prompt_grammar(&self, messages: &[Value], tools: &[Value]) -> Result<LlmReply, AgentError> {
        let mut augmented = messages.to_vec();
        if !tools.is_empty() {
            augmented.push(serde_json::json!({
                "role": "system",
                "content": render_tool_grammar_prompt(tools),
            }));
        }
        let reply = self.provider.acall(&augmented, &[]).await?;
        match reply {
            LlmReply::Text(text) => match parse_call_lines(&text) {
                Some(calls) => Ok(LlmReply::ToolCalls(calls)),
                None => Ok(LlmReply::Text(text)),
            },
            already_parsed @ LlmReply::ToolCalls(_) => Ok(already_parsed),
        }
    }
}

fn render_tool_grammar_prompt(tools: &[Value]) -> String {
    let mut prompt = String::from(
        "You may call a function by replying with a line in the form:\n\
         FUNCTION_CALL: name(param=\"value\", ...)\n\
         Available functions:\n",
    );
    for tool in tools {
        if let Some(name) = tool.get("name").and_then(Value::as_str) {
            let description = tool.get("description").and_then(Value::as_str).unwrap_or("");
            prompt.push_str(&format!("- {name}: {description}\n"));
        }
    }
    prompt
}

/// Parses every `FUNCTION_CALL: name(param="value", ...)` line in `text`.
/// Returns `None` if no such line is present anywhere, so the caller treats
/// the whole text as a final answer; a line matching the prefix but failing
/// to parse is logged and treated as plain text, not a fatal error.
fn parse_call_lines(text: &str) -> Option<Vec<ToolCall>> {
    let mut calls = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("FUNCTION_CALL:") else {
            continue;
        };
        match parse_call_expr(rest.trim()) {
            Some((name, arguments)) => calls.push(ToolCall {
                id: format!("call-{}", calls.len()),
                name,
                arguments,
            }),
            None => {
                tracing::warn!(line, "failed to parse FUNCTION_CALL line, treating as text");
            }
        }
    }
    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

/// Parses one `name(param="value", count=3, active=true, ...)` expression
/// into a function name and a JSON object of decoded arguments. Tolerates
/// quoted strings with escaped quotes (`\"`) and bare numeric/bool/null
/// literals for unquoted values; anything else unquoted is kept as a
/// string. Returns `None` on any structural mismatch (unbalanced
/// parentheses, missing `=`, trailing garbage after the closing paren).
fn parse_call_expr(expr: &str) -> Option<(String, Value)> {
    let open = expr.find('(')?;
    if !expr.ends_with(')') {
        return None;
    }
    let name = expr[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':' || c == '-') {
        return None;
    }
    let inner = &expr[open + 1..expr.len() - 1];

    let mut args = serde_json::Map::new();
    for pair in split_args(inner) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, raw_value) = pair.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        args.insert(key.to_string(), parse_literal(raw_value.trim()));
    }

    Some((name.to_string(), Value::Object(args)))
}

/// Splits a `param="a, b", other=1` argument list on top-level commas,
/// treating commas inside a double-quoted (possibly `\"`-escaped) string as
/// part of the value rather than a separator.
fn split_args(inner: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Decodes one argument's raw text into a JSON value: a quoted string
/// (unescaping `\"` and `\\`), `true`/`false`, `null`, a number, or else the
/// raw text itself as a string.
fn parse_literal(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let body = &raw[1..raw.len() - 1];
        let mut unescaped = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('"') => unescaped.push('"'),
                    Some('\\') => unescaped.push('\\'),
                    Some('n') => unescaped.push('\n'),
                    Some('t') => unescaped.push('\t'),
                    Some(other) => unescaped.push(other),
                    None => {}
                }
            } else {
                unescaped.push(c);
            }
        }
        return Value::String(unescaped);
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::function_registry::{FunctionHandler, FunctionSchema};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedProvider {
        replies: Mutex<Vec<LlmReply>>,
        native: bool,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }

        fn supports_function_calling(&self) -> bool {
            self.native
        }

        async fn acall(&self, _messages: &[Value], _tools: &[Value]) -> Result<LlmReply, AgentError> {
            let mut replies = self.replies.lock().unwrap();
            Ok(replies.remove(0))
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl FunctionHandler for EchoHandler {
        async fn call(&self, arguments: Value, _auth: Option<&AuthContext>) -> Result<Value, AgentError> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn text_reply_returns_immediately() {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(vec![LlmReply::Text("hello".into())]),
            native: true,
        });
        let dispatcher = Dispatcher::new(provider, DEFAULT_MAX_ITERATIONS);
        let functions = FunctionRegistry::new();
        let result = dispatcher.dispatch(&functions, vec![], None).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn tool_call_then_text_completes_the_loop() {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(vec![
                LlmReply::ToolCalls(vec![ToolCall {
                    id: "call-0".into(),
                    name: "echo".into(),
                    arguments: serde_json::json!({"x": 1}),
                }]),
                LlmReply::Text("done".into()),
            ]),
            native: true,
        });
        let mut functions = FunctionRegistry::new();
        functions.register_capability_function(
            FunctionSchema {
                name: "echo".into(),
                description: "echoes".into(),
                input_schema: serde_json::json!({}),
            },
            Arc::new(EchoHandler),
        );
        let dispatcher = Dispatcher::new(provider, DEFAULT_MAX_ITERATIONS);
        let result = dispatcher.dispatch(&functions, vec![], None).await.unwrap();
        assert_eq!(result, "done");
    }

    #[tokio::test]
    async fn unknown_function_call_surfaces_as_error_message_not_failure() {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(vec![
                LlmReply::ToolCalls(vec![ToolCall {
                    id: "call-0".into(),
                    name: "missing".into(),
                    arguments: Value::Null,
                }]),
                LlmReply::Text("recovered".into()),
            ]),
            native: true,
        });
        let functions = FunctionRegistry::new();
        let dispatcher = Dispatcher::new(provider, DEFAULT_MAX_ITERATIONS);
        let result = dispatcher.dispatch(&functions, vec![], None).await.unwrap();
        assert_eq!(result, "recovered");
    }

    #[tokio::test]
    async fn max_iterations_without_answer_errors() {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(
                (0..10)
                    .map(|_| {
                        LlmReply::ToolCalls(vec![ToolCall {
                            id: "call-0".into(),
                            name: "echo".into(),
                            arguments: Value::Null,
                        }])
                    })
                    .collect(),
            ),
            native: true,
        });
        let mut functions = FunctionRegistry::new();
        functions.register_capability_function(
            FunctionSchema {
                name: "echo".into(),
                description: "echoes".into(),
                input_schema: serde_json::json!({}),
            },
            Arc::new(EchoHandler),
        );
        let dispatcher = Dispatcher::new(provider, 2);
        let result = dispatcher.dispatch(&functions, vec![], None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn prompt_based_grammar_is_parsed_into_tool_calls() {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(vec![
                LlmReply::Text("FUNCTION_CALL: echo(x=1)".into()),
                LlmReply::Text("done".into()),
            ]),
            native: false,
        });
        let mut functions = FunctionRegistry::new();
        functions.register_capability_function(
            FunctionSchema {
                name: "echo".into(),
                description: "echoes".into(),
                input_schema: serde_json::json!({}),
            },
            Arc::new(EchoHandler),
        );
        let dispatcher = Dispatcher::new(provider, DEFAULT_MAX_ITERATIONS);
        let result = dispatcher.dispatch(&functions, vec![], None).await.unwrap();
        assert_eq!(result, "done");
    }

    #[tokio::test]
    async fn prompt_grammar_line_with_no_match_is_treated_as_text() {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(vec![LlmReply::Text("just a friendly answer, no calls here".into())]),
            native: false,
        });
        let functions = FunctionRegistry::new();
        let dispatcher = Dispatcher::new(provider, DEFAULT_MAX_ITERATIONS);
        let result = dispatcher.dispatch(&functions, vec![], None).await.unwrap();
        assert_eq!(result, "just a friendly answer, no calls here");
    }

    #[test]
    fn parse_call_expr_handles_quoted_escaped_and_typed_literals() {
        let (name, args) = parse_call_expr(
            r#"search(query="a \"quoted\" term", limit=5, ratio=1.5, active=true, tag=null, plain=hello)"#,
        )
        .expect("should parse");
        assert_eq!(name, "search");
        assert_eq!(args["query"], Value::String("a \"quoted\" term".into()));
        assert_eq!(args["limit"], serde_json::json!(5));
        assert_eq!(args["ratio"], serde_json::json!(1.5));
        assert_eq!(args["active"], Value::Bool(true));
        assert_eq!(args["tag"], Value::Null);
        assert_eq!(args["plain"], Value::String("hello".into()));
    }

    #[test]
    fn parse_call_expr_tolerates_commas_inside_quoted_values() {
        let (name, args) = parse_call_expr(r#"note(text="first, second, third")"#).expect("should parse");
        assert_eq!(name, "note");
        assert_eq!(args["text"], Value::String("first, second, third".into()));
    }

    #[test]
    fn parse_call_expr_rejects_malformed_input() {
        assert!(parse_call_expr("not_a_call").is_none());
        assert!(parse_call_expr("missing_close(a=1").is_none());
        assert!(parse_call_expr("bad_pair(novalue)").is_none());
    }

    #[test]
    fn parse_call_lines_skips_unparsable_lines_without_failing() {
        let text = "FUNCTION_CALL: broken(\nFUNCTION_CALL: echo(x=1)\n";
        let calls = parse_call_lines(text).expect("one valid call");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "echo");
    }
}
