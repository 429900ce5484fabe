//! Chat-completion backend
//!
//! The manager talks to the backend through the `ChatBackend`/`ChatSession`
//! traits so tests can substitute a scripted stub. The production
//! implementation is an OpenAI-compatible chat-completions client: a session
//! owns the conversation history (system prompt first) and the shared tool
//! set, and `send` resolves any tool calls locally before returning the one
//! aggregated textual response.

use serde_json::{Value, json};
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::errors::{Error, Result};
use crate::tools::ToolSet;

/// Fallback text when the backend returns an empty message.
pub const NO_EXPLANATION: &str = "No explanation generated";

/// Upper bound on tool-resolution rounds within one `send`.
const MAX_TOOL_ROUNDS: usize = 8;

/// A stateful conversational channel bound to one persona.
pub trait ChatSession {
    /// Send a prompt and block until the full response text is available.
    fn send(&mut self, prompt: &str) -> Result<String>;

    /// Tear the session down.
    fn destroy(&mut self) -> Result<()>;
}

/// The completion service. One backend serves every persona session.
pub trait ChatBackend {
    fn open_session(&self, system_prompt: &str, tools: Arc<ToolSet>) -> Result<Box<dyn ChatSession>>;

    /// Stop the underlying connection. Called once during shutdown.
    fn stop(&self) -> Result<()>;
}

/// OpenAI-compatible HTTP backend.
pub struct HttpBackend {
    model: String,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    /// Resolve the backend from config, with environment fallbacks for the
    /// key and base URL so credentials stay out of config files.
    pub fn from_config(config: &BackendConfig) -> Result<HttpBackend> {
        let api_key = non_empty_env(&config.api_key_env)
            .or_else(|| non_empty_env("OPENAI_API_KEY"))
            .ok_or_else(|| {
                Error::Backend(format!(
                    "no API key: set {} or OPENAI_API_KEY",
                    config.api_key_env
                ))
            })?;

        let base_url = non_empty_env("SPLAIN_BASE_URL").unwrap_or_else(|| config.base_url.clone());
        let model = non_empty_env("SPLAIN_MODEL").unwrap_or_else(|| config.model.clone());

        if config.stream {
            // Streamed responses are drained server-side; callers always get
            // one aggregated message, so the wire request stays stream:false.
            log::debug!("stream=true configured; responses are still aggregated");
        }

        Ok(HttpBackend {
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl ChatBackend for HttpBackend {
    fn open_session(&self, system_prompt: &str, tools: Arc<ToolSet>) -> Result<Box<dyn ChatSession>> {
        Ok(Box::new(HttpSession {
            url: format!("{}/chat/completions", self.base_url),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            messages: vec![json!({"role": "system", "content": system_prompt})],
            tools,
        }))
    }

    fn stop(&self) -> Result<()> {
        // HTTP is connectionless; nothing to stop.
        Ok(())
    }
}

struct HttpSession {
    url: String,
    api_key: String,
    model: String,
    messages: Vec<Value>,
    tools: Arc<ToolSet>,
}

impl HttpSession {
    fn post_completion(&self) -> Result<Value> {
        let mut request = json!({
            "model": self.model,
            "messages": self.messages,
            "stream": false,
        });
        if !self.tools.is_empty() {
            request["tools"] = Value::Array(self.tools.schemas());
        }

        let body =
            serde_json::to_string(&request).map_err(|e| Error::Backend(format!("encode: {}", e)))?;

        let mut response = ureq::post(self.url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send(body.as_bytes())
            .map_err(|e| Error::Backend(format!("request failed: {}", e)))?;

        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Backend(format!("read failed: {}", e)))?;

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| Error::Backend(format!("bad response: {}", e)))?;

        extract_message(&parsed)
    }
}

impl ChatSession for HttpSession {
    fn send(&mut self, prompt: &str) -> Result<String> {
        self.messages.push(json!({"role": "user", "content": prompt}));

        for _ in 0..MAX_TOOL_ROUNDS {
            let message = self.post_completion()?;

            let tool_calls = message
                .get("tool_calls")
                .and_then(Value::as_array)
                .filter(|calls| !calls.is_empty())
                .cloned();

            match tool_calls {
                Some(calls) => {
                    self.messages.push(message);
                    for call in &calls {
                        let (id, name, args) = parse_tool_call(call);
                        log::debug!("tool call: {}", name);
                        let output = self.tools.invoke(&name, &args);
                        self.messages.push(json!({
                            "role": "tool",
                            "tool_call_id": id,
                            "content": output,
                        }));
                    }
                }
                None => {
                    let content = message
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    self.messages.push(json!({"role": "assistant", "content": content}));
                    if content.trim().is_empty() {
                        return Ok(NO_EXPLANATION.to_string());
                    }
                    return Ok(content);
                }
            }
        }

        Err(Error::Backend(format!(
            "no final response after {} tool rounds",
            MAX_TOOL_ROUNDS
        )))
    }

    fn destroy(&mut self) -> Result<()> {
        self.messages.clear();
        Ok(())
    }
}

/// Pull `choices[0].message` out of a completion response.
fn extract_message(response: &Value) -> Result<Value> {
    if let Some(err) = response.get("error") {
        let detail = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(Error::Backend(detail.to_string()));
    }

    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .cloned()
        .ok_or_else(|| Error::Backend("response has no choices".to_string()))
}

/// Decode one tool call: (call id, qualified tool name, parsed arguments).
/// Malformed argument JSON degrades to an empty object; the tool reports its
/// own validation error as inline text.
fn parse_tool_call(call: &Value) -> (String, String, Value) {
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let function = call.get("function").cloned().unwrap_or(Value::Null);
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let args = function
        .get("arguments")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| json!({}));
    (id, name, args)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_happy_path() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
        });
        let message = extract_message(&response).unwrap();
        assert_eq!(message["content"], "hello");
    }

    #[test]
    fn test_extract_message_error_body() {
        let response = json!({ "error": { "message": "model overloaded" } });
        match extract_message(&response) {
            Err(Error::Backend(reason)) => assert!(reason.contains("overloaded")),
            other => panic!("expected Backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_extract_message_no_choices() {
        let result = extract_message(&json!({"choices": []}));
        assert!(matches!(result, Err(Error::Backend(_))));
    }

    #[test]
    fn test_parse_tool_call() {
        let call = json!({
            "id": "call_1",
            "type": "function",
            "function": { "name": "filesystem_read_file", "arguments": "{\"path\":\"a.rs\"}" }
        });
        let (id, name, args) = parse_tool_call(&call);
        assert_eq!(id, "call_1");
        assert_eq!(name, "filesystem_read_file");
        assert_eq!(args["path"], "a.rs");
    }

    #[test]
    fn test_parse_tool_call_bad_arguments_degrade() {
        let call = json!({
            "id": "call_2",
            "function": { "name": "t", "arguments": "not json" }
        });
        let (_, _, args) = parse_tool_call(&call);
        assert_eq!(args, json!({}));
    }
}
