use crate::config::LlmSettings;
use crate::core_types::{ChatOptions, LLMResponse, Message, Role, ToolCall, Usage};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    max_tokens: Option<u32>,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: "https://api.openai.com/v1".to_string(),
            max_tokens: None,
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        tools: Option<&[ToolMetadata]>,
        options: &ChatOptions,
    ) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": self.format_messages(messages),
            "temperature": options.temperature,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                log::debug!("Sending {} tools to OpenAI", tools.len());
                let formatted_tools: Vec<Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.input_schema
                            }
                        })
                    })
                    .collect();
                body["tools"] = formatted_tools.into();
                body["tool_choice"] = "auto".into();
            }
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut message = json!({
                    "role": msg.role.as_str(),
                    "content": msg.content
                });

                if let Role::Tool = msg.role {
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        message["tool_call_id"] = json!(tool_call_id);
                    }
                }

                if let Role::Assistant = msg.role {
                    if let Some(tool_calls) = &msg.tool_calls {
                        if !tool_calls.is_empty() {
                            let formatted_tool_calls: Vec<Value> = tool_calls
                                .iter()
                                .map(|tc| {
                                    json!({
                                        "id": tc.id.clone().unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                                        "type": "function",
                                        "function": {
                                            "name": tc.name,
                                            "arguments": wire_arguments(tc)
                                        }
                                    })
                                })
                                .collect();
                            message["tool_calls"] = json!(formatted_tool_calls);
                        }
                    }
                }

                message
            })
            .collect()
    }

    fn parse_response(&self, response: Value) -> Result<LLMResponse, AgentError> {
        let choices = response["choices"]
            .as_array()
            .ok_or_else(|| AgentError::ParsingError("No choices in response".to_string()))?;

        let choice = choices
            .first()
            .ok_or_else(|| AgentError::ParsingError("Empty choices array".to_string()))?;
        let message = &choice["message"];

        let content = message["content"].as_str().map(|s| s.to_string());

        let tool_calls = match message["tool_calls"].as_array() {
            Some(calls) => {
                let mut parsed_calls = Vec::new();
                for call in calls {
                    if let (Some(id), Some(function)) =
                        (call["id"].as_str(), call["function"].as_object())
                    {
                        if let Some(name) = function.get("name").and_then(|n| n.as_str()) {
                            let raw = function.get("arguments");
                            let id = Some(id.to_string());
                            parsed_calls.push(match parse_arguments(raw) {
                                Ok(arguments) => ToolCall::new(id, name, arguments),
                                Err(e) => {
                                    log::warn!("Tool call '{}' has malformed arguments: {}", name, e);
                                    let message = match e {
                                        AgentError::ParsingError(message) => message,
                                        other => other.to_string(),
                                    };
                                    let raw = raw.and_then(Value::as_str).unwrap_or_default();
                                    ToolCall::malformed(id, name, raw, message)
                                }
                            });
                        }
                    }
                }
                if parsed_calls.is_empty() {
                    None
                } else {
                    Some(parsed_calls)
                }
            }
            None => None,
        };

        if content.is_none() && tool_calls.is_none() {
            log::warn!("Model response has neither content nor tool calls");
        }

        let usage = response
            .get("usage")
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

        Ok(LLMResponse {
            content,
            tool_calls,
            finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
            usage,
        })
    }
}

/// Malformed calls are echoed back with the model's original string.
fn wire_arguments(call: &ToolCall) -> String {
    match (&call.argument_error, &call.arguments) {
        (Some(_), Value::String(raw)) => raw.clone(),
        _ => call.arguments.to_string(),
    }
}

/// Tool call arguments arrive as a JSON-encoded string; an empty string means
/// a call without parameters.
pub fn parse_arguments(raw: Option<&Value>) -> Result<Value, AgentError> {
    match raw {
        Some(Value::String(s)) if s.trim().is_empty() => Ok(json!({})),
        Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| {
            AgentError::ParsingError(format!("Invalid tool call arguments JSON: {}", e))
        }),
        Some(Value::Null) | None => Ok(json!({})),
        Some(other) => Ok(other.clone()),
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
        options: &ChatOptions,
    ) -> Result<LLMResponse, AgentError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request_body(&messages, tools.as_deref(), options);

        log::info!(
            "Sending {} messages to OpenAI (model={}, tools={})",
            messages.len(),
            options.model,
            tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );
        log::debug!(
            "Request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::LLMError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::LLMError(format!("Failed to read response: {}", e)))?;

        log::debug!("OpenAI API response ({}): {}", status, response_text);

        if !status.is_success() {
            return Err(AgentError::LLMError(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }
}

/// Create an OpenAI client from configuration
pub fn create_client(settings: &LlmSettings) -> Result<Arc<dyn LLM>, AgentError> {
    let api_key = settings.api_key.clone().ok_or_else(|| {
        AgentError::ConfigError(format!(
            "No API key found for OpenAI. Set llm.api_key or the {} environment variable",
            settings.api_key_env
        ))
    })?;

    let mut client = OpenAIClient::new(api_key)
        .with_api_base(settings.api_base.clone())
        .with_timeout(Duration::from_secs(settings.timeout_secs));

    if let Some(max_tokens) = settings.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }

    Ok(Arc::new(client))
}
