//! The chat loop.
//!
//! One call to [`TravelAgent::respond`] handles one client turn: the model is
//! asked for a reply, any tool calls it makes are executed and their results
//! fed back, and the final assistant text is returned.

use crate::config::AgentSettings;
use crate::core_types::{ChatRequest, Message, Role, ToolCall};
use crate::errors::AgentError;
use crate::llm::LLM;
use crate::tools::ToolRegistry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that helps users search and book flights and hotels.

- When the user requests flights or hotels, you will store the full list of results internally.
- If the user wants to book a flight, use the stored flight ID from the cache instead of calling 'search_flights' again.
- If the user wants to book a hotel, first use 'search_hotels' to find available hotels.
- To get available rooms or offers, use 'search_hotel_offers' with the correct hotel ID.
- If the cache is empty or expired, THEN you can call 'search_hotels' again.
";

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't understand that. Please try again.";
pub const FOLLOW_UP_ERROR_PREFIX: &str = "I'm sorry, I encountered an error processing your request.";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub tool_rounds: usize,
    pub tool_calls_executed: usize,
}

pub struct TravelAgent {
    llm: Arc<dyn LLM>,
    tools: ToolRegistry,
    system_prompt: String,
    max_tool_rounds: usize,
    tool_timeout: Duration,
}

impl TravelAgent {
    pub fn new(llm: Arc<dyn LLM>, tools: ToolRegistry) -> Self {
        let defaults = AgentSettings::default();
        Self {
            llm,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: defaults.max_tool_rounds,
            tool_timeout: Duration::from_secs(defaults.tool_timeout_secs),
        }
    }

    pub fn from_settings(llm: Arc<dyn LLM>, tools: ToolRegistry, settings: &AgentSettings) -> Self {
        let mut agent = Self::new(llm, tools)
            .with_max_tool_rounds(settings.max_tool_rounds)
            .with_tool_timeout(Duration::from_secs(settings.tool_timeout_secs));
        if let Some(prompt) = &settings.system_prompt {
            agent = agent.with_system_prompt(prompt.clone());
        }
        agent
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn respond(&self, request: ChatRequest) -> Result<AgentReply, AgentError> {
        let ChatRequest { mut messages, options } = request;
        if !messages.iter().any(|m| m.role == Role::System) {
            messages.insert(0, Message::system(self.system_prompt.clone()));
        }

        let tool_metadata = self.tools.list_tools();
        log::info!(
            "Sending {} message(s) to model '{}' with {} tool(s)",
            messages.len(),
            options.model,
            tool_metadata.len()
        );

        let mut response = self
            .llm
            .generate(messages.clone(), Some(tool_metadata.clone()), &options)
            .await?;

        let mut tool_rounds = 0;
        let mut tool_calls_executed = 0;

        while response.has_tool_calls() && tool_rounds < self.max_tool_rounds {
            tool_rounds += 1;
            let calls = assign_call_ids(response.tool_calls.take().unwrap_or_default());
            log::info!("Tool round {}: {} call(s)", tool_rounds, calls.len());

            messages.push(Message::assistant_tool_calls(response.content.take(), calls.clone()));
            for call in calls {
                let output = self.run_tool(&call).await;
                tool_calls_executed += 1;
                messages.push(Message::tool_result(call.id.unwrap_or_default(), output));
            }

            log::info!("Sending follow-up request with tool results");
            response = match self
                .llm
                .generate(messages.clone(), Some(tool_metadata.clone()), &options)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    log::error!("Error getting final response after tool calls: {}", e);
                    return Ok(AgentReply {
                        content: format!("{} {}", FOLLOW_UP_ERROR_PREFIX, e),
                        tool_rounds,
                        tool_calls_executed,
                    });
                }
            };
        }

        if response.has_tool_calls() {
            log::warn!(
                "Tool round limit ({}) reached with calls still pending",
                self.max_tool_rounds
            );
        }

        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        Ok(AgentReply {
            content,
            tool_rounds,
            tool_calls_executed,
        })
    }

    /// Runs one tool call and renders its outcome as the tool message body.
    async fn run_tool(&self, call: &ToolCall) -> String {
        if let Some(error) = &call.argument_error {
            log::error!("Skipping function {}: {}", call.name, error);
            return json!({ "error": error }).to_string();
        }

        log::info!("Executing function: {} with args: {}", call.name, call.arguments);
        let execution = self.tools.execute(&call.name, call.arguments.clone());

        match tokio::time::timeout(self.tool_timeout, execution).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::error!("Error executing function {}: {}", call.name, e);
                json!({ "error": tool_error_message(&e) }).to_string()
            }
            Err(_) => {
                let error = AgentError::Timeout(format!(
                    "Tool '{}' timed out after {:?}",
                    call.name, self.tool_timeout
                ));
                log::error!("{}", error);
                json!({ "error": tool_error_message(&error) }).to_string()
            }
        }
    }
}

fn tool_error_message(error: &AgentError) -> String {
    match error {
        AgentError::ToolError { message, .. } => message.clone(),
        AgentError::ValidationError(message) => message.clone(),
        AgentError::Timeout(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Tool messages must reference the call they answer, so calls the provider
/// left without an id get one here.
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.as_deref().map_or(true, str::is_empty) {
                call.id = Some(format!("call_{}", uuid::Uuid::new_v4().simple()));
            }
            call
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{ChatOptions, LLMResponse};
    use crate::llm::ToolMetadata;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedLLM {
        responses: Mutex<VecDeque<Result<LLMResponse, AgentError>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLLM {
        fn new(responses: Vec<Result<LLMResponse, AgentError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLM for ScriptedLLM {
        async fn generate(
            &self,
            messages: Vec<Message>,
            _tools: Option<Vec<ToolMetadata>>,
            _options: &ChatOptions,
        ) -> Result<LLMResponse, AgentError> {
            self.requests.lock().unwrap().push(messages);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text("script exhausted")))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "echo".to_string(),
                description: "Echoes its input".to_string(),
                input_schema: json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            }
        }

        async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
            Ok(json!({"status": "success", "echo": arguments["text"]}).to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "slow".to_string(),
                description: "Never finishes in time".to_string(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    fn text(content: &str) -> LLMResponse {
        LLMResponse {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    fn calls(calls: Vec<(&str, &str, Value)>) -> LLMResponse {
        LLMResponse {
            tool_calls: Some(
                calls
                    .into_iter()
                    .map(|(id, name, arguments)| ToolCall::new(Some(id.to_string()), name, arguments))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn agent(llm: Arc<ScriptedLLM>) -> TravelAgent {
        let mut tools = ToolRegistry::new();
        tools.register_tool(Arc::new(EchoTool));
        tools.register_tool(Arc::new(SlowTool));
        TravelAgent::new(llm, tools).with_tool_timeout(Duration::from_millis(50))
    }

    fn request(content: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![Message::user(content)],
            options: ChatOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_plain_reply_inserts_system_prompt() {
        let llm = ScriptedLLM::new(vec![Ok(text("Hello!"))]);
        let reply = agent(llm.clone()).respond(request("hi")).await.unwrap();

        assert_eq!(reply.content, "Hello!");
        assert_eq!(reply.tool_rounds, 0);
        let sent = &llm.requests()[0];
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[0].content.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(sent[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_existing_system_prompt_is_kept() {
        let llm = ScriptedLLM::new(vec![Ok(text("ok"))]);
        let request = ChatRequest {
            messages: vec![Message::system("custom"), Message::user("hi")],
            options: ChatOptions::default(),
        };
        agent(llm.clone()).respond(request).await.unwrap();

        let sent = &llm.requests()[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].content.as_deref(), Some("custom"));
    }

    #[tokio::test]
    async fn test_tool_round_feeds_results_back() {
        let llm = ScriptedLLM::new(vec![
            Ok(calls(vec![
                ("call_1", "echo", json!({"text": "a"})),
                ("call_2", "teleport", json!({})),
            ])),
            Ok(text("done")),
        ]);
        let reply = agent(llm.clone()).respond(request("go")).await.unwrap();

        assert_eq!(reply.content, "done");
        assert_eq!(reply.tool_rounds, 1);
        assert_eq!(reply.tool_calls_executed, 2);

        let follow_up = &llm.requests()[1];
        let assistant = &follow_up[2];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.tool_calls.as_ref().unwrap().len(), 2);

        let echo = &follow_up[3];
        assert_eq!(echo.tool_call_id.as_deref(), Some("call_1"));
        let echo: Value = serde_json::from_str(echo.content.as_deref().unwrap()).unwrap();
        assert_eq!(echo["echo"], "a");

        let unknown = &follow_up[4];
        assert_eq!(unknown.tool_call_id.as_deref(), Some("call_2"));
        let unknown: Value = serde_json::from_str(unknown.content.as_deref().unwrap()).unwrap();
        assert_eq!(unknown, json!({"error": "Unknown tool: teleport"}));
    }

    #[tokio::test]
    async fn test_tool_timeout_becomes_error_result() {
        let llm = ScriptedLLM::new(vec![
            Ok(calls(vec![("call_1", "slow", json!({}))])),
            Ok(text("sorry, too slow")),
        ]);
        agent(llm.clone()).respond(request("go")).await.unwrap();

        let tool_message = &llm.requests()[1][3];
        let body: Value = serde_json::from_str(tool_message.content.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"error": "Tool 'slow' timed out after 50ms"}));
    }

    #[tokio::test]
    async fn test_malformed_call_is_reported_while_others_run() {
        let mut response = calls(vec![("call_1", "echo", json!({"text": "a"}))]);
        if let Some(tool_calls) = response.tool_calls.as_mut() {
            tool_calls.push(ToolCall::malformed(
                Some("call_2".to_string()),
                "echo",
                "{\"text\": ",
                "Invalid tool call arguments JSON: EOF while parsing a value at line 1 column 9",
            ));
        }
        let llm = ScriptedLLM::new(vec![Ok(response), Ok(text("done"))]);
        let reply = agent(llm.clone()).respond(request("go")).await.unwrap();

        assert_eq!(reply.content, "done");
        assert_eq!(reply.tool_calls_executed, 2);

        let follow_up = &llm.requests()[1];
        let good: Value = serde_json::from_str(follow_up[3].content.as_deref().unwrap()).unwrap();
        assert_eq!(good["echo"], "a");

        assert_eq!(follow_up[4].tool_call_id.as_deref(), Some("call_2"));
        let bad: Value = serde_json::from_str(follow_up[4].content.as_deref().unwrap()).unwrap();
        assert_eq!(
            bad,
            json!({"error": "Invalid tool call arguments JSON: EOF while parsing a value at line 1 column 9"})
        );
    }

    #[tokio::test]
    async fn test_round_limit_stops_loop() {
        let looping = || Ok(calls(vec![("c", "echo", json!({"text": "again"}))]));
        let llm = ScriptedLLM::new(vec![looping(), looping(), looping(), looping()]);
        let reply = agent(llm.clone())
            .with_max_tool_rounds(2)
            .respond(request("loop"))
            .await
            .unwrap();

        assert_eq!(reply.tool_rounds, 2);
        assert_eq!(llm.requests().len(), 3);
        assert_eq!(reply.content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_follow_up_error_becomes_apology() {
        let llm = ScriptedLLM::new(vec![
            Ok(calls(vec![("call_1", "echo", json!({"text": "a"}))])),
            Err(AgentError::LLMError("rate limited".to_string())),
        ]);
        let reply = agent(llm).respond(request("go")).await.unwrap();
        assert_eq!(
            reply.content,
            "I'm sorry, I encountered an error processing your request. LLM interaction failed: rate limited"
        );
    }

    #[tokio::test]
    async fn test_first_call_error_propagates() {
        let llm = ScriptedLLM::new(vec![Err(AgentError::LLMError("down".to_string()))]);
        let err = agent(llm).respond(request("hi")).await.unwrap_err();
        assert!(matches!(err, AgentError::LLMError(_)));
    }

    #[tokio::test]
    async fn test_empty_content_uses_fallback() {
        let llm = ScriptedLLM::new(vec![Ok(text("  "))]);
        let reply = agent(llm).respond(request("hi")).await.unwrap();
        assert_eq!(reply.content, FALLBACK_REPLY);
    }

    #[test]
    fn test_missing_call_ids_are_assigned() {
        let assigned = assign_call_ids(vec![ToolCall::new(None, "echo", json!({}))]);
        assert!(assigned[0].id.as_deref().unwrap().starts_with("call_"));
    }
}
