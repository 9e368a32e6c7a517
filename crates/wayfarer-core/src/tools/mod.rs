//! Travel tools exposed to the model through function calling.
//!
//! Every tool answers with a JSON object carrying a `status` of `success`,
//! `empty` or `error`. Problems the model can fix (bad dates, unknown ids,
//! nothing found) are reported through that status so the model can explain
//! them to the user; only malformed arguments surface as `AgentError`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::amadeus::AmadeusClient;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::session::TravelSession;

pub mod flights;
pub mod hotels;
pub mod validation;

pub use flights::{BookFlightTool, SearchFlightsTool};
pub use hotels::{BookHotelTool, NextHotelResultsTool, SearchHotelOffersTool, SearchHotelsTool};
pub use validation::ArgumentValidator;

/// Reply given to the user when an upstream call fails for reasons the model
/// cannot act on.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "We are currently unable to process your request. Please contact an agent or try again later.";

#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn execute(&self, arguments: Value) -> Result<String, AgentError>;
}

/// Status-tagged tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    Success(Map<String, Value>),
    Empty(String),
    Error(String),
}

impl ToolReply {
    pub fn success(payload: Value) -> Self {
        match payload {
            Value::Object(map) => ToolReply::Success(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                ToolReply::Success(map)
            }
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        ToolReply::Empty(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolReply::Error(message.into())
    }

    pub fn unavailable() -> Self {
        ToolReply::Error(SERVICE_UNAVAILABLE_MESSAGE.to_string())
    }

    pub fn status(&self) -> &'static str {
        match self {
            ToolReply::Success(_) => "success",
            ToolReply::Empty(_) => "empty",
            ToolReply::Error(_) => "error",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ToolReply::Success(payload) => {
                let mut map = Map::new();
                map.insert("status".to_string(), json!("success"));
                for (key, value) in payload {
                    map.insert(key.clone(), value.clone());
                }
                Value::Object(map)
            }
            ToolReply::Empty(message) | ToolReply::Error(message) => {
                json!({ "status": self.status(), "message": message })
            }
        }
    }

    pub fn into_output(self) -> String {
        self.to_value().to_string()
    }
}

/// Deserializes tool arguments into the tool's typed parameter struct.
pub(crate) fn parse_args<T: DeserializeOwned>(tool_name: &str, arguments: Value) -> Result<T, AgentError> {
    // A parameterless call may arrive as `null`.
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments)
        .map_err(|e| AgentError::tool(tool_name, format!("Invalid arguments: {}", e)))
}

/// Registry of tools, kept in registration order.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    validator: ArgumentValidator,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            validator: ArgumentValidator::new(),
        }
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        let metadata = tool.metadata();
        self.validator.add_schema(&metadata.name, &metadata.input_schema);
        if self.tools.insert(metadata.name.clone(), tool).is_none() {
            self.order.push(metadata.name);
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.metadata())
            .collect()
    }

    pub fn remove_tool(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.order.retain(|n| n != name);
        self.validator.remove_schema(name);
        self.tools.remove(name)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Validates the arguments against the tool's schema, then runs it.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<String, AgentError> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| AgentError::tool(name, format!("Unknown tool: {}", name)))?;
        self.validator.validate(name, &arguments)?;
        tool.execute(arguments).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ToolFactory;

impl ToolFactory {
    /// The six flight and hotel tools bound to one chat session.
    pub fn create_travel_registry(
        client: Arc<AmadeusClient>,
        session: Arc<TravelSession>,
        hotel_batch_size: usize,
    ) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_tool(Arc::new(SearchFlightsTool::new(client.clone(), session.clone())));
        registry.register_tool(Arc::new(BookFlightTool::new(session.clone())));
        registry.register_tool(Arc::new(SearchHotelsTool::new(
            client.clone(),
            session.clone(),
            hotel_batch_size,
        )));
        registry.register_tool(Arc::new(NextHotelResultsTool::new(
            session.clone(),
            hotel_batch_size,
        )));
        registry.register_tool(Arc::new(SearchHotelOffersTool::new(client.clone())));
        registry.register_tool(Arc::new(BookHotelTool::new(client)));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmadeusSettings;
    use std::time::Duration;

    fn travel_registry() -> ToolRegistry {
        let client = Arc::new(AmadeusClient::new(&AmadeusSettings::default()).unwrap());
        let session = Arc::new(TravelSession::new(Duration::from_secs(60)));
        ToolFactory::create_travel_registry(client, session, 5)
    }

    #[test]
    fn test_travel_registry_lists_tools_in_order() {
        let registry = travel_registry();
        let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "search_flights",
                "book_flight",
                "search_hotels",
                "get_next_hotel_results",
                "search_hotel_offers",
                "book_hotel"
            ]
        );
    }

    #[test]
    fn test_registry_remove_tool() {
        let mut registry = travel_registry();
        assert!(registry.remove_tool("book_flight").is_some());
        assert_eq!(registry.tool_count(), 5);
        assert!(registry.get_tool("book_flight").is_none());
        assert!(!registry.list_tools().iter().any(|t| t.name == "book_flight"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = travel_registry();
        let err = registry.execute("teleport", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool: teleport"));
    }

    #[tokio::test]
    async fn test_execute_rejects_schema_violation() {
        let registry = travel_registry();
        let err = registry
            .execute("book_flight", json!({"booking_id": "1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ValidationError(_)));
    }

    #[test]
    fn test_tool_reply_shapes() {
        let reply = ToolReply::success(json!({"booking_id": "MS/1"}));
        assert_eq!(reply.to_value(), json!({"status": "success", "booking_id": "MS/1"}));

        let reply = ToolReply::empty("No more hotels available.");
        let output: Value = serde_json::from_str(&reply.into_output()).unwrap();
        assert_eq!(
            output,
            json!({"status": "empty", "message": "No more hotels available."})
        );

        assert_eq!(ToolReply::unavailable().status(), "error");
    }
}
