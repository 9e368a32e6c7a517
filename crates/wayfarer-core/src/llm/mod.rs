//! Language model abstraction.
//!
//! The chat loop only depends on the `LLM` trait; the OpenAI provider (and
//! any OpenAI-compatible endpoint reachable through `api_base`) lives under
//! `providers`.

pub use crate::core_types::{ChatOptions, LLMResponse, Message};
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod providers;

pub use providers::openai::OpenAIClient;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
        options: &ChatOptions,
    ) -> Result<LLMResponse, AgentError>;
}
