//! LLM provider implementations

use crate::config::LlmSettings;
use crate::errors::AgentError;
use crate::llm::LLM;
use std::sync::Arc;

pub mod openai;

/// Create the chat-completions client described by the settings.
pub fn create_llm_client(settings: &LlmSettings) -> Result<Arc<dyn LLM>, AgentError> {
    openai::create_client(settings)
}
