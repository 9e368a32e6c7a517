//! Core library for the Wayfarer travel assistant.
//!
//! A chat client sends its conversation, the agent forwards it to an
//! OpenAI-compatible model together with a set of travel tools, and any tool
//! calls the model makes are executed against the Amadeus self-service APIs
//! before the final answer is produced.
//!
//! # Architecture Overview
//!
//! - **Agent loop**: system prompt injection, tool-call rounds and reply fallback
//! - **Language model integration**: the `LLM` trait and an OpenAI provider
//! - **Amadeus client**: OAuth token handling plus flight and hotel endpoints
//! - **Tools**: flight and hotel search/booking exposed as function-calling tools
//! - **Session state**: per-connection hotel pagination and flight result caches
//! - **Configuration**: YAML plus `.env` with environment-resolved secrets

pub mod agent;
pub mod amadeus;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod llm;
pub mod session;
pub mod tools;

pub use agent::{AgentReply, TravelAgent};
pub use amadeus::AmadeusClient;
pub use config::{ConfigLoader, WayfarerConfig};
pub use errors::AgentError;
pub use llm::LLM;
pub use session::TravelSession;
