//! Configuration type definitions
//!
//! Every field carries a serde default so that a missing file, an empty
//! section or a partial YAML document all yield a runnable configuration.
//! Secrets are never required in the file itself: each one names the
//! environment variable it is read from when not given inline.

use crate::core_types::ChatOptions;
use crate::errors::AgentError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub amadeus: AmadeusSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Allowed CORS origins; `None` allows any origin.
    #[serde(default)]
    pub cors_origins: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub request_logging: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: None,
            request_logging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_openai_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: default_openai_base(),
            api_key: None,
            api_key_env: default_openai_key_env(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmSettings {
    /// Model and temperature used when a chat request names neither.
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            model: self.default_model.clone(),
            temperature: self.default_temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmadeusSettings {
    #[serde(default = "default_amadeus_base")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_amadeus_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_amadeus_secret_env")]
    pub api_secret_env: String,
    #[serde(default = "default_amadeus_timeout")]
    pub timeout_secs: u64,
    /// Search radius in kilometres for city and geocode hotel lookups.
    #[serde(default = "default_hotel_radius")]
    pub hotel_search_radius: u32,
    #[serde(default)]
    pub payment: PaymentCardSettings,
}

impl Default for AmadeusSettings {
    fn default() -> Self {
        Self {
            base_url: default_amadeus_base(),
            api_key: None,
            api_key_env: default_amadeus_key_env(),
            api_secret: None,
            api_secret_env: default_amadeus_secret_env(),
            timeout_secs: default_amadeus_timeout(),
            hotel_search_radius: default_hotel_radius(),
            payment: PaymentCardSettings::default(),
        }
    }
}

/// Card attached to hotel orders. Defaults to the Amadeus sandbox test card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCardSettings {
    #[serde(default = "default_vendor_code")]
    pub vendor_code: String,
    #[serde(default = "default_card_number")]
    pub card_number: String,
    #[serde(default = "default_card_expiry")]
    pub expiry_date: String,
}

impl Default for PaymentCardSettings {
    fn default() -> Self {
        Self {
            vendor_code: default_vendor_code(),
            card_number: default_card_number(),
            expiry_date: default_card_expiry(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Overrides the built-in travel assistant prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_hotel_batch_size")]
    pub hotel_batch_size: usize,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tool_rounds: default_max_tool_rounds(),
            tool_timeout_secs: default_tool_timeout(),
            hotel_batch_size: default_hotel_batch_size(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Dotenv files loaded before secrets are resolved. Missing files are skipped.
    #[serde(default = "default_env_files")]
    pub env_files: Vec<PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            env_files: default_env_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WayfarerConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                AgentError::ConfigError(format!(
                    "Invalid bind address '{}': {}",
                    self.server.bind_addr, e
                ))
            })?;

        if self.llm.api_base.trim().is_empty() {
            return Err(AgentError::ConfigError("llm.api_base must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.default_temperature) {
            return Err(AgentError::ConfigError(format!(
                "llm.default_temperature must be between 0 and 2, got {}",
                self.llm.default_temperature
            )));
        }
        if self.amadeus.base_url.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "amadeus.base_url must not be empty".to_string(),
            ));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(AgentError::ConfigError(
                "agent.max_tool_rounds must be greater than 0".to_string(),
            ));
        }
        if self.agent.hotel_batch_size == 0 {
            return Err(AgentError::ConfigError(
                "agent.hotel_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.agent.tool_timeout_secs == 0 {
            return Err(AgentError::ConfigError(
                "agent.tool_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(origins) = &self.server.cors_origins {
            if origins.iter().any(|o| o.trim().is_empty()) {
                return Err(AgentError::ConfigError(
                    "server.cors_origins must not contain empty entries".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    crate::core_types::DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    crate::core_types::DEFAULT_TEMPERATURE
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_amadeus_base() -> String {
    "https://test.api.amadeus.com".to_string()
}

fn default_amadeus_key_env() -> String {
    "AMADEUS_API_KEY".to_string()
}

fn default_amadeus_secret_env() -> String {
    "AMADEUS_API_SECRET".to_string()
}

fn default_amadeus_timeout() -> u64 {
    30
}

fn default_hotel_radius() -> u32 {
    5
}

fn default_vendor_code() -> String {
    "VI".to_string()
}

fn default_card_number() -> String {
    "4151289722471370".to_string()
}

fn default_card_expiry() -> String {
    "2026-08".to_string()
}

fn default_max_tool_rounds() -> usize {
    3
}

fn default_tool_timeout() -> u64 {
    60
}

fn default_hotel_batch_size() -> usize {
    5
}

fn default_cache_ttl() -> u64 {
    30 * 60
}

fn default_env_files() -> Vec<PathBuf> {
    vec![PathBuf::from(".env")]
}

fn default_log_level() -> String {
    "info".to_string()
}
