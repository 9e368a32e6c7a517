//! Configuration for the travel assistant
//!
//! A YAML file (optional) supplies server, model, Amadeus and agent settings;
//! `.env` files and the process environment supply secrets.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::AgentError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<WayfarerConfig, AgentError> {
    ConfigLoader::from_file(path).await
}

/// Validate a configuration
pub fn validate_config(config: &WayfarerConfig) -> Result<(), AgentError> {
    config.validate()
}
