//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::AgentError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an optional YAML file; without one, defaults are used.
    pub async fn load(path: Option<&Path>) -> Result<WayfarerConfig, AgentError> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => {
                log::info!("No configuration file given, using defaults");
                let mut config = WayfarerConfig::default();
                Self::resolve_environment(&mut config)?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<WayfarerConfig, AgentError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<WayfarerConfig, AgentError> {
        let mut config: WayfarerConfig = serde_yaml::from_str(content)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

        Self::resolve_environment(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load dotenv files, then fill any secret not given inline from its
    /// environment variable.
    fn resolve_environment(config: &mut WayfarerConfig) -> Result<(), AgentError> {
        for env_file in &config.environment.env_files {
            if env_file.exists() {
                Self::load_env_file(env_file)?;
            }
        }

        if config.llm.api_key.is_none() {
            config.llm.api_key = Self::read_env(&config.llm.api_key_env);
        }
        if config.amadeus.api_key.is_none() {
            config.amadeus.api_key = Self::read_env(&config.amadeus.api_key_env);
        }
        if config.amadeus.api_secret.is_none() {
            config.amadeus.api_secret = Self::read_env(&config.amadeus.api_secret_env);
        }

        Ok(())
    }

    fn load_env_file(path: &Path) -> Result<(), AgentError> {
        dotenvy::from_path(path).map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to load environment file {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded environment file {}", path.display());
        Ok(())
    }

    fn read_env(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}
