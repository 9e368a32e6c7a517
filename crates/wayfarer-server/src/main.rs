//! Wayfarer chat server binary
//!
//! Loads the configuration, connects the model provider and the Amadeus
//! client, and serves the chat WebSocket until Ctrl+C or SIGTERM.

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use wayfarer_core::config::ConfigLoader;
use wayfarer_core::llm::providers::create_llm_client;
use wayfarer_core::AmadeusClient;
use wayfarer_server::{shutdown_signal, AppState, ServerConfig, WayfarerServer};

const DEFAULT_CONFIG_FILE: &str = "wayfarer.yaml";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Wayfarer Server - travel assistant chat over WebSocket")]
struct Cli {
    #[clap(long, short, help = "YAML configuration file (defaults to ./wayfarer.yaml when present)")]
    config: Option<PathBuf>,

    #[clap(long, help = "Override the configured bind address, e.g. 0.0.0.0:8000")]
    bind_addr: Option<String>,

    #[clap(long, short, help = "Log level (error, warn, info, debug, trace)")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The record filter stays open; the effective level is the global max,
    // which is narrowed again once the configuration is known.
    let env_overrides = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .parse_default_env()
        .init();
    let cli_level = cli.log_level.as_deref().map(parse_level);
    if !env_overrides {
        log::set_max_level(cli_level.unwrap_or(LevelFilter::Info));
    }

    let config_path = cli.config.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let config = match ConfigLoader::load(config_path.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if !env_overrides && cli_level.is_none() {
        log::set_max_level(parse_level(&config.logging.level));
    }

    match &config_path {
        Some(path) => log::info!("Configuration loaded from {}", path.display()),
        None => log::info!("Running with default configuration"),
    }

    let llm = create_llm_client(&config.llm)?;
    log::info!(
        "Model provider ready: {} (default model {})",
        config.llm.api_base,
        config.llm.default_model
    );
    let amadeus = Arc::new(AmadeusClient::new(&config.amadeus)?);

    let mut server_config = ServerConfig::from_settings(&config.server)?;
    if let Some(bind_addr) = cli.bind_addr.as_deref() {
        server_config = server_config.with_bind_addr_str(bind_addr)?;
    }

    let state = AppState::new(llm, amadeus, config.agent.clone())
        .with_chat_defaults(config.llm.chat_options());
    let server = WayfarerServer::with_config(state, server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}
