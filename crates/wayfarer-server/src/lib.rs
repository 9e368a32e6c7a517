//! HTTP and WebSocket front door for the travel assistant.
//!
//! Chat happens over `/ws/chat`: the client sends its conversation as JSON,
//! the server replies with an acknowledgement and then the assistant's
//! answer. A few plain HTTP routes expose a greeting, health and the tool
//! catalogue.

pub mod error;
pub mod ws;

pub use error::{Result, ServerError};
pub use ws::{ConnectionManager, ServerFrame};

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::{middleware, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wayfarer_core::config::{AgentSettings, ServerSettings};
use wayfarer_core::core_types::ChatOptions;
use wayfarer_core::llm::ToolMetadata;
use wayfarer_core::tools::ToolFactory;
use wayfarer_core::{AmadeusClient, TravelSession, LLM};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub active_connections: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: None,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        let config = Self::new()
            .with_bind_addr_str(&settings.bind_addr)?
            .with_logging(settings.request_logging);
        Ok(match &settings.cors_origins {
            Some(origins) => config.with_cors_origins(origins.clone()),
            None => config,
        })
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared by every request and connection.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LLM>,
    pub amadeus: Arc<AmadeusClient>,
    pub agent_settings: AgentSettings,
    /// Model and temperature for frames that name neither.
    pub chat_defaults: ChatOptions,
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(llm: Arc<dyn LLM>, amadeus: Arc<AmadeusClient>, agent_settings: AgentSettings) -> Self {
        Self {
            llm,
            amadeus,
            agent_settings,
            chat_defaults: ChatOptions::default(),
            connections: Arc::new(ConnectionManager::new()),
        }
    }

    pub fn with_chat_defaults(mut self, defaults: ChatOptions) -> Self {
        self.chat_defaults = defaults;
        self
    }

    /// Tool catalogue as offered to the model. Listing does not touch any
    /// connection's session.
    pub fn tool_catalogue(&self) -> Vec<ToolMetadata> {
        let session = Arc::new(TravelSession::new(Duration::from_secs(
            self.agent_settings.cache_ttl_secs,
        )));
        ToolFactory::create_travel_registry(
            self.amadeus.clone(),
            session,
            self.agent_settings.hotel_batch_size,
        )
        .list_tools()
    }
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Chat API" }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_connections: state.connections.connection_count().await,
    })
}

async fn tools_handler(State(state): State<AppState>) -> Json<Vec<ToolMetadata>> {
    let tools = state.tool_catalogue();
    log::info!("Listing {} tools", tools.len());
    Json(tools)
}

pub struct WayfarerServer {
    state: AppState,
    config: ServerConfig,
}

impl WayfarerServer {
    pub fn new(state: AppState) -> Self {
        Self::with_config(state, ServerConfig::default())
    }

    pub fn with_config(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/tools", get(tools_handler))
            .route("/ws/chat", get(ws::ws_chat_handler))
            .with_state(self.state.clone());

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent
                    if uri.path() == "/health" {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    log::debug!("Response {} completed in {:?}", request_id, start.elapsed());
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        let cors_layer = match &self.config.cors_origins {
            Some(origins) => {
                let parsed: std::result::Result<Vec<axum::http::HeaderValue>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match parsed {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(e) => {
                        log::warn!("Invalid CORS origin ({}), allowing any origin", e);
                        CorsLayer::permissive()
                    }
                }
            }
            None => CorsLayer::permissive(),
        };
        router.layer(cors_layer)
    }

    /// Start the server with graceful shutdown support. Open chat sockets
    /// are sent a Close frame once the signal fires.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("Wayfarer server starting on {}", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);
        log::info!("Tools endpoint: http://{}/tools", self.config.bind_addr);
        log::info!("Chat endpoint: ws://{}/ws/chat", self.config.bind_addr);

        let connections = self.state.connections.clone();
        let shutdown = async move {
            shutdown_signal.await;
            connections.shutdown_all().await;
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Wayfarer server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
