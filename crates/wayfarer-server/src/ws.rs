//! WebSocket chat protocol.
//!
//! Each text frame carries a whole conversation. The server acknowledges it,
//! runs one agent turn and answers with a single `chat_response` frame.
//! Connections are independent: every socket gets its own travel session, so
//! hotel pages and flight ids never leak between users.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use wayfarer_core::agent::FOLLOW_UP_ERROR_PREFIX;
use wayfarer_core::core_types::{ChatOptions, ChatRequest, Message, Role, ToolCall};
use wayfarer_core::llm::providers::openai::parse_arguments;
use wayfarer_core::tools::ToolFactory;
use wayfarer_core::{TravelAgent, TravelSession};

use crate::error::{Result, ServerError};
use crate::AppState;

pub const PROCESSING_MESSAGE: &str = "Processing your request...";

/// Channel sender half for pushing frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<WsMessage>;

pub struct ConnectionInfo {
    pub sender: WsSender,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

/// Tracks the live chat connections.
pub struct ConnectionManager {
    connections: RwLock<HashMap<String, ConnectionInfo>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a connection and returns both halves of its outbound channel.
    pub async fn add(&self, conn_id: String) -> (WsSender, mpsc::UnboundedReceiver<WsMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let info = ConnectionInfo {
            sender: tx.clone(),
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, info);
        (tx, rx)
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connected_at(&self, conn_id: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .map(|info| info.connected_at)
    }

    /// Sends a Close frame to every connection, then clears the map.
    pub async fn shutdown_all(&self) {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        for info in connections.values() {
            let _ = info.sender.send(WsMessage::Close(None));
        }
        connections.clear();
        log::info!("Closed {} WebSocket connection(s)", count);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames sent to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    MessageReceived { message: String },
    ChatResponse { message: String, role: Role },
    Error { message: String },
}

impl ServerFrame {
    fn to_ws(&self) -> Result<WsMessage> {
        Ok(WsMessage::Text(serde_json::to_string(self)?.into()))
    }
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(default)]
    messages: Vec<ClientMessage>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    role: Role,
    #[serde(default)]
    content: Option<ClientContent>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default)]
    tool_call_id: Option<String>,
}

/// Message content is usually a string, but some clients echo back a whole
/// message object as the content.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClientContent {
    Text(String),
    Nested {
        #[serde(default)]
        content: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

impl ClientMessage {
    fn into_message(self) -> Result<Message> {
        let content = match self.content {
            Some(ClientContent::Text(text)) => Some(text),
            Some(ClientContent::Nested { content }) => content,
            None => None,
        };

        let tool_calls = match self.tool_calls {
            Some(calls) => Some(
                calls
                    .into_iter()
                    .map(|call| -> Result<ToolCall> {
                        let arguments = parse_arguments(call.function.arguments.as_ref())?;
                        Ok(ToolCall::new(call.id, call.function.name, arguments))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        Ok(Message {
            role: self.role,
            content,
            tool_call_id: self.tool_call_id,
            tool_calls,
        })
    }
}

/// Decodes one inbound text frame into a chat request. `defaults` fills in
/// a missing model or temperature.
pub fn parse_frame(text: &str, defaults: &ChatOptions) -> Result<ChatRequest> {
    let frame: ClientFrame = serde_json::from_str(text)
        .map_err(|e| ServerError::invalid_request(format!("Malformed chat frame: {}", e)))?;

    let messages = frame
        .messages
        .into_iter()
        .map(ClientMessage::into_message)
        .collect::<Result<Vec<_>>>()?;

    Ok(ChatRequest {
        messages,
        options: ChatOptions {
            model: frame.model.unwrap_or_else(|| defaults.model.clone()),
            temperature: frame.temperature.unwrap_or(defaults.temperature),
        },
    })
}

/// Runs one agent turn. Failures are turned into an apology so the client
/// always receives a `chat_response`.
pub async fn run_turn(agent: &TravelAgent, request: ChatRequest) -> ServerFrame {
    let message = match agent.respond(request).await {
        Ok(reply) => {
            log::info!(
                "Turn finished after {} tool round(s), {} tool call(s)",
                reply.tool_rounds,
                reply.tool_calls_executed
            );
            reply.content
        }
        Err(e) => {
            log::error!("Chat turn failed: {}", e);
            format!("{} {}", FOLLOW_UP_ERROR_PREFIX, e)
        }
    };

    ServerFrame::ChatResponse {
        message,
        role: Role::Assistant,
    }
}

/// Handles one inbound text frame, pushing every reply frame through `tx`.
pub async fn process_frame(
    agent: &TravelAgent,
    defaults: &ChatOptions,
    text: &str,
    tx: &WsSender,
) -> Result<()> {
    let frames = match parse_frame(text, defaults) {
        Ok(request) => {
            send_frame(
                tx,
                &ServerFrame::MessageReceived {
                    message: PROCESSING_MESSAGE.to_string(),
                },
            )?;
            vec![run_turn(agent, request).await]
        }
        Err(e) => {
            log::warn!("Rejected frame ({}): {}", e.error_type(), e);
            vec![ServerFrame::Error {
                message: e.to_string(),
            }]
        }
    };

    for frame in &frames {
        send_frame(tx, frame)?;
    }
    Ok(())
}

fn send_frame(tx: &WsSender, frame: &ServerFrame) -> Result<()> {
    tx.send(frame.to_ws()?)
        .map_err(|_| ServerError::internal("WebSocket connection closed"))
}

/// Builds the agent owned by one connection.
pub fn connection_agent(state: &AppState) -> TravelAgent {
    let settings = &state.agent_settings;
    let session = Arc::new(TravelSession::new(Duration::from_secs(settings.cache_ttl_secs)));
    log::debug!("Created travel session {}", session.id);
    let tools = ToolFactory::create_travel_registry(
        state.amadeus.clone(),
        session,
        settings.hotel_batch_size,
    );
    TravelAgent::from_settings(state.llm.clone(), tools, settings)
}

pub async fn ws_chat_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = state.connections.add(conn_id.clone()).await;
    log::info!("WebSocket connected: {}", conn_id);

    let agent = connection_agent(&state);
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, WsMessage::Close(_));
            if sink.send(msg).await.is_err() || closing {
                log::debug!("WebSocket sink closed: {}", sender_conn_id);
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(WsMessage::Text(text)) => {
                log::info!("Received WebSocket message on {}: {}", conn_id, text.as_str());
                if let Err(e) = process_frame(&agent, &state.chat_defaults, text.as_str(), &tx).await {
                    log::warn!("Failed to answer frame on {}: {}", conn_id, e);
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("WebSocket receive error on {}: {}", conn_id, e);
                break;
            }
        }
    }

    state.connections.remove(&conn_id).await;
    drop(tx);
    send_task.abort();
    log::info!("WebSocket disconnected: {}", conn_id);
}
