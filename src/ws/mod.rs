pub mod handlers;
pub mod tasks;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;

use handlers::SessionContext;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Visitor id from a previous visit
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: returning visitor={}",
        params.token.is_some()
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Serialize and send; false once the socket is gone
async fn send_all<S>(sender: &mut S, messages: Vec<ServerMessage>) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    for msg in messages {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    return false;
                }
            }
            Err(e) => tracing::error!("Failed to serialize server message: {}", e),
        }
    }
    true
}

/// One page session per connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(mut presentation) = state.open_session(params.token.as_deref()).await else {
        tracing::error!("No ceremony loaded, closing connection");
        let error = ServerMessage::error("NO_CEREMONY", "No ceremony data is available");
        send_all(&mut sender, vec![error]).await;
        return;
    };

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        visitor_id: presentation.visitor_id().to_string(),
        years: state.years(),
        language: presentation.language(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    let intro = vec![welcome, handlers::ceremony_message(&presentation)];
    if !send_all(&mut sender, intro).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut ctx = SessionContext::new(state.clone(), events_tx);

    loop {
        tokio::select! {
            // Timers and remote lookups for this session
            Some(event) = events_rx.recv() => {
                let responses = handlers::handle_event(event, &mut presentation, &mut ctx);
                if !send_all(&mut sender, responses).await {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let responses = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut presentation, &mut ctx).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                vec![ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                )]
                            }
                        };
                        if !send_all(&mut sender, responses).await {
                            tracing::error!("Failed to send response");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    ctx.stop_curtain();
    tracing::info!(
        "Session closed for visitor {}",
        presentation.visitor_id()
    );
}
