//! WebSocket upgrade + message loop. Each connection drives its own quiz controller.
//! Every client message is parsed as JSON and answered with a single JSON message.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::quiz::QuizController;
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "trivia_quiz", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "trivia_quiz", "WebSocket connected");
  let ctl = state.new_controller();

  // Page-load sequence, then the initial view.
  let boot = ctl.bootstrap().await;
  let first = ServerWsMessage::View { outcome: Some(boot), view: ctl.view().await };
  if send(&mut socket, &first).await.is_err() {
    return;
  }

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "trivia_quiz", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &ctl).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };
        if send(&mut socket, &reply).await.is_err() {
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "trivia_quiz", "WebSocket disconnected");
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "trivia_quiz", error = %e, "WS send error");
    e
  })
}

#[instrument(level = "info", skip(ctl))]
async fn handle_client_ws(msg: ClientWsMessage, ctl: &Arc<QuizController>) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,
    other => match other.into_action() {
      None => ServerWsMessage::View { outcome: None, view: ctl.view().await },
      Some(Err(message)) => ServerWsMessage::Error { message },
      Some(Ok(action)) => {
        let outcome = ctl.dispatch(action).await;
        debug!(target: "quiz", ?outcome, "WS action processed");
        ServerWsMessage::View { outcome: Some(outcome), view: ctl.view().await }
      }
    },
  }
}
