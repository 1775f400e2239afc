//! Trivia Quiz · Open Trivia DB quiz backend
//!
//! - Axum HTTP + WebSocket API driving an intro → question → answer → outro quiz
//! - Questions and session tokens from the Open Trivia Database
//! - Static quiz page fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   TRIVIA_BASE_URL   : provider base URL (default "https://opentdb.com")
//!   QUIZ_CONFIG_PATH  : path to TOML config (defaults, retry policy, messages)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod protocol;
mod quiz;
mod retry;
mod routes;
mod state;
mod telemetry;
mod trivia;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (config, provider client factory, sessions).
  let state = Arc::new(AppState::new()?);
  state.spawn_session_sweeper();

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "trivia_quiz", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "trivia_quiz", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "trivia_quiz", "Shutdown signal received");
}
