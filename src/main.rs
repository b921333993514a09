//! Adventure Academy · Learning Backend
//!
//! - Axum HTTP API for parents, children, practice sessions and progress
//! - Adaptive difficulty, encouragement and progress aggregation
//! - Optional OpenAI activity generation with deterministic template fallback
//! - Static SPA fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   OPENAI_API_KEY    : enables OpenAI activity generation if present
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : default "gpt-4o-mini"
//!   APP_CONFIG_PATH   : path to TOML config (prompts + engine tunables)
//!   JWT_SECRET        : bearer token signing secret
//!   CONTENT_SEED      : u64, makes template content reproducible
//!   STATIC_DIR        : default "./static"
//!   CORS_ORIGINS      : comma separated origins (any when unset)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod clock;
mod domain;
mod config;
mod error;
mod store;
mod difficulty;
mod encouragement;
mod fallback;
mod openai;
mod generator;
mod progress;
mod lifecycle;
mod auth;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (store, generator, auth keys, config).
  let state = Arc::new(AppState::from_env());
  let addr = SocketAddr::from(([0, 0, 0, 0], state.http.port));

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let listener = TcpListener::bind(addr).await?;
  info!(target: "adventure_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "adventure_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "adventure_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "adventure_backend", "Shutdown signal received");
}
