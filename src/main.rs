//! Quizwise · quiz authoring, taking and grading backend
//!
//! - Axum HTTP API (auth, quizzes, results, generation, evaluation proxy, uploads)
//! - MongoDB persistence (in-memory fallback when MONGODB_URI is unset)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables (see `config` for the full list):
//!   PORT           : u16 (default 5000)
//!   MONGODB_URI    : document database connection string
//!   JWT_SECRET     : bearer token signing secret
//!   EVALUATOR_URL  : answer evaluation service
//!   OPENAI_API_KEY : enables question generation if present
//!   LOG_LEVEL      : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT     : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, warn};

use quizwise::config::Settings;
use quizwise::routes::build_router;
use quizwise::state::AppState;
use quizwise::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // .env is optional; real env vars win.
  let dotenv = dotenvy::dotenv();
  telemetry::init_tracing();
  if let Err(e) = dotenv {
    info!(target: "quizwise", reason = %e, "No .env loaded");
  }

  let settings = Settings::from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

  // Composition root: store, model client and evaluator are built here and shared.
  let state = Arc::new(AppState::from_settings(settings).await?);
  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizwise", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "quizwise", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "quizwise", "Shutdown signal received");
}
