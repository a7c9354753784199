//! AptiView · Assessment Platform Backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional remote emotion-analysis service (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                    : u16 (default 3000)
//!   ANALYZER_BASE_URL       : enables the remote analyzer if present
//!   ANALYZER_API_KEY        : bearer token for the remote analyzer
//!   ASSESSMENT_CONFIG_PATH  : path to TOML config (storage dirs + assessment bank)
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod seeds;
mod analyzer;
mod frames;
mod state;
mod scoring;
mod pipeline;
mod download;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (in-memory stores, analyzer clients, bank).
  let state = Arc::new(AppState::new());

  // Storage directories must exist before the first upload or download.
  tokio::fs::create_dir_all(&state.storage.upload_dir).await?;
  tokio::fs::create_dir_all(&state.storage.download_dir).await?;

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "aptiview_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
