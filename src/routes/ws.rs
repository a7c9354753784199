//! WebSocket upgrade + live capture loop. Each connection owns its own
//! capture context; frames sent on one socket are never visible on another.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::frames::CaptureContext;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
  info!(target: "aptiview_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "aptiview_backend", "WebSocket connected");
  let mut capture: Option<CaptureContext> = None;

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "aptiview_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut capture).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
            .to_string()
        });
        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "aptiview_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  // Dropping the socket drops the capture context with it; nothing persists.
  info!(target: "aptiview_backend", "WebSocket disconnected");
}

async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  capture: &mut Option<CaptureContext>,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartCapture { session_id } => {
      let ctx = CaptureContext::new(session_id.clone());
      let started_at = ctx.started_at;
      *capture = Some(ctx);
      info!(target: "pipeline", session_id = ?session_id, "WS capture started");
      ServerWsMessage::CaptureStarted { session_id, started_at }
    }

    ClientWsMessage::Frame { image } => match capture.as_mut() {
      Some(ctx) => {
        let entry = ctx.process_frame(state.face_detector.as_ref(), &image).await;
        ServerWsMessage::Frame(entry)
      }
      None => ServerWsMessage::Error { message: "capture not started".into() },
    },

    ClientWsMessage::LatestEmotion => match capture.as_ref() {
      Some(ctx) => match ctx.latest() {
        Some(entry) => ServerWsMessage::Frame(entry.clone()),
        None => ServerWsMessage::Error { message: "no frames captured yet".into() },
      },
      None => ServerWsMessage::Error { message: "capture not started".into() },
    },

    ClientWsMessage::EmotionStats => match capture.as_ref() {
      Some(ctx) => ServerWsMessage::Stats(ctx.stats()),
      None => ServerWsMessage::Error { message: "capture not started".into() },
    },

    ClientWsMessage::StopCapture => match capture.take() {
      Some(ctx) => {
        info!(target: "pipeline", frames = ctx.frame_count(), "WS capture stopped");
        ServerWsMessage::CaptureStopped(ctx.report())
      }
      None => ServerWsMessage::Error { message: "capture not started".into() },
    },
  }
}
