//! HTTP endpoint handlers. Thin wrappers that forward to the stores,
//! scoring engine, pipeline and download service. Each handler is
//! instrumented; the caller is identified by the `x-user-id` header.

use std::sync::Arc;

use axum::{
  extract::{Multipart, Path, Query, State},
  http::HeaderMap,
  response::IntoResponse,
  Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::analyzer::dominant_of;
use crate::download::{execute_download, prepare_download};
use crate::error::ApiError;
use crate::pipeline::{dispatch_analysis, register_recording};
use crate::protocol::*;
use crate::scoring::score_session;
use crate::state::AppState;
use crate::util::file_extension;

/// Identity boundary: requests without a usable `x-user-id` are rejected
/// before any store is touched.
fn caller_id(headers: &HeaderMap) -> Result<String, ApiError> {
  headers
    .get("x-user-id")
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .ok_or_else(|| ApiError::Validation("missing x-user-id header".into()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut {
    status: "healthy",
    service: "aptiview-backend",
    timestamp: Utc::now(),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.list_assessment_types().await)
}

#[instrument(level = "info", skip(state), fields(%type_id))]
pub async fn http_get_type(
  State(state): State<Arc<AppState>>,
  Path(type_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let t = state
    .get_assessment_type(&type_id)
    .await
    .filter(|t| t.is_active)
    .ok_or_else(|| ApiError::NotFound("assessment type not found".into()))?;
  Ok(Json(t))
}

#[instrument(level = "info", skip(state), fields(%type_id))]
pub async fn http_get_questions(
  State(state): State<Arc<AppState>>,
  Path(type_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  state
    .get_assessment_type(&type_id)
    .await
    .filter(|t| t.is_active)
    .ok_or_else(|| ApiError::NotFound("assessment type not found".into()))?;
  let questions: Vec<QuestionOut> =
    state.questions_for(&type_id).await.iter().map(QuestionOut::from).collect();
  Ok(Json(questions))
}

#[instrument(level = "info", skip(state, headers, body), fields(%body.assessment_type_id))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<StartSessionIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  let session = state.start_session(&user_id, &body.assessment_type_id).await?;
  Ok(Json(session))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_list_sessions(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  Ok(Json(state.user_sessions(&user_id).await))
}

#[instrument(level = "info", skip(state, headers, body), fields(%session_id, answers = body.responses.len()))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(session_id): Path<String>,
  Json(body): Json<SubmitIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  state.get_owned_session(&session_id, &user_id).await?;
  let summary = score_session(&state, &session_id, body.responses).await?;
  Ok(Json(summary))
}

/// Multipart video upload. Persists the bytes under the upload directory,
/// registers the recording, and (unless `process_automatically=false`)
/// fires off the background analysis.
#[instrument(level = "info", skip(state, headers, multipart), fields(%session_id, auto = q.process_automatically))]
pub async fn http_upload_video(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(session_id): Path<String>,
  Query(q): Query<UploadQuery>,
  mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  state.get_owned_session(&session_id, &user_id).await?;

  let mut video_bytes: Option<Vec<u8>> = None;
  let mut original_name = String::new();
  let mut started_at: Option<DateTime<Utc>> = None;
  let mut ended_at: Option<DateTime<Utc>> = None;
  let mut duration_seconds: Option<i64> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::Validation(format!("malformed multipart body: {}", e)))?
  {
    let name = field.name().unwrap_or_default().to_string();
    match name.as_str() {
      "video" => {
        original_name = field.file_name().unwrap_or("recording.webm").to_string();
        let bytes = field
          .bytes()
          .await
          .map_err(|e| ApiError::Validation(format!("failed to read video field: {}", e)))?;
        video_bytes = Some(bytes.to_vec());
      }
      "recording_started_at" => started_at = Some(parse_timestamp(&field_text(field).await?)?),
      "recording_ended_at" => ended_at = Some(parse_timestamp(&field_text(field).await?)?),
      "duration_seconds" => {
        let raw = field_text(field).await?;
        duration_seconds = Some(raw.trim().parse::<i64>().map_err(|_| {
          ApiError::Validation(format!("duration_seconds is not an integer: {}", raw))
        })?);
      }
      other => {
        warn!(target: "pipeline", field = %other, "Ignoring unknown upload field");
      }
    }
  }

  let bytes = match video_bytes {
    Some(b) if !b.is_empty() => b,
    _ => return Err(ApiError::Validation("video file is required".into())),
  };

  tokio::fs::create_dir_all(&state.storage.upload_dir).await?;
  let short_session: String = session_id.chars().take(8).collect();
  let file_name = format!(
    "{}_{}_{}.{}",
    user_id,
    short_session,
    Uuid::new_v4(),
    file_extension(&original_name),
  );
  let path = std::path::Path::new(&state.storage.upload_dir).join(&file_name);
  tokio::fs::write(&path, &bytes).await?;
  let byte_size = bytes.len() as u64;
  info!(target: "pipeline", %session_id, file = %file_name, byte_size, "Video stored");

  let now = Utc::now();
  let recording = register_recording(
    &state,
    &session_id,
    &path.to_string_lossy(),
    byte_size,
    duration_seconds,
    started_at.unwrap_or(now),
    ended_at.unwrap_or(now),
  )
  .await;

  let (recording, processing_started) = if q.process_automatically {
    match dispatch_analysis(&state, &recording.id).await {
      Ok((rec, _handle)) => (rec, true),
      Err(e) => {
        warn!(target: "pipeline", recording_id = %recording.id, error = %e, "Automatic dispatch declined");
        (recording, false)
      }
    }
  } else {
    (recording, false)
  };

  Ok(Json(json!({
    "success": true,
    "recording": recording,
    "processing_started": processing_started,
  })))
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
  field
    .text()
    .await
    .map_err(|e| ApiError::Validation(format!("failed to read form field: {}", e)))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
  DateTime::parse_from_rfc3339(raw.trim())
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| ApiError::Validation(format!("invalid RFC 3339 timestamp: {}", raw)))
}

/// Explicit (re-)dispatch of a recording's analysis.
#[instrument(level = "info", skip(state, headers), fields(%recording_id))]
pub async fn http_analyze_recording(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(recording_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  let recording = state
    .get_recording(&recording_id)
    .await
    .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;
  state.get_owned_session(&recording.session_id, &user_id).await?;

  let (recording, _handle) = dispatch_analysis(&state, &recording_id).await?;
  Ok(Json(json!({ "success": true, "recording": recording })))
}

/// Poll the analysis of a session's recording. Pending/processing/failed are
/// reported through the recording's status rather than as errors.
#[instrument(level = "info", skip(state, headers), fields(%session_id))]
pub async fn http_video_analysis(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  state.get_owned_session(&session_id, &user_id).await?;
  let recording = state
    .recording_for_session(&session_id)
    .await
    .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;
  let analysis = state.get_analysis(&recording.id).await;

  Ok(Json(json!({
    "processing_status": recording.processing_status,
    "error_message": recording.error_message,
    "analysis": analysis,
  })))
}

#[instrument(level = "info", skip(state, headers), fields(%session_id))]
pub async fn http_results(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  let results = state.comprehensive_results(&session_id, &user_id).await?;
  Ok(Json(results))
}

#[instrument(level = "info", skip(state, headers, body), fields(%session_id))]
pub async fn http_download(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(session_id): Path<String>,
  body: Option<Json<DownloadIn>>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  let Json(body) = body.unwrap_or_default();
  let recording = prepare_download(&state, &session_id, &user_id).await?;
  let outcome =
    execute_download(&state, &recording.id, body.destination_folder.as_deref()).await?;
  Ok(Json(json!({
    "success": true,
    "download_path": outcome.destination_path,
    "recording": outcome.recording,
  })))
}

#[instrument(level = "info", skip(state, headers), fields(%session_id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = caller_id(&headers)?;
  let summary = state.delete_session(&session_id, &user_id).await?;
  Ok(Json(summary))
}

/// Standalone text emotion analysis. Text must be 1 to 5000 characters.
#[instrument(level = "info", skip(state, body), fields(text_len = body.text.chars().count()))]
pub async fn http_text_analyze(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TextAnalyzeIn>,
) -> Result<impl IntoResponse, ApiError> {
  let len = body.text.chars().count();
  if len == 0 || len > 5000 {
    return Err(ApiError::Validation("text must be between 1 and 5000 characters".into()));
  }
  let emotions = state.analyzer.analyze_text(&body.text).await.map_err(ApiError::Analyzer)?;
  let dominant_emotion = dominant_of(&emotions);
  Ok(Json(json!({
    "emotions": emotions,
    "dominant_emotion": dominant_emotion,
    "analyzed_at": Utc::now(),
  })))
}
