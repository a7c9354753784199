//! Video pipeline: recording registration and background analysis dispatch.
//!
//! Dispatch marks the recording `processing` synchronously, then hands the
//! actual analysis to a fire-and-forget task. The dispatching request never
//! waits for the analyzer; callers observe progress by polling the
//! recording's status. Readers must treat any status they see as
//! potentially stale and re-check.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{ProcessingStatus, VideoRecording};
use crate::error::ApiError;
use crate::state::AppState;

/// Register metadata for an uploaded video. The byte stream was already
/// persisted by the boundary; this only records the resulting path. No
/// validation of the file contents happens here.
///
/// When `duration_seconds` is not supplied it is derived from the recording
/// timestamps, floored at zero.
#[instrument(level = "info", skip(state), fields(%session_id, %file_path, byte_size))]
pub async fn register_recording(
  state: &AppState,
  session_id: &str,
  file_path: &str,
  byte_size: u64,
  duration_seconds: Option<i64>,
  recording_started_at: DateTime<Utc>,
  recording_ended_at: DateTime<Utc>,
) -> VideoRecording {
  let duration = duration_seconds.unwrap_or_else(|| {
    (recording_ended_at - recording_started_at).num_seconds().max(0)
  });

  let recording = VideoRecording {
    id: Uuid::new_v4().to_string(),
    session_id: session_id.to_string(),
    video_file_path: file_path.to_string(),
    video_duration_seconds: duration,
    file_size_bytes: byte_size,
    recording_started_at,
    recording_ended_at,
    processing_status: ProcessingStatus::Pending,
    download_path: None,
    last_downloaded_at: None,
    error_message: None,
    created_at: Utc::now(),
  };
  state.insert_recording(recording.clone()).await;
  info!(target: "pipeline", recording_id = %recording.id, duration, "Recording registered");
  recording
}

/// Start a background analysis for a recording.
///
/// The status write is synchronous: when this returns Ok, the recording is
/// `processing`. The spawned job then either stores the analysis row and
/// flips the status to `completed` in one atomic step, or records the
/// analyzer's error text and flips to `failed`. Analyzer errors are absorbed
/// here and never reach the dispatching caller.
///
/// Returns the updated recording plus the job handle; production callers
/// drop the handle (the task keeps running), tests await it.
#[instrument(level = "info", skip(state), fields(%recording_id))]
pub async fn dispatch_analysis(
  state: &AppState,
  recording_id: &str,
) -> Result<(VideoRecording, JoinHandle<()>), ApiError> {
  let recording = state.mark_processing(recording_id).await?;
  info!(target: "pipeline", %recording_id, "Analysis dispatched");

  let task_state = state.clone();
  let id = recording_id.to_string();
  let video_path = recording.video_file_path.clone();
  let handle = tokio::spawn(async move {
    match task_state.analyzer.analyze_video(&video_path).await {
      Ok(data) => match task_state.store_analysis(&id, data).await {
        Ok(analysis) => {
          info!(target: "pipeline", recording_id = %id, analysis_id = %analysis.id, "Analysis completed");
        }
        Err(e) => {
          // Recording was deleted while the job ran; nothing left to update.
          warn!(target: "pipeline", recording_id = %id, error = %e, "Dropping analysis result");
        }
      },
      Err(e) => {
        error!(target: "pipeline", recording_id = %id, error = %e, "Analysis failed");
        task_state.fail_recording(&id, &e).await;
      }
    }
  });

  Ok((recording, handle))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::{Analyzer, RemoteAnalyzer};
  use crate::config::BackendConfig;
  use std::io::Write;

  fn test_state() -> AppState {
    AppState::with_config(BackendConfig::default(), Analyzer::seeded(1))
  }

  fn write_fixture_video(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("clip.webm");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(b"fake video bytes").unwrap();
    path.to_string_lossy().into_owned()
  }

  #[tokio::test]
  async fn registrar_derives_duration_from_timestamps() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let start = Utc::now();
    let end = start + chrono::Duration::seconds(42);

    let rec =
      register_recording(&state, &session.id, "/tmp/a.webm", 100, None, start, end).await;
    assert_eq!(rec.video_duration_seconds, 42);
    assert_eq!(rec.processing_status, ProcessingStatus::Pending);

    // Reversed timestamps floor at zero instead of going negative.
    let rec = register_recording(&state, &session.id, "/tmp/b.webm", 100, None, end, start).await;
    assert_eq!(rec.video_duration_seconds, 0);
  }

  #[tokio::test]
  async fn dispatch_is_observable_before_the_job_finishes() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture_video(&dir);
    let rec = register_recording(&state, &session.id, &path, 16, Some(10), Utc::now(), Utc::now()).await;

    let (updated, handle) = dispatch_analysis(&state, &rec.id).await.unwrap();
    // Synchronous transition: visible before the spawned job ran (the
    // current-thread test runtime hasn't yielded to it yet).
    assert_eq!(updated.processing_status, ProcessingStatus::Processing);
    assert_eq!(
      state.get_recording(&rec.id).await.unwrap().processing_status,
      ProcessingStatus::Processing
    );
    assert!(state.get_analysis(&rec.id).await.is_none());

    handle.await.unwrap();
    let done = state.get_recording(&rec.id).await.unwrap();
    assert_eq!(done.processing_status, ProcessingStatus::Completed);
    let analysis = state.get_analysis(&rec.id).await.unwrap();
    let sum: f64 = analysis.data.emotional_analysis.values().sum();
    assert!((sum - 1.0).abs() < 1e-2);
  }

  #[tokio::test]
  async fn failed_analyzer_absorbs_error_into_status() {
    // A remote analyzer pointed at a file that does not exist fails before
    // any network traffic happens.
    let state = AppState::with_config(
      BackendConfig::default(),
      Analyzer::Remote(RemoteAnalyzer::with_base_url("http://127.0.0.1:9")),
    );
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let rec = register_recording(
      &state,
      &session.id,
      "/no/such/video.webm",
      0,
      Some(1),
      Utc::now(),
      Utc::now(),
    )
    .await;

    let (_, handle) = dispatch_analysis(&state, &rec.id).await.unwrap();
    handle.await.unwrap();

    let failed = state.get_recording(&rec.id).await.unwrap();
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert!(!failed.error_message.clone().unwrap_or_default().is_empty());
    assert!(state.get_analysis(&rec.id).await.is_none());
  }

  #[tokio::test]
  async fn completed_recording_cannot_be_redispatched() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture_video(&dir);
    let rec = register_recording(&state, &session.id, &path, 16, Some(10), Utc::now(), Utc::now()).await;

    let (_, handle) = dispatch_analysis(&state, &rec.id).await.unwrap();
    handle.await.unwrap();

    let err = dispatch_analysis(&state, &rec.id).await.unwrap_err();
    assert!(matches!(err, crate::error::ApiError::Conflict(_)));
  }
}
