//! Download/export service: copy a server-held video to a destination
//! folder and keep audit metadata on the recording.

use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::VideoRecording;
use crate::error::ApiError;
use crate::state::AppState;
use crate::util::file_extension;

/// Outcome of an export copy.
#[derive(Clone, Debug)]
pub struct DownloadOutcome {
  pub recording: VideoRecording,
  pub destination_path: String,
}

/// Verify that a download can proceed: the session belongs to the caller,
/// a recording exists, and its source file is still on disk. Each failure
/// is distinguishable: session lookup and recording lookup raise NotFound
/// with their own messages, a vanished source file raises Storage.
#[instrument(level = "info", skip(state), fields(%session_id, %user_id))]
pub async fn prepare_download(
  state: &AppState,
  session_id: &str,
  user_id: &str,
) -> Result<VideoRecording, ApiError> {
  state.get_owned_session(session_id, user_id).await?;
  let recording = state
    .recording_for_session(session_id)
    .await
    .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;

  let exists = tokio::fs::try_exists(&recording.video_file_path).await.unwrap_or(false);
  if !exists {
    return Err(ApiError::Storage("video source file is missing on the server".into()));
  }
  Ok(recording)
}

/// Copy the recording's source file to `destination_folder` (created if
/// absent) or the configured default download directory. The copy name is
/// derived from the session code and a timestamp, so repeated exports never
/// collide. On success the recording's `download_path` and
/// `last_downloaded_at` are updated.
#[instrument(level = "info", skip(state), fields(%recording_id))]
pub async fn execute_download(
  state: &AppState,
  recording_id: &str,
  destination_folder: Option<&str>,
) -> Result<DownloadOutcome, ApiError> {
  let recording = state
    .get_recording(recording_id)
    .await
    .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;

  let session_code = {
    let sessions = state.sessions.read().await;
    sessions
      .get(&recording.session_id)
      .map(|s| s.session_code.clone())
      .unwrap_or_else(|| recording.session_id.chars().take(8).collect())
  };

  let folder = destination_folder.unwrap_or(&state.storage.download_dir);
  tokio::fs::create_dir_all(folder).await?;

  let file_name = format!(
    "assessment_{}_{}.{}",
    session_code,
    Utc::now().format("%Y%m%d%H%M%S"),
    file_extension(&recording.video_file_path),
  );
  let destination = std::path::Path::new(folder).join(file_name);
  let destination_path = destination.to_string_lossy().into_owned();

  tokio::fs::copy(&recording.video_file_path, &destination)
    .await
    .map_err(|e| match e.kind() {
      std::io::ErrorKind::NotFound => {
        ApiError::Storage("video source file is missing on the server".into())
      }
      _ => ApiError::Storage(format!("failed to copy video: {}", e)),
    })?;

  let recording = state.record_download(recording_id, &destination_path).await?;
  info!(target: "pipeline", %recording_id, destination = %destination_path, "Video exported");
  Ok(DownloadOutcome { recording, destination_path })
}
