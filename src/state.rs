//! Application state: in-memory stores for assessment data, sessions,
//! recordings and analysis results, plus the analyzer handles.
//!
//! This module owns:
//!   - the assessment bank (types + questions, from TOML or built-in seeds)
//!   - session / response / recording / analysis stores
//!   - every status transition of the video pipeline
//!
//! Store invariant: an analysis row exists for a recording iff that
//! recording's `processing_status` is `Completed`. All writes that touch
//! both stores hold both write locks, so readers never observe a
//! half-updated pair. Lock order is always recordings before analyses.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::analyzer::{Analyzer, RemoteAnalyzer};
use crate::config::{load_config_from_env, BackendConfig, StorageConfig};
use crate::domain::{
    AssessmentResponse, AssessmentSession, AssessmentType, ProcessingStatus, Question,
    SessionStatus, VideoAnalysis, VideoAnalysisData, VideoRecording,
};
use crate::error::ApiError;
use crate::seeds::{seed_assessment_types, seed_questions};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn new_session_code() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Read-side join of everything known about one session. Absent recording or
/// analysis is represented explicitly, never as an error.
#[derive(Clone, Debug, Serialize)]
pub struct ComprehensiveResults {
    pub session: AssessmentSession,
    pub assessment_type: Option<AssessmentType>,
    pub responses: Vec<AssessmentResponse>,
    pub video_recording: Option<VideoRecording>,
    pub video_analysis: Option<VideoAnalysis>,
}

/// What a cascading session deletion removed.
#[derive(Clone, Debug, Serialize)]
pub struct DeletionSummary {
    pub session_id: String,
    pub responses_deleted: usize,
    pub recordings_deleted: usize,
    pub analyses_deleted: usize,
    pub video_file_removed: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub types: Arc<RwLock<HashMap<String, AssessmentType>>>,
    pub questions: Arc<RwLock<HashMap<String, Question>>>,
    pub sessions: Arc<RwLock<HashMap<String, AssessmentSession>>>,
    /// Responses keyed by session id, in submission order.
    pub responses: Arc<RwLock<HashMap<String, Vec<AssessmentResponse>>>>,
    pub recordings: Arc<RwLock<HashMap<String, VideoRecording>>>,
    /// Analysis rows keyed by recording id (1:1).
    pub analyses: Arc<RwLock<HashMap<String, VideoAnalysis>>>,
    pub analyzer: Arc<Analyzer>,
    /// Remote face detector for the live capture loop, when configured.
    pub face_detector: Option<RemoteAnalyzer>,
    pub storage: StorageConfig,
}

impl AppState {
    /// Build state from env: load config, seed the assessment bank, init
    /// analyzer clients.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env().unwrap_or_default();
        let analyzer = Analyzer::from_env(cfg.analyzer.seed);
        Self::with_config(cfg, analyzer)
    }

    /// State with explicit config and analyzer. Tests use this with a seeded
    /// simulated analyzer.
    pub fn with_config(cfg: BackendConfig, analyzer: Analyzer) -> Self {
        let mut type_map = HashMap::<String, AssessmentType>::new();
        let mut question_map = HashMap::<String, Question>::new();

        // Insert config-bank assessments (if any) first.
        for ac in &cfg.assessments {
            let type_id = ac.id.clone().unwrap_or_else(new_id);
            type_map.insert(
                type_id.clone(),
                AssessmentType {
                    id: type_id.clone(),
                    name: ac.name.clone(),
                    category: ac.category.clone(),
                    description: ac.description.clone(),
                    duration_minutes: ac.duration_minutes,
                    questions_count: ac.questions.len() as u32,
                    is_active: true,
                    created_at: Utc::now(),
                },
            );
            for (i, qc) in ac.questions.iter().enumerate() {
                let qid = qc.id.clone().unwrap_or_else(new_id);
                question_map.insert(
                    qid.clone(),
                    Question {
                        id: qid,
                        assessment_type_id: type_id.clone(),
                        question_text: qc.question_text.clone(),
                        kind: qc.kind.clone(),
                        options: qc.options.clone(),
                        correct_answer: qc.correct_answer.clone(),
                        points: qc.points,
                        order_index: qc.order_index.unwrap_or(i as u32 + 1),
                        is_active: true,
                    },
                );
            }
        }

        // Always insert built-in seeds, but don't overwrite existing ids.
        for t in seed_assessment_types() {
            type_map.entry(t.id.clone()).or_insert(t);
        }
        for q in seed_questions() {
            question_map.entry(q.id.clone()).or_insert(q);
        }

        // Inventory summary by category.
        let mut count_by_category: HashMap<String, usize> = HashMap::new();
        for t in type_map.values() {
            *count_by_category.entry(t.category.clone()).or_insert(0) += 1;
        }
        for (category, count) in count_by_category {
            info!(target: "assessment", %category, count, "Startup assessment inventory");
        }

        Self {
            types: Arc::new(RwLock::new(type_map)),
            questions: Arc::new(RwLock::new(question_map)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            responses: Arc::new(RwLock::new(HashMap::new())),
            recordings: Arc::new(RwLock::new(HashMap::new())),
            analyses: Arc::new(RwLock::new(HashMap::new())),
            analyzer: Arc::new(analyzer),
            face_detector: RemoteAnalyzer::from_env(),
            storage: cfg.storage,
        }
    }

    // --- Assessment bank reads ---

    pub async fn list_assessment_types(&self) -> Vec<AssessmentType> {
        let types = self.types.read().await;
        let mut out: Vec<AssessmentType> =
            types.values().filter(|t| t.is_active).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub async fn get_assessment_type(&self, id: &str) -> Option<AssessmentType> {
        self.types.read().await.get(id).cloned()
    }

    /// Active questions of an assessment type, by order_index.
    pub async fn questions_for(&self, assessment_type_id: &str) -> Vec<Question> {
        let questions = self.questions.read().await;
        let mut out: Vec<Question> = questions
            .values()
            .filter(|q| q.assessment_type_id == assessment_type_id && q.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|q| q.order_index);
        out
    }

    // --- Session lifecycle ---

    /// Create a fresh in-progress session for a user.
    #[instrument(level = "info", skip(self), fields(%user_id, %assessment_type_id))]
    pub async fn start_session(
        &self,
        user_id: &str,
        assessment_type_id: &str,
    ) -> Result<AssessmentSession, ApiError> {
        let exists = {
            let types = self.types.read().await;
            types.get(assessment_type_id).map(|t| t.is_active).unwrap_or(false)
        };
        if !exists {
            return Err(ApiError::NotFound("assessment type not found".into()));
        }

        let session = AssessmentSession {
            id: new_id(),
            session_code: new_session_code(),
            user_id: user_id.to_string(),
            assessment_type_id: assessment_type_id.to_string(),
            status: SessionStatus::InProgress,
            total_score: 0.0,
            max_score: 0.0,
            percentage: 0.0,
            time_taken_seconds: 0,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        info!(target: "assessment", session_id = %session.id, code = %session.session_code, "Session started");
        Ok(session)
    }

    /// The single ownership gate: every session-scoped operation resolves the
    /// session through here. A session owned by someone else is
    /// indistinguishable from a missing one.
    pub async fn get_owned_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<AssessmentSession, ApiError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("assessment session not found".into()))
    }

    /// All of a user's sessions, newest first.
    pub async fn user_sessions(&self, user_id: &str) -> Vec<AssessmentSession> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<AssessmentSession> =
            sessions.values().filter(|s| s.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        out
    }

    pub async fn responses_for(&self, session_id: &str) -> Vec<AssessmentResponse> {
        self.responses.read().await.get(session_id).cloned().unwrap_or_default()
    }

    // --- Recording registrar ---

    /// Record metadata for an uploaded video. The physical write already
    /// happened at the boundary; this only registers the resulting path.
    #[instrument(level = "info", skip(self, recording), fields(recording_id = %recording.id, session_id = %recording.session_id))]
    pub async fn insert_recording(&self, recording: VideoRecording) {
        self.recordings.write().await.insert(recording.id.clone(), recording);
    }

    pub async fn get_recording(&self, recording_id: &str) -> Option<VideoRecording> {
        self.recordings.read().await.get(recording_id).cloned()
    }

    /// The business model assumes one recording per session; when the store
    /// holds several, the newest wins.
    pub async fn recording_for_session(&self, session_id: &str) -> Option<VideoRecording> {
        let recordings = self.recordings.read().await;
        recordings
            .values()
            .filter(|r| r.session_id == session_id)
            .max_by_key(|r| r.created_at)
            .cloned()
    }

    // --- Pipeline status transitions ---

    /// Exclusivity guard for dispatch: only `pending` or `failed` may move to
    /// `processing`. A second dispatch while processing, or after completion,
    /// is a conflict.
    #[instrument(level = "info", skip(self), fields(%recording_id))]
    pub async fn mark_processing(&self, recording_id: &str) -> Result<VideoRecording, ApiError> {
        let mut recordings = self.recordings.write().await;
        let rec = recordings
            .get_mut(recording_id)
            .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;
        if !rec.processing_status.dispatchable() {
            return Err(ApiError::Conflict(format!(
                "recording is already {:?}",
                rec.processing_status
            )));
        }
        rec.processing_status = ProcessingStatus::Processing;
        rec.error_message = None;
        Ok(rec.clone())
    }

    /// Persist a successful analysis: insert the row and flip the recording
    /// to `completed` in one step, both write locks held.
    #[instrument(level = "info", skip(self, data), fields(%recording_id))]
    pub async fn store_analysis(
        &self,
        recording_id: &str,
        data: VideoAnalysisData,
    ) -> Result<VideoAnalysis, ApiError> {
        let mut recordings = self.recordings.write().await;
        let mut analyses = self.analyses.write().await;

        let rec = recordings
            .get_mut(recording_id)
            .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;

        let analysis = VideoAnalysis {
            id: new_id(),
            session_id: rec.session_id.clone(),
            recording_id: recording_id.to_string(),
            data,
            processed_at: Utc::now(),
        };
        analyses.insert(recording_id.to_string(), analysis.clone());
        rec.processing_status = ProcessingStatus::Completed;
        rec.error_message = None;
        Ok(analysis)
    }

    /// Record an analysis failure. No result row is created; the error text
    /// is only observable by polling the recording.
    #[instrument(level = "info", skip(self, error), fields(%recording_id))]
    pub async fn fail_recording(&self, recording_id: &str, error: &str) {
        let mut recordings = self.recordings.write().await;
        if let Some(rec) = recordings.get_mut(recording_id) {
            rec.processing_status = ProcessingStatus::Failed;
            rec.error_message = Some(error.to_string());
        } else {
            warn!(target: "pipeline", %recording_id, "Recording vanished before failure could be recorded");
        }
    }

    pub async fn get_analysis(&self, recording_id: &str) -> Option<VideoAnalysis> {
        self.analyses.read().await.get(recording_id).cloned()
    }

    /// Download bookkeeping after a successful export copy.
    pub async fn record_download(
        &self,
        recording_id: &str,
        destination: &str,
    ) -> Result<VideoRecording, ApiError> {
        let mut recordings = self.recordings.write().await;
        let rec = recordings
            .get_mut(recording_id)
            .ok_or_else(|| ApiError::NotFound("video recording not found".into()))?;
        rec.download_path = Some(destination.to_string());
        rec.last_downloaded_at = Some(Utc::now());
        Ok(rec.clone())
    }

    // --- Aggregation and deletion ---

    /// Join session, responses, recording and analysis into one payload.
    /// Missing recording/analysis are explicit `None`s, never errors.
    #[instrument(level = "info", skip(self), fields(%session_id, %user_id))]
    pub async fn comprehensive_results(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<ComprehensiveResults, ApiError> {
        let session = self.get_owned_session(session_id, user_id).await?;
        let assessment_type = self.get_assessment_type(&session.assessment_type_id).await;
        let responses = self.responses_for(session_id).await;
        let video_recording = self.recording_for_session(session_id).await;
        let video_analysis = match &video_recording {
            Some(rec) => self.get_analysis(&rec.id).await,
            None => None,
        };
        Ok(ComprehensiveResults {
            session,
            assessment_type,
            responses,
            video_recording,
            video_analysis,
        })
    }

    /// Cascade-delete a session: responses, recordings and analysis rows go
    /// with it. Physical file removal is best-effort; a failed delete is
    /// logged and swallowed.
    #[instrument(level = "info", skip(self), fields(%session_id, %user_id))]
    pub async fn delete_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<DeletionSummary, ApiError> {
        self.get_owned_session(session_id, user_id).await?;

        self.sessions.write().await.remove(session_id);
        let responses_deleted = self
            .responses
            .write()
            .await
            .remove(session_id)
            .map(|v| v.len())
            .unwrap_or(0);

        let removed: Vec<VideoRecording> = {
            let mut recordings = self.recordings.write().await;
            let ids: Vec<String> = recordings
                .values()
                .filter(|r| r.session_id == session_id)
                .map(|r| r.id.clone())
                .collect();
            ids.iter().filter_map(|id| recordings.remove(id)).collect()
        };
        let analyses_deleted = {
            let mut analyses = self.analyses.write().await;
            removed.iter().filter(|r| analyses.remove(&r.id).is_some()).count()
        };

        let mut video_file_removed = false;
        for rec in &removed {
            match tokio::fs::remove_file(&rec.video_file_path).await {
                Ok(()) => video_file_removed = true,
                Err(e) => {
                    warn!(target: "pipeline", path = %rec.video_file_path, error = %e, "Could not remove video file during session deletion");
                }
            }
        }

        info!(target: "assessment", %session_id, responses_deleted, recordings = removed.len(), "Session deleted");
        Ok(DeletionSummary {
            session_id: session_id.to_string(),
            responses_deleted,
            recordings_deleted: removed.len(),
            analyses_deleted,
            video_file_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessingStatus;
    use std::io::Write;

    fn test_state() -> AppState {
        AppState::with_config(BackendConfig::default(), Analyzer::seeded(1))
    }

    fn recording_fixture(session_id: &str, path: &str) -> VideoRecording {
        VideoRecording {
            id: new_id(),
            session_id: session_id.to_string(),
            video_file_path: path.to_string(),
            video_duration_seconds: 30,
            file_size_bytes: 1024,
            recording_started_at: Utc::now(),
            recording_ended_at: Utc::now(),
            processing_status: ProcessingStatus::Pending,
            download_path: None,
            last_downloaded_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn seeds_are_loaded_and_ordered() {
        let state = test_state();
        let types = state.list_assessment_types().await;
        assert_eq!(types.len(), 3);
        let questions = state.questions_for("at-psychology").await;
        assert_eq!(questions.len(), 5);
        assert!(questions.windows(2).all(|w| w[0].order_index <= w[1].order_index));
    }

    #[tokio::test]
    async fn ownership_gate_hides_foreign_sessions() {
        let state = test_state();
        let session = state.start_session("alice", "at-career").await.unwrap();
        assert!(state.get_owned_session(&session.id, "alice").await.is_ok());
        let err = state.get_owned_session(&session.id, "mallory").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_session_rejects_unknown_type() {
        let state = test_state();
        let err = state.start_session("alice", "no-such-type").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn dispatch_guard_blocks_double_processing() {
        let state = test_state();
        let session = state.start_session("alice", "at-skills").await.unwrap();
        let rec = recording_fixture(&session.id, "/nonexistent/clip.webm");
        let rec_id = rec.id.clone();
        state.insert_recording(rec).await;

        let first = state.mark_processing(&rec_id).await.unwrap();
        assert_eq!(first.processing_status, ProcessingStatus::Processing);
        let second = state.mark_processing(&rec_id).await.unwrap_err();
        assert!(matches!(second, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn analysis_row_exists_iff_completed() {
        let state = test_state();
        let session = state.start_session("alice", "at-skills").await.unwrap();
        let rec = recording_fixture(&session.id, "/nonexistent/clip.webm");
        let rec_id = rec.id.clone();
        state.insert_recording(rec).await;
        state.mark_processing(&rec_id).await.unwrap();

        // Processing: no row yet.
        assert!(state.get_analysis(&rec_id).await.is_none());

        let data = crate::analyzer::SimulatedAnalyzer::seeded(2).analyze();
        state.store_analysis(&rec_id, data).await.unwrap();

        let rec = state.get_recording(&rec_id).await.unwrap();
        assert_eq!(rec.processing_status, ProcessingStatus::Completed);
        assert!(state.get_analysis(&rec_id).await.is_some());
    }

    #[tokio::test]
    async fn failed_recording_has_message_and_no_row() {
        let state = test_state();
        let session = state.start_session("alice", "at-skills").await.unwrap();
        let rec = recording_fixture(&session.id, "/nonexistent/clip.webm");
        let rec_id = rec.id.clone();
        state.insert_recording(rec).await;
        state.mark_processing(&rec_id).await.unwrap();
        state.fail_recording(&rec_id, "decoder exploded").await;

        let rec = state.get_recording(&rec_id).await.unwrap();
        assert_eq!(rec.processing_status, ProcessingStatus::Failed);
        assert_eq!(rec.error_message.as_deref(), Some("decoder exploded"));
        assert!(state.get_analysis(&rec_id).await.is_none());

        // Failed is re-dispatchable.
        assert!(state.mark_processing(&rec_id).await.is_ok());
    }

    #[tokio::test]
    async fn aggregator_tolerates_total_absence() {
        let state = test_state();
        let session = state.start_session("alice", "at-psychology").await.unwrap();
        let results = state.comprehensive_results(&session.id, "alice").await.unwrap();
        assert!(results.video_recording.is_none());
        assert!(results.video_analysis.is_none());
        assert!(results.responses.is_empty());
        assert!(results.assessment_type.is_some());
    }

    #[tokio::test]
    async fn delete_session_cascades_and_removes_file() {
        let state = test_state();
        let session = state.start_session("alice", "at-career").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let video_path = dir.path().join("clip.webm");
        let mut f = std::fs::File::create(&video_path).unwrap();
        f.write_all(b"fake video bytes").unwrap();

        let rec = recording_fixture(&session.id, video_path.to_str().unwrap());
        let rec_id = rec.id.clone();
        state.insert_recording(rec).await;
        state.mark_processing(&rec_id).await.unwrap();
        let data = crate::analyzer::SimulatedAnalyzer::seeded(3).analyze();
        state.store_analysis(&rec_id, data).await.unwrap();

        let summary = state.delete_session(&session.id, "alice").await.unwrap();
        assert_eq!(summary.recordings_deleted, 1);
        assert_eq!(summary.analyses_deleted, 1);
        assert!(summary.video_file_removed);
        assert!(!video_path.exists());
        assert!(state.get_recording(&rec_id).await.is_none());
        assert!(state.get_analysis(&rec_id).await.is_none());
        assert!(state.get_owned_session(&session.id, "alice").await.is_err());
    }

    #[tokio::test]
    async fn delete_session_swallows_missing_file() {
        let state = test_state();
        let session = state.start_session("alice", "at-career").await.unwrap();
        let rec = recording_fixture(&session.id, "/definitely/not/here.webm");
        state.insert_recording(rec).await;

        let summary = state.delete_session(&session.id, "alice").await.unwrap();
        assert_eq!(summary.recordings_deleted, 1);
        assert!(!summary.video_file_removed);
    }
}
