//! Domain models: assessment types, questions, sessions, responses,
//! video recordings, and analysis output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a question expects to be answered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  MultipleChoice,
  Likert,
  Text,
}
impl Default for QuestionKind {
  fn default() -> Self { QuestionKind::MultipleChoice }
}

/// Lifecycle of one user's attempt at an assessment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  InProgress,
  Completed,
  Abandoned,
}

/// Background analysis state of an uploaded recording.
///
/// Valid transitions: pending -> processing -> {completed | failed},
/// plus failed -> processing on an explicit re-dispatch.
/// `completed` is terminal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl ProcessingStatus {
  /// Whether a dispatch may move this status into `Processing`.
  pub fn dispatchable(self) -> bool {
    matches!(self, ProcessingStatus::Pending | ProcessingStatus::Failed)
  }
}

/// A named quiz template with a fixed question set and metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssessmentType {
  pub id: String,
  pub name: String,
  pub category: String,
  #[serde(default)] pub description: String,
  pub duration_minutes: u32,
  pub questions_count: u32,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

/// One question belonging to an assessment type. Append-only once any
/// response references it; no update path exists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  pub assessment_type_id: String,
  pub question_text: String,
  pub kind: QuestionKind,
  pub options: Vec<String>,
  /// Exact expected answer. None for questions that are not auto-scored.
  pub correct_answer: Option<String>,
  pub points: f64,
  pub order_index: u32,
  pub is_active: bool,
}

/// One user's attempt at an assessment type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssessmentSession {
  pub id: String,
  pub session_code: String,
  pub user_id: String,
  pub assessment_type_id: String,
  pub status: SessionStatus,
  pub total_score: f64,
  pub max_score: f64,
  pub percentage: f64,
  pub time_taken_seconds: i64,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// A single submitted answer, scored at submission time and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssessmentResponse {
  pub id: String,
  pub session_id: String,
  pub question_id: String,
  pub user_answer: String,
  pub is_correct: bool,
  pub points_earned: f64,
  pub response_time_seconds: u32,
  pub created_at: DateTime<Utc>,
}

/// Metadata for one uploaded video tied to a session. The physical bytes
/// live at `video_file_path`; this record only tracks them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoRecording {
  pub id: String,
  pub session_id: String,
  pub video_file_path: String,
  pub video_duration_seconds: i64,
  pub file_size_bytes: u64,
  pub recording_started_at: DateTime<Utc>,
  pub recording_ended_at: DateTime<Utc>,
  pub processing_status: ProcessingStatus,
  pub download_path: Option<String>,
  pub last_downloaded_at: Option<DateTime<Utc>>,
  /// Set only when `processing_status` is `Failed`.
  pub error_message: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Best-effort output of the opaque face analyzer for one frame. On
/// detection failure the caller substitutes a synthesized observation with
/// this exact shape instead of propagating an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceObservation {
  pub emotions: HashMap<String, f64>,
  pub dominant_emotion: String,
  pub age: Option<u32>,
  pub gender: Option<String>,
}

/// Big-five style trait estimates, each in [0, 1].
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PersonalityTraits {
  pub openness: f64,
  pub conscientiousness: f64,
  pub extraversion: f64,
  pub agreeableness: f64,
  pub neuroticism: f64,
}

/// Gaze/posture observations. Categorical fields carry a small fixed
/// vocabulary: blink_rate in {low, normal, slightly_high}, head_movement in
/// {minimal, moderate, active}.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AttentionMetrics {
  pub gaze_stability: f64,
  pub blink_rate: String,
  pub head_movement: String,
  pub posture_consistency: f64,
}

/// Concentration/workload observations. mental_workload in
/// {low, moderate, high}, decision_making_speed in
/// {deliberate, balanced, quick}.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CognitiveMetrics {
  pub concentration_level: f64,
  pub mental_workload: String,
  pub problem_solving_efficiency: f64,
  pub decision_making_speed: String,
}

/// Career suggestions derived from behavioral patterns.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CareerPredictions {
  pub recommended_careers: Vec<String>,
  pub compatibility_scores: Vec<f64>,
  pub key_strengths: Vec<String>,
  pub development_areas: Vec<String>,
}

/// Structured output of the opaque video analyzer. The emotion map sums to 1
/// (within floating tolerance) and `dominant_emotion` is its argmax; every
/// scalar score is in [0, 1].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoAnalysisData {
  pub emotional_analysis: HashMap<String, f64>,
  pub dominant_emotion: String,
  pub mood_score: f64,
  pub engagement_level: f64,
  pub focus_score: f64,
  pub confidence_level: f64,
  pub motivation_level: f64,
  pub personality_insights: PersonalityTraits,
  pub attention_metrics: AttentionMetrics,
  pub cognitive_analysis: CognitiveMetrics,
  /// One of: analytical, creative, practical, theoretical.
  pub problem_solving_style: String,
  pub career_predictions: CareerPredictions,
  pub overall_score: f64,
  pub analysis_remarks: String,
}

/// Persisted analysis row, one-to-one with its recording. Created exactly
/// once per successful run and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoAnalysis {
  pub id: String,
  pub session_id: String,
  pub recording_id: String,
  #[serde(flatten)]
  pub data: VideoAnalysisData,
  pub processed_at: DateTime<Utc>,
}
