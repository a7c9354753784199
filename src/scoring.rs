//! Scoring engine: turns submitted answers into per-question response rows
//! and aggregate session scores.
//!
//! Correctness is an exact, case-sensitive string match against the
//! question's `correct_answer`. That is intentionally strict for likert and
//! free-text questions as well; the matching rule is shared across all
//! question kinds.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AssessmentResponse, SessionStatus};
use crate::error::ApiError;
use crate::state::AppState;

/// One submitted answer, as received from the client.
#[derive(Clone, Debug, Deserialize)]
pub struct SubmittedAnswer {
  pub question_id: String,
  pub user_answer: String,
  #[serde(default)]
  pub response_time_seconds: u32,
}

/// Aggregate outcome of scoring a session.
#[derive(Clone, Debug, Serialize)]
pub struct ScoreSummary {
  pub session_id: String,
  pub total_score: f64,
  pub max_score: f64,
  pub percentage: f64,
  pub time_taken_seconds: i64,
  pub responses_saved: usize,
}

/// Score a batch of answers and complete the session.
///
/// `max_score` sums only the questions actually answered; skipped questions
/// do not count against the user. Answers referencing unknown question ids
/// are dropped with a warning. The session moves to `completed` exactly
/// once; a second submission is a conflict.
#[instrument(level = "info", skip(state, answers), fields(%session_id, answers = answers.len()))]
pub async fn score_session(
  state: &AppState,
  session_id: &str,
  answers: Vec<SubmittedAnswer>,
) -> Result<ScoreSummary, ApiError> {
  let mut total_score = 0.0;
  let mut max_score = 0.0;
  let mut rows: Vec<AssessmentResponse> = Vec::with_capacity(answers.len());
  {
    let questions = state.questions.read().await;
    for answer in &answers {
      let Some(question) = questions.get(&answer.question_id) else {
        warn!(target: "assessment", question_id = %answer.question_id, "Skipping answer to unknown question");
        continue;
      };
      let is_correct = question
        .correct_answer
        .as_deref()
        .map(|expected| answer.user_answer == expected)
        .unwrap_or(false);
      let points_earned = if is_correct { question.points } else { 0.0 };

      rows.push(AssessmentResponse {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        question_id: question.id.clone(),
        user_answer: answer.user_answer.clone(),
        is_correct,
        points_earned,
        response_time_seconds: answer.response_time_seconds,
        created_at: Utc::now(),
      });
      total_score += points_earned;
      max_score += question.points;
    }
  }

  let percentage = if max_score > 0.0 { total_score / max_score * 100.0 } else { 0.0 };
  let responses_saved = rows.len();

  // Commit. The in-progress check and the terminal update happen under one
  // session write lock, so two concurrent submissions cannot both pass the
  // guard. Responses are inserted inside the same critical section (lock
  // order sessions before responses, matching deletion).
  let time_taken_seconds = {
    let mut sessions = state.sessions.write().await;
    let session = sessions
      .get_mut(session_id)
      .ok_or_else(|| ApiError::NotFound("assessment session not found".into()))?;
    if session.status != SessionStatus::InProgress {
      return Err(ApiError::Conflict("session is already completed".into()));
    }

    state
      .responses
      .write()
      .await
      .entry(session_id.to_string())
      .or_default()
      .extend(rows);

    let completed_at = Utc::now();
    session.total_score = total_score;
    session.max_score = max_score;
    session.percentage = percentage;
    session.status = SessionStatus::Completed;
    session.completed_at = Some(completed_at);
    session.time_taken_seconds = (completed_at - session.started_at).num_seconds();
    session.time_taken_seconds
  };

  info!(
    target: "assessment",
    %session_id,
    total_score,
    max_score,
    percentage = %format!("{:.1}", percentage),
    "Session scored and completed"
  );

  Ok(ScoreSummary {
    session_id: session_id.to_string(),
    total_score,
    max_score,
    percentage,
    time_taken_seconds,
    responses_saved,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::Analyzer;
  use crate::config::BackendConfig;
  use crate::domain::SessionStatus;

  fn test_state() -> AppState {
    AppState::with_config(BackendConfig::default(), Analyzer::seeded(1))
  }

  fn answer(question_id: &str, text: &str) -> SubmittedAnswer {
    SubmittedAnswer {
      question_id: question_id.into(),
      user_answer: text.into(),
      response_time_seconds: 4,
    }
  }

  #[tokio::test]
  async fn two_correct_one_incorrect_scores_two_of_three() {
    let state = test_state();
    let session = state.start_session("alice", "at-psychology").await.unwrap();

    let summary = score_session(
      &state,
      &session.id,
      vec![
        answer("q-psy-1", "Comfortable with small groups"), // correct
        answer("q-psy-2", "Plan carefully before acting"),  // correct
        answer("q-psy-3", "Prefer spontaneity"),            // incorrect
      ],
    )
    .await
    .unwrap();

    assert_eq!(summary.total_score, 2.0);
    assert_eq!(summary.max_score, 3.0);
    assert!((summary.percentage - 66.6667).abs() < 0.01);
    assert_eq!(summary.responses_saved, 3);

    let stored = state.responses_for(&session.id).await;
    assert_eq!(stored.len(), 3);
    assert_eq!(stored.iter().filter(|r| r.is_correct).count(), 2);

    let session = state.get_owned_session(&session.id, "alice").await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.completed_at.is_some());
    assert!(session.time_taken_seconds >= 0);
  }

  #[tokio::test]
  async fn zero_responses_means_zero_percentage() {
    let state = test_state();
    let session = state.start_session("alice", "at-career").await.unwrap();
    let summary = score_session(&state, &session.id, vec![]).await.unwrap();
    assert_eq!(summary.max_score, 0.0);
    assert_eq!(summary.percentage, 0.0);
  }

  #[tokio::test]
  async fn skipped_questions_do_not_count_against_max() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let summary =
      score_session(&state, &session.id, vec![answer("q-skl-1", "Comfortable")]).await.unwrap();
    assert_eq!(summary.total_score, 1.0);
    assert_eq!(summary.max_score, 1.0);
    assert_eq!(summary.percentage, 100.0);
  }

  #[tokio::test]
  async fn matching_is_case_sensitive() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let summary =
      score_session(&state, &session.id, vec![answer("q-skl-1", "comfortable")]).await.unwrap();
    assert_eq!(summary.total_score, 0.0);
    assert_eq!(summary.max_score, 1.0);
    assert_eq!(summary.percentage, 0.0);
  }

  #[tokio::test]
  async fn unknown_question_ids_are_skipped() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();
    let summary = score_session(
      &state,
      &session.id,
      vec![answer("q-skl-1", "Comfortable"), answer("bogus", "whatever")],
    )
    .await
    .unwrap();
    assert_eq!(summary.responses_saved, 1);
    assert_eq!(summary.max_score, 1.0);
  }

  #[tokio::test]
  async fn concurrent_submissions_complete_exactly_once() {
    let state = test_state();
    let session = state.start_session("alice", "at-skills").await.unwrap();

    let first = score_session(&state, &session.id, vec![answer("q-skl-1", "Comfortable")]);
    let second = score_session(&state, &session.id, vec![answer("q-skl-2", "Rarely")]);
    let (a, b) = tokio::join!(first, second);

    // Exactly one submission wins; the loser sees a conflict.
    assert!(a.is_ok() != b.is_ok());
    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(loser, ApiError::Conflict(_)));

    // Only the winner's rows were saved.
    let stored = state.responses_for(&session.id).await;
    assert_eq!(stored.len(), 1);
    let session = state.get_owned_session(&session.id, "alice").await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
  }

  #[tokio::test]
  async fn missing_session_and_double_submit_are_rejected() {
    let state = test_state();
    let err = score_session(&state, "nope", vec![]).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let session = state.start_session("alice", "at-career").await.unwrap();
    score_session(&state, &session.id, vec![]).await.unwrap();
    let err = score_session(&state, &session.id, vec![]).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
  }
}
