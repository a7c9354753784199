//! Wire types shared by the HTTP handlers and the WebSocket capture loop.

use serde::{Deserialize, Serialize};

use crate::domain::Question;
use crate::frames::{CaptureReport, CaptureStats, FrameEmotion};
use crate::scoring::SubmittedAnswer;

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
    pub assessment_type_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    pub responses: Vec<SubmittedAnswer>,
}

/// Query string for the video upload route.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default = "default_true")]
    pub process_automatically: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct DownloadIn {
    pub destination_folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextAnalyzeIn {
    pub text: String,
}

/// A question as shown to the person taking the assessment. The expected
/// answer never leaves the server.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub assessment_type_id: String,
    pub question_text: String,
    pub kind: crate::domain::QuestionKind,
    pub options: Vec<String>,
    pub points: f64,
    pub order_index: u32,
}

impl From<&Question> for QuestionOut {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            assessment_type_id: q.assessment_type_id.clone(),
            question_text: q.question_text.clone(),
            kind: q.kind.clone(),
            options: q.options.clone(),
            points: q.points,
            order_index: q.order_index,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Messages a capture client may send over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartCapture {
        #[serde(default)]
        session_id: Option<String>,
    },
    Frame {
        image: String,
    },
    LatestEmotion,
    EmotionStats,
    StopCapture,
}

/// Messages the server sends back on the capture socket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    CaptureStarted {
        session_id: Option<String>,
        started_at: chrono::DateTime<chrono::Utc>,
    },
    Frame(FrameEmotion),
    Stats(CaptureStats),
    CaptureStopped(CaptureReport),
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_out_never_carries_the_expected_answer() {
        let q = Question {
            id: "q1".into(),
            assessment_type_id: "at".into(),
            question_text: "Pick one".into(),
            kind: crate::domain::QuestionKind::MultipleChoice,
            options: vec!["a".into(), "b".into()],
            correct_answer: Some("a".into()),
            points: 1.0,
            order_index: 0,
            is_active: true,
        };
        let json = serde_json::to_value(QuestionOut::from(&q)).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert_eq!(json["question_text"], "Pick one");
    }

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"start_capture","session_id":"s1"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::StartCapture { session_id: Some(_) }));

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Ping));

        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"frame","image":"aGk="}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Frame { .. }));
    }

    #[test]
    fn upload_query_defaults_to_automatic_processing() {
        let q: UploadQuery = serde_json::from_str("{}").unwrap();
        assert!(q.process_automatically);
        let q: UploadQuery =
            serde_json::from_str(r#"{"process_automatically":false}"#).unwrap();
        assert!(!q.process_automatically);
    }
}
