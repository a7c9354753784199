//! Opaque analyzer boundary: video analysis and text emotion classification.
//!
//! Two implementations sit behind the same call shape:
//!   - `Simulated`: seeded RNG, deterministic for a given seed. Used whenever
//!     no remote inference service is configured, and in tests.
//!   - `Remote`: reqwest calls against an inference service
//!     (ANALYZER_BASE_URL / ANALYZER_API_KEY).
//!
//! Whatever the backing, the output contract holds: the emotion map sums to 1
//! within floating tolerance, `dominant_emotion` is its argmax, and every
//! scalar score lands in [0, 1].
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::domain::{
  AttentionMetrics, CareerPredictions, CognitiveMetrics, FaceObservation, PersonalityTraits,
  VideoAnalysisData,
};
use crate::util::clamp01;

/// Emotion vocabulary of the video analyzer.
pub const VIDEO_EMOTIONS: [&str; 7] =
  ["happiness", "sadness", "anger", "surprise", "fear", "disgust", "neutral"];

/// Emotion vocabulary of the text classifier.
pub const TEXT_EMOTIONS: [&str; 7] =
  ["happy", "sad", "angry", "surprised", "neutral", "fearful", "disgusted"];

/// Scale a probability map so it sums to 1. Negative inputs are floored at
/// zero first, so a mixed-sign map still normalizes into [0, 1]. A map of
/// all zeros becomes a uniform distribution rather than staying degenerate.
pub fn normalize_probs(probs: &mut HashMap<String, f64>) {
  for v in probs.values_mut() {
    if *v < 0.0 {
      *v = 0.0;
    }
  }
  let total: f64 = probs.values().sum();
  if total > 0.0 {
    for v in probs.values_mut() {
      *v /= total;
    }
  } else if !probs.is_empty() {
    let uniform = 1.0 / probs.len() as f64;
    for v in probs.values_mut() {
      *v = uniform;
    }
  }
}

/// Argmax of a probability map.
pub fn dominant_of(probs: &HashMap<String, f64>) -> String {
  probs
    .iter()
    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
    .map(|(k, _)| k.clone())
    .unwrap_or_else(|| "neutral".to_string())
}

/// Pluggable analyzer capability (simulated or real model call).
pub enum Analyzer {
  Simulated(SimulatedAnalyzer),
  Remote(RemoteAnalyzer),
}

impl Analyzer {
  /// Remote when ANALYZER_BASE_URL is set, simulated otherwise.
  pub fn from_env(seed: u64) -> Self {
    match RemoteAnalyzer::from_env() {
      Some(remote) => {
        info!(target: "pipeline", base_url = %remote.base_url, "Remote analyzer enabled.");
        Analyzer::Remote(remote)
      }
      None => {
        info!(target: "pipeline", seed, "Remote analyzer disabled (no ANALYZER_BASE_URL). Using simulated analysis.");
        Analyzer::Simulated(SimulatedAnalyzer::seeded(seed))
      }
    }
  }

  pub fn seeded(seed: u64) -> Self {
    Analyzer::Simulated(SimulatedAnalyzer::seeded(seed))
  }

  /// Run video analysis against the stored file.
  #[instrument(level = "info", skip(self), fields(%video_path))]
  pub async fn analyze_video(&self, video_path: &str) -> Result<VideoAnalysisData, String> {
    match self {
      Analyzer::Simulated(sim) => Ok(sim.analyze()),
      Analyzer::Remote(remote) => {
        let mut data = remote.analyze_video(video_path).await?;
        enforce_contract(&mut data);
        Ok(data)
      }
    }
  }

  /// Classify emotions in a text snippet. The caller validates length bounds.
  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  pub async fn analyze_text(&self, text: &str) -> Result<HashMap<String, f64>, String> {
    match self {
      Analyzer::Simulated(_) => Ok(lexicon_text_emotions(text)),
      Analyzer::Remote(remote) => match remote.text_emotions(text).await {
        Ok(mut probs) => {
          normalize_probs(&mut probs);
          Ok(probs)
        }
        Err(e) => {
          error!(target: "pipeline", error = %e, "Remote text classifier failed; using lexicon fallback.");
          Ok(lexicon_text_emotions(text))
        }
      },
    }
  }
}

/// Re-normalize and clamp whatever a remote model returned so downstream
/// consumers can rely on the documented ranges.
fn enforce_contract(data: &mut VideoAnalysisData) {
  normalize_probs(&mut data.emotional_analysis);
  data.dominant_emotion = dominant_of(&data.emotional_analysis);
  data.mood_score = clamp01(data.mood_score);
  data.engagement_level = clamp01(data.engagement_level);
  data.focus_score = clamp01(data.focus_score);
  data.confidence_level = clamp01(data.confidence_level);
  data.motivation_level = clamp01(data.motivation_level);
  data.overall_score = clamp01(data.overall_score);
}

// --- Simulated analysis ---

const CAREER_CATEGORIES: [(&str, [&str; 4]); 4] = [
  ("technology", ["Software Developer", "Data Scientist", "AI Engineer", "Cybersecurity Analyst"]),
  ("healthcare", ["Doctor", "Nurse", "Medical Researcher", "Psychologist"]),
  ("business", ["Business Analyst", "Marketing Manager", "Financial Advisor", "Entrepreneur"]),
  ("creative", ["Graphic Designer", "Content Creator", "Architect", "Film Director"]),
];

const KEY_STRENGTHS: [&str; 5] =
  ["Analytical Thinking", "Creativity", "Leadership", "Technical Skills", "Communication"];
const DEVELOPMENT_AREAS: [&str; 4] =
  ["Public Speaking", "Time Management", "Technical Depth", "Strategic Thinking"];

/// Deterministic-for-a-seed stand-in for the real model. The RNG sits behind
/// a mutex because analyses run from concurrent background tasks.
pub struct SimulatedAnalyzer {
  rng: Mutex<StdRng>,
}

impl SimulatedAnalyzer {
  pub fn seeded(seed: u64) -> Self {
    Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
  }

  pub fn analyze(&self) -> VideoAnalysisData {
    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
    let rng = &mut *rng;

    let mut emotional_analysis: HashMap<String, f64> = VIDEO_EMOTIONS
      .iter()
      .map(|e| (e.to_string(), rng.gen_range(0.05..0.35)))
      .collect();
    normalize_probs(&mut emotional_analysis);
    let dominant_emotion = dominant_of(&emotional_analysis);

    let (_, careers) = CAREER_CATEGORIES
      .choose(rng)
      .copied()
      .unwrap_or(CAREER_CATEGORIES[0]);
    let recommended_careers: Vec<String> =
      careers.choose_multiple(rng, 3).map(|c| c.to_string()).collect();
    let compatibility_scores: Vec<f64> =
      (0..3).map(|_| rng.gen_range(0.7..0.95)).collect();
    let key_strengths: Vec<String> =
      KEY_STRENGTHS.choose_multiple(rng, 3).map(|s| s.to_string()).collect();
    let development_areas: Vec<String> =
      DEVELOPMENT_AREAS.choose_multiple(rng, 2).map(|s| s.to_string()).collect();

    VideoAnalysisData {
      emotional_analysis,
      dominant_emotion,
      mood_score: rng.gen_range(0.6..0.9),
      engagement_level: rng.gen_range(0.7..0.95),
      focus_score: rng.gen_range(0.65..0.9),
      confidence_level: rng.gen_range(0.6..0.85),
      motivation_level: rng.gen_range(0.7..0.9),
      personality_insights: PersonalityTraits {
        openness: rng.gen_range(0.6..0.9),
        conscientiousness: rng.gen_range(0.5..0.8),
        extraversion: rng.gen_range(0.4..0.7),
        agreeableness: rng.gen_range(0.6..0.8),
        neuroticism: rng.gen_range(0.2..0.5),
      },
      attention_metrics: AttentionMetrics {
        gaze_stability: rng.gen_range(0.7..0.9),
        blink_rate: pick(rng, &["low", "normal", "slightly_high"]),
        head_movement: pick(rng, &["minimal", "moderate", "active"]),
        posture_consistency: rng.gen_range(0.6..0.85),
      },
      cognitive_analysis: CognitiveMetrics {
        concentration_level: rng.gen_range(0.7..0.9),
        mental_workload: pick(rng, &["low", "moderate", "high"]),
        problem_solving_efficiency: rng.gen_range(0.6..0.85),
        decision_making_speed: pick(rng, &["deliberate", "balanced", "quick"]),
      },
      problem_solving_style: pick(rng, &["analytical", "creative", "practical", "theoretical"]),
      career_predictions: CareerPredictions {
        recommended_careers,
        compatibility_scores,
        key_strengths,
        development_areas,
      },
      overall_score: rng.gen_range(0.7..0.9),
      analysis_remarks: "The candidate demonstrated strong engagement and positive emotional \
        indicators throughout the assessment. Cognitive metrics suggest good problem-solving \
        abilities and sustained focus. Career recommendations are based on behavioral patterns \
        and response analysis."
        .to_string(),
    }
  }
}

fn pick(rng: &mut StdRng, options: &[&str]) -> String {
  options.choose(rng).copied().unwrap_or(options[0]).to_string()
}

/// Keyword-lexicon fallback for text emotions. Deterministic: every emotion
/// starts at a small floor and each keyword hit bumps its bucket.
pub fn lexicon_text_emotions(text: &str) -> HashMap<String, f64> {
  const LEXICON: [(&str, &str); 12] = [
    ("happy", "happy"), ("great", "happy"), ("love", "happy"), ("excited", "happy"),
    ("sad", "sad"), ("cry", "sad"), ("lonely", "sad"),
    ("angry", "angry"), ("hate", "angry"),
    ("wow", "surprised"), ("afraid", "fearful"), ("disgust", "disgusted"),
  ];

  let lower = text.to_lowercase();
  let mut probs: HashMap<String, f64> =
    TEXT_EMOTIONS.iter().map(|e| (e.to_string(), 0.05)).collect();
  let mut any_hit = false;
  for (word, emotion) in LEXICON {
    if lower.contains(word) {
      *probs.entry(emotion.to_string()).or_insert(0.0) += 0.5;
      any_hit = true;
    }
  }
  if !any_hit {
    if let Some(v) = probs.get_mut("neutral") {
      *v += 0.5;
    }
  }
  normalize_probs(&mut probs);
  probs
}

// --- Remote inference client ---

#[derive(Clone)]
pub struct RemoteAnalyzer {
  pub client: reqwest::Client,
  pub base_url: String,
  api_key: Option<String>,
}

#[derive(Serialize)]
struct VideoAnalysisRequest {
  file_name: String,
  video_b64: String,
}

#[derive(Serialize)]
struct TextEmotionRequest {
  text: String,
}

#[derive(Deserialize)]
struct TextEmotionResponse {
  emotions: HashMap<String, f64>,
}

impl RemoteAnalyzer {
  /// Construct the client if we find ANALYZER_BASE_URL; otherwise None.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("ANALYZER_BASE_URL").ok()?;
    let api_key = std::env::var("ANALYZER_API_KEY").ok();
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;
    Some(Self { client, base_url, api_key })
  }

  /// Client against an explicit base URL. Handy for tests that need a
  /// guaranteed-unreachable endpoint.
  pub fn with_base_url(base_url: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: base_url.into(),
      api_key: None,
    }
  }

  async fn post_json<B: Serialize, T: for<'a> Deserialize<'a>>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, String> {
    let url = format!("{}{}", self.base_url, path);
    let mut req = self
      .client
      .post(&url)
      .header(USER_AGENT, "aptiview-backend/0.1")
      .header(CONTENT_TYPE, "application/json");
    if let Some(key) = &self.api_key {
      req = req.header(AUTHORIZATION, format!("Bearer {}", key));
    }
    let res = req.json(body).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_service_error(&body).unwrap_or(body);
      return Err(format!("analyzer HTTP {}: {}", status, msg));
    }
    res.json::<T>().await.map_err(|e| e.to_string())
  }

  #[instrument(level = "info", skip(self), fields(%video_path))]
  pub async fn analyze_video(&self, video_path: &str) -> Result<VideoAnalysisData, String> {
    let bytes = tokio::fs::read(video_path)
      .await
      .map_err(|e| format!("failed to read video file: {}", e))?;
    let file_name = std::path::Path::new(video_path)
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "video".into());

    let start = std::time::Instant::now();
    let req = VideoAnalysisRequest {
      file_name,
      video_b64: base64::engine::general_purpose::STANDARD.encode(&bytes),
    };
    let result: Result<VideoAnalysisData, String> =
      self.post_json("/v1/video/analyze", &req).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(_) => info!(target: "pipeline", ?elapsed, "Remote video analysis succeeded"),
      Err(e) => error!(target: "pipeline", ?elapsed, error = %e, "Remote video analysis failed"),
    }
    result
  }

  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  pub async fn text_emotions(&self, text: &str) -> Result<HashMap<String, f64>, String> {
    let req = TextEmotionRequest { text: text.to_string() };
    let res: TextEmotionResponse = self.post_json("/v1/text/emotions", &req).await?;
    Ok(res.emotions)
  }

  /// Single-frame face analysis for the live capture loop.
  #[instrument(level = "debug", skip(self, image_b64), fields(payload_len = image_b64.len()))]
  pub async fn face_analysis(&self, image_b64: &str) -> Result<FaceObservation, String> {
    #[derive(Serialize)]
    struct FaceRequest<'a> { image_b64: &'a str }
    let mut obs: FaceObservation =
      self.post_json("/v1/face/analyze", &FaceRequest { image_b64 }).await?;
    normalize_probs(&mut obs.emotions);
    obs.dominant_emotion = dominant_of(&obs.emotions);
    Ok(obs)
  }
}

/// Try to extract a clean error message from the service's error body.
fn extract_service_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}
