//! Loading backend configuration (storage paths, analyzer settings, and an
//! optional assessment bank) from TOML.
//!
//! See `BackendConfig` for the expected schema. Everything is optional;
//! built-in seed assessments keep the app useful with no config at all.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::QuestionKind;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BackendConfig {
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub analyzer: AnalyzerConfig,
  #[serde(default)]
  pub assessments: Vec<AssessmentCfg>,
}

/// Where uploaded videos land and where download copies go by default.
#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
  #[serde(default = "default_upload_dir")]
  pub upload_dir: String,
  #[serde(default = "default_download_dir")]
  pub download_dir: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self { upload_dir: default_upload_dir(), download_dir: default_download_dir() }
  }
}

fn default_upload_dir() -> String { "uploads/videos".into() }
fn default_download_dir() -> String { "downloads".into() }

/// Tuning for the simulated analyzer. A fixed seed makes every simulated
/// analysis deterministic, which test environments rely on.
#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzerConfig {
  #[serde(default = "default_seed")]
  pub seed: u64,
}

impl Default for AnalyzerConfig {
  fn default() -> Self {
    Self { seed: default_seed() }
  }
}

fn default_seed() -> u64 { 0xA55E55 }

/// Assessment entry accepted in TOML configuration. Questions are nested
/// tables and keep their file order as `order_index` when none is given.
#[derive(Clone, Debug, Deserialize)]
pub struct AssessmentCfg {
  #[serde(default)] pub id: Option<String>,
  pub name: String,
  pub category: String,
  #[serde(default)] pub description: String,
  #[serde(default = "default_duration")] pub duration_minutes: u32,
  #[serde(default)] pub questions: Vec<QuestionCfg>,
}

fn default_duration() -> u32 { 30 }

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  #[serde(default)] pub id: Option<String>,
  pub question_text: String,
  #[serde(default)] pub kind: QuestionKind,
  #[serde(default)] pub options: Vec<String>,
  #[serde(default)] pub correct_answer: Option<String>,
  #[serde(default = "default_points")] pub points: f64,
  #[serde(default)] pub order_index: Option<u32>,
}

fn default_points() -> f64 { 1.0 }

/// Attempt to load `BackendConfig` from ASSESSMENT_CONFIG_PATH.
/// On any parsing/IO error, returns None and the defaults apply.
pub fn load_config_from_env() -> Option<BackendConfig> {
  let path = std::env::var("ASSESSMENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<BackendConfig>(&s) {
      Ok(cfg) => {
        info!(target: "aptiview_backend", %path, "Loaded backend config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "aptiview_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "aptiview_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bank_parses_with_defaults() {
    let cfg: BackendConfig = toml::from_str(
      r#"
      [storage]
      upload_dir = "/tmp/videos"

      [[assessments]]
      name = "Sample"
      category = "General"

      [[assessments.questions]]
      question_text = "Pick one"
      options = ["a", "b"]
      correct_answer = "a"
      "#,
    )
    .unwrap();

    assert_eq!(cfg.storage.upload_dir, "/tmp/videos");
    assert_eq!(cfg.storage.download_dir, "downloads");
    assert_eq!(cfg.assessments.len(), 1);
    let q = &cfg.assessments[0].questions[0];
    assert_eq!(q.points, 1.0);
    assert_eq!(q.kind, QuestionKind::MultipleChoice);
  }
}
