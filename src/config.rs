//! Runtime settings (environment) and prompt templates (optional TOML).
//!
//! Env variables:
//!   PORT                : u16 (default 5000)
//!   MONGODB_URI         : document database; absent means in-memory store
//!   MONGODB_DB          : database name when the URI names none (default "quizwise")
//!   JWT_SECRET          : token signing secret
//!   EVALUATOR_URL       : answer evaluation service (default "http://localhost:5001/evaluate")
//!   APP_ENV             : "development" exposes internal error detail on some endpoints
//!   STATIC_DIR          : built SPA directory (default "./static")
//!   PROMPTS_CONFIG_PATH : TOML file overriding the generation prompts

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

const DEV_JWT_SECRET: &str = "quizwise-dev-secret";

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  pub mongodb_uri: Option<String>,
  pub mongodb_db: String,
  pub jwt_secret: String,
  pub evaluator_url: String,
  pub app_env: String,
  pub static_dir: PathBuf,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      port: 5000,
      mongodb_uri: None,
      mongodb_db: "quizwise".into(),
      jwt_secret: DEV_JWT_SECRET.into(),
      evaluator_url: "http://localhost:5001/evaluate".into(),
      app_env: "production".into(),
      static_dir: PathBuf::from("./static"),
    }
  }
}

impl Settings {
  /// Read settings from the process environment, falling back to defaults.
  pub fn from_env() -> Self {
    let d = Settings::default();
    let jwt_secret = match std::env::var("JWT_SECRET") {
      Ok(s) if !s.is_empty() => s,
      _ => {
        warn!(target: "quizwise", "JWT_SECRET not set; using the development secret");
        d.jwt_secret
      }
    };
    Self {
      port: std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(d.port),
      mongodb_uri: std::env::var("MONGODB_URI").ok().filter(|s| !s.trim().is_empty()),
      mongodb_db: std::env::var("MONGODB_DB").unwrap_or(d.mongodb_db),
      jwt_secret,
      evaluator_url: std::env::var("EVALUATOR_URL").unwrap_or(d.evaluator_url),
      app_env: std::env::var("APP_ENV").unwrap_or(d.app_env),
      static_dir: std::env::var("STATIC_DIR").map(PathBuf::from).unwrap_or(d.static_dir),
    }
  }

  pub fn is_development(&self) -> bool {
    self.app_env.eq_ignore_ascii_case("development")
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the question generator. Override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub mcq_system: String,
  pub mcq_user_template: String,
  pub open_system: String,
  pub open_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      mcq_system: "You write multiple-choice quiz questions for teachers. Respond ONLY with strict JSON.".into(),
      mcq_user_template: "Generate {num_questions} multiple choice questions about the context below. Return JSON {\"questions\": [{\"question\": string, \"answer\": string, \"distractors\": [string, string, string]}]}. Each question must end with '?'. Distractors must be wrong but plausible and must differ from the answer.\n\nContext:\n{context}".into(),
      open_system: "You write open-ended quiz questions for teachers. Respond ONLY with strict JSON.".into(),
      open_user_template: "Generate {num_questions} open-ended questions{taxonomy_clause} about the context below. Each must be answerable from the context. Return JSON {\"questions\": [string]}.\n\nContext:\n{context}".into(),
    }
  }
}

/// Load prompts from PROMPTS_CONFIG_PATH. Any IO/parse error falls back to defaults.
pub fn load_prompts_from_env() -> Prompts {
  let Ok(path) = std::env::var("PROMPTS_CONFIG_PATH") else {
    return Prompts::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PromptConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizwise", %path, "Loaded prompt config (TOML)");
        cfg.prompts
      }
      Err(e) => {
        error!(target: "quizwise", %path, error = %e, "Failed to parse TOML prompt config");
        Prompts::default()
      }
    },
    Err(e) => {
      error!(target: "quizwise", %path, error = %e, "Failed to read TOML prompt config");
      Prompts::default()
    }
  }
}
