//! Client for the external answer-evaluation service (`POST /evaluate`).
//!
//! The server relays the service's JSON verbatim, so `evaluate_raw` hands back a
//! `serde_json::Value`; `Evaluation` is the typed view the session layer reads.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::UpstreamError;

#[derive(Clone)]
pub struct Evaluator {
  client: reqwest::Client,
  pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
  pub context: String,
  pub question: String,
  pub user_answer: String,
}

/// What the evaluation service returns for one answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
  #[serde(default)]
  pub model_answer: String,
  #[serde(default)]
  pub user_answer: String,
  pub score: f64,
  #[serde(default)]
  pub feedback: String,
  #[serde(default)]
  pub similarity_score: Option<f64>,
}

impl Evaluator {
  pub fn new(url: impl Into<String>) -> Self {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .unwrap_or_default();
    Self { client, url: url.into() }
  }

  /// Forward one answer and return the upstream body untouched.
  #[instrument(level = "info", skip(self, req), fields(url = %self.url, answer_len = req.user_answer.len()))]
  pub async fn evaluate_raw(&self, req: &EvaluateRequest) -> Result<serde_json::Value, UpstreamError> {
    let res = self.client.post(&self.url).json(req).send().await?;
    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let message = extract_upstream_error(&body).unwrap_or(body);
      error!(target: "evaluation", status = status.as_u16(), %message, "Evaluation service returned an error");
      return Err(UpstreamError::Status { status: status.as_u16(), message });
    }
    let body: serde_json::Value = res.json().await?;
    info!(target: "evaluation", score = ?body.get("score"), "Evaluation received");
    Ok(body)
  }
}

/// The evaluation service reports failures as `{"error": "..."}`.
pub fn extract_upstream_error(body: &str) -> Option<String> {
  serde_json::from_str::<serde_json::Value>(body)
    .ok()?
    .get("error")?
    .as_str()
    .map(str::to_string)
}
