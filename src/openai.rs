//! Minimal OpenAI-compatible client used for question generation.
//!
//! We only call chat.completions and request a strict JSON object back.
//! Calls are instrumented and log model names, latencies and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::QuestionType;
use crate::error::UpstreamError;
use crate::util::fill_template;

/// Generated questions never carry more than this many distractors.
const MAX_DISTRACTORS: usize = 3;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

/// One generated multiple-choice question with shuffled options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMcq {
  pub question: String,
  pub options: Vec<String>,
  pub answer: String,
  pub correct_answer: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeneratedSet {
  Mcq(Vec<GeneratedMcq>),
  Open(Vec<String>),
}

/// One question as the model returns it, before option shuffling.
#[derive(Clone, Debug, Deserialize)]
pub struct RawMcq {
  pub question: String,
  pub answer: String,
  #[serde(default)]
  pub distractors: Vec<String>,
}

#[derive(Deserialize)]
struct RawMcqSet {
  #[serde(default)]
  questions: Vec<RawMcq>,
}

#[derive(Deserialize)]
struct RawOpenSet {
  #[serde(default)]
  questions: Vec<String>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, UpstreamError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "quizwise/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(UpstreamError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    serde_json::from_str::<T>(&text).map_err(|e| UpstreamError::Payload(format!("JSON parse error: {}", e)))
  }

  /// Generate `num_questions` questions of the given type from `context`.
  #[instrument(
    level = "info",
    skip(self, prompts, context),
    fields(context_len = context.len(), %num_questions, kind = kind.as_str())
  )]
  pub async fn generate_questions(
    &self,
    prompts: &Prompts,
    context: &str,
    num_questions: usize,
    kind: QuestionType,
    taxonomy_level: Option<&str>,
  ) -> Result<GeneratedSet, UpstreamError> {
    let n = num_questions.to_string();
    let start = std::time::Instant::now();

    let result = match kind {
      QuestionType::Mcq => {
        let user = fill_template(&prompts.mcq_user_template, &[("num_questions", &n), ("context", context)]);
        self.chat_json::<RawMcqSet>(&prompts.mcq_system, &user, 0.7).await
          .map(|raw| GeneratedSet::Mcq(build_mcqs(raw.questions, num_questions, &mut rand::thread_rng())))
      }
      QuestionType::OpenEnded => {
        let clause = taxonomy_level
          .filter(|t| !t.trim().is_empty())
          .map(|t| format!(" at the '{}' level of Bloom's taxonomy", t.trim()))
          .unwrap_or_default();
        let user = fill_template(
          &prompts.open_user_template,
          &[("num_questions", &n), ("taxonomy_clause", &clause), ("context", context)],
        );
        self.chat_json::<RawOpenSet>(&prompts.open_system, &user, 0.8).await
          .map(|raw| GeneratedSet::Open(dedup_questions(raw.questions, num_questions)))
      }
    };

    let elapsed = start.elapsed();
    match &result {
      Ok(_) => info!(target: "generation", ?elapsed, "Model response received"),
      Err(e) => error!(target: "generation", ?elapsed, error = %e, "Model call failed during question generation"),
    }
    result
  }
}

/// Turn raw model output into MCQs: drop blanks and duplicates, keep up to three
/// distractors distinct from the answer, shuffle, and record the answer's index.
pub fn build_mcqs<R: rand::Rng + ?Sized>(raw: Vec<RawMcq>, limit: usize, rng: &mut R) -> Vec<GeneratedMcq> {
  let mut seen: Vec<String> = Vec::new();
  let mut out = Vec::new();
  for item in raw {
    let question = item.question.trim().to_string();
    let answer = item.answer.trim().to_string();
    if question.is_empty() || answer.is_empty() || seen.contains(&question) {
      continue;
    }
    seen.push(question.clone());

    let mut options = vec![answer.clone()];
    for d in item.distractors {
      let d = d.trim().to_string();
      if d.is_empty() || options.iter().any(|o| o.eq_ignore_ascii_case(&d)) {
        continue;
      }
      options.push(d);
      if options.len() > MAX_DISTRACTORS {
        break;
      }
    }
    options.shuffle(rng);
    let correct_answer = options.iter().position(|o| o == &answer).unwrap_or(0);
    out.push(GeneratedMcq { question, options, answer, correct_answer });
    if out.len() == limit {
      break;
    }
  }
  out
}

fn dedup_questions(raw: Vec<String>, limit: usize) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for q in raw {
    let q = q.trim().to_string();
    if !q.is_empty() && !out.contains(&q) {
      out.push(q);
    }
  }
  out.truncate(limit);
  out
}

fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct ErrorEnvelope { error: ErrorBody }
  #[derive(Deserialize)]
  struct ErrorBody { message: String }
  serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error.message)
}

// --- Wire types for chat.completions ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
  r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<Choice>,
  #[serde(default)]
  usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  #[serde(default)]
  content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
  prompt_tokens: Option<u32>,
  completion_tokens: Option<u32>,
  total_tokens: Option<u32>,
}
