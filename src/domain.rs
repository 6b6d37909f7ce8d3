//! Domain models persisted by the store: quizzes (with embedded questions),
//! results (with per-question detail) and users.
//!
//! These are storage shapes. The wire shapes live in `protocol` and are produced
//! by explicit mapping functions there.

use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};

/// Which kind of question set a quiz holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
  #[serde(rename = "mcq")]
  Mcq,
  /// "open" is what the generator script called it; "bloom" is the taxonomy-driven variant.
  #[serde(rename = "openEnded", alias = "open", alias = "bloom")]
  OpenEnded,
}
impl Default for QuestionType {
  fn default() -> Self { QuestionType::Mcq }
}
impl QuestionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionType::Mcq => "mcq",
      QuestionType::OpenEnded => "openEnded",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Student,
  Teacher,
}
impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Student => "student",
      Role::Teacher => "teacher",
    }
  }
}

/// Question embedded in a quiz document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDoc {
  pub id: String,
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correct_answer: Option<usize>,
  /// Per-question override of the quiz context.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  pub question_type: QuestionType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDoc {
  #[serde(rename = "_id")]
  pub id: ObjectId,
  pub user_id: String,
  pub quiz_name: String,
  pub context: String,
  pub questions: Vec<QuestionDoc>,
  pub question_type: QuestionType,
  #[serde(with = "chrono_datetime_as_bson_datetime")]
  pub created_at: DateTime<Utc>,
}

/// A submitted answer: a choice index for MCQ, free text for open-ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
  Choice(i64),
  Text(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
  #[serde(default)]
  pub similarity_score: f64,
  #[serde(default)]
  pub model_answer: String,
  #[serde(default)]
  pub feedback_message: String,
}

/// Per-question record kept with a result. MCQ rows carry `correct_answer`,
/// open-ended rows carry `feedback`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetail {
  #[serde(default)]
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_answer: Option<AnswerValue>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correct_answer: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub feedback: Option<Feedback>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDoc {
  #[serde(rename = "_id")]
  pub id: ObjectId,
  pub student_id: String,
  pub assessment_id: ObjectId,
  pub score: f64,
  #[serde(with = "chrono_datetime_as_bson_datetime")]
  pub completed_at: DateTime<Utc>,
  pub question_type: QuestionType,
  pub details: Vec<ResultDetail>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
  #[serde(rename = "_id")]
  pub id: ObjectId,
  pub name: String,
  pub email: String,
  pub password_hash: String,
  pub role: Role,
  #[serde(with = "chrono_datetime_as_bson_datetime")]
  pub created_at: DateTime<Utc>,
}

/// Parse a 24-hex identifier; `None` when malformed.
pub fn parse_object_id(raw: &str) -> Option<ObjectId> {
  ObjectId::parse_str(raw.trim()).ok()
}
