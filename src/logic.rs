//! Core behaviors behind the HTTP handlers.
//!
//! Each operation validates its input, performs one store or upstream round
//! trip, and maps the stored documents to their wire shape. Handlers in
//! `routes` are thin wrappers over these.

use std::collections::HashMap;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::domain::{parse_object_id, QuestionDoc, QuestionType, QuizDoc, ResultDetail, ResultDoc, Role, UserDoc};
use crate::error::{ApiError, StoreError};
use crate::evaluator::EvaluateRequest;
use crate::extract::{extract_text, ExtractError};
use crate::openai::GeneratedSet;
use crate::protocol::*;
use crate::state::AppState;
use crate::util::{clamp_percent, decode_context, trunc_for_log};

pub const MAX_GENERATED_QUESTIONS: i64 = 50;
pub const DEFAULT_GENERATED_QUESTIONS: i64 = 5;
pub const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_MCQ_OPTIONS: [&str; 4] = ["Option A", "Option B", "Option C", "Option D"];

/// Log a store failure and turn it into a generic 500.
fn db_error(message: &'static str) -> impl Fn(StoreError) -> ApiError {
  move |e| {
    error!(target: "quizwise", error = %e, "{}", message);
    ApiError::internal(message)
  }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
  v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// -------- Quizzes --------

/// Validate the four fields every quiz needs.
fn required_quiz_fields(body: &QuizIn) -> Result<(String, String, String, &Vec<QuestionIn>), ApiError> {
  let missing = || ApiError::bad_request("Missing required fields");
  let user_id = non_blank(&body.user_id).ok_or_else(missing)?.to_string();
  let quiz_name = non_blank(&body.quiz_name).ok_or_else(missing)?.to_string();
  let context = non_blank(&body.context).ok_or_else(missing)?.to_string();
  let questions = body.questions.as_ref().filter(|q| !q.is_empty()).ok_or_else(missing)?;
  Ok((user_id, quiz_name, context, questions))
}

fn question_text(idx: usize, q: &QuestionIn) -> Result<String, ApiError> {
  non_blank(&q.question)
    .map(str::to_string)
    .ok_or_else(|| ApiError::bad_request(format!("Question {} has no text", idx + 1)))
}

fn checked_index(idx: usize, correct: i64, options: &[String]) -> Result<usize, ApiError> {
  usize::try_from(correct)
    .ok()
    .filter(|c| *c < options.len())
    .ok_or_else(|| ApiError::bad_request(format!("Question {} has a correctAnswer outside its options", idx + 1)))
}

/// Normalize a question set for storage: MCQ questions get default options and
/// a default correct index; open-ended questions carry neither.
pub fn process_questions(questions: &[QuestionIn], kind: QuestionType) -> Result<Vec<QuestionDoc>, ApiError> {
  questions
    .iter()
    .enumerate()
    .map(|(idx, q)| -> Result<QuestionDoc, ApiError> {
      let question = question_text(idx, q)?;
      let (options, correct_answer) = match kind {
        QuestionType::Mcq => {
          let options = q
            .options
            .clone()
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| DEFAULT_MCQ_OPTIONS.iter().map(|s| s.to_string()).collect());
          let correct = checked_index(idx, q.correct_answer.unwrap_or(0), &options)?;
          (Some(options), Some(correct))
        }
        QuestionType::OpenEnded => (None, None),
      };
      Ok(QuestionDoc {
        id: Uuid::new_v4().to_string(),
        question,
        options,
        correct_answer,
        context: non_blank(&q.context).map(str::to_string),
        question_type: kind,
      })
    })
    .collect()
}

/// `/save-quiz`: store the quiz close to how it was sent. The set type is taken
/// from the body, or inferred from whether any question carries options.
#[instrument(level = "info", skip(state, body))]
pub async fn save_quiz(state: &AppState, body: QuizIn) -> Result<QuizDoc, ApiError> {
  let (user_id, quiz_name, context, questions) = required_quiz_fields(&body)?;
  let kind = body.question_type.unwrap_or_else(|| {
    if questions.iter().any(|q| q.options.as_ref().is_some_and(|o| !o.is_empty())) {
      QuestionType::Mcq
    } else {
      QuestionType::OpenEnded
    }
  });

  let questions = questions
    .iter()
    .enumerate()
    .map(|(idx, q)| -> Result<QuestionDoc, ApiError> {
      let correct_answer = match (&q.options, q.correct_answer) {
        (Some(opts), Some(c)) => Some(checked_index(idx, c, opts)?),
        _ => None,
      };
      Ok(QuestionDoc {
        id: Uuid::new_v4().to_string(),
        question: question_text(idx, q)?,
        options: q.options.clone(),
        correct_answer,
        context: non_blank(&q.context).map(str::to_string),
        question_type: kind,
      })
    })
    .collect::<Result<Vec<_>, ApiError>>()?;

  let quiz = QuizDoc {
    id: ObjectId::new(),
    user_id,
    quiz_name,
    context,
    questions,
    question_type: kind,
    created_at: Utc::now(),
  };
  let saved = state.store.insert_quiz(quiz).await.map_err(db_error("Error saving quiz"))?;
  info!(target: "quiz", id = %saved.id, kind = kind.as_str(), count = saved.questions.len(), "Quiz saved");
  Ok(saved)
}

/// `/save-questions`: a generated question set of a declared type.
#[instrument(level = "info", skip(state, body))]
pub async fn save_question_set(state: &AppState, body: QuizIn) -> Result<QuizDoc, ApiError> {
  let (user_id, quiz_name, context, questions) = required_quiz_fields(&body)?;
  let kind = body.question_type.ok_or_else(|| ApiError::bad_request("Missing required fields"))?;
  let questions = process_questions(questions, kind)?;

  let quiz = QuizDoc {
    id: ObjectId::new(),
    user_id,
    quiz_name,
    context,
    questions,
    question_type: kind,
    created_at: Utc::now(),
  };
  let saved = state.store.insert_quiz(quiz).await.map_err(db_error("Internal server error"))?;
  info!(target: "quiz", id = %saved.id, kind = kind.as_str(), count = saved.questions.len(), "Question set saved");
  Ok(saved)
}

/// Students see every assessment; teachers see their own, newest first.
#[instrument(level = "info", skip(state), fields(user = %user.user_id, role = user.role.as_str()))]
pub async fn list_assessments(state: &AppState, user: &AuthUser) -> Result<Vec<AssessmentOut>, ApiError> {
  let listed = match user.role {
    Role::Student => state.store.all_quizzes().await,
    Role::Teacher => state.store.quizzes_by_owner(&user.user_id).await,
  };
  let quizzes = listed.map_err(|e| {
    error!(target: "quiz", error = %e, "Error fetching assessments");
    let message = "Server error while fetching assessments";
    if state.settings.is_development() {
      ApiError::internal_with(message, e.to_string())
    } else {
      ApiError::internal(message)
    }
  })?;
  Ok(quizzes.iter().map(assessment_out).collect())
}

#[instrument(level = "info", skip(state))]
pub async fn user_questions(state: &AppState, user_id: Option<&str>) -> Result<Vec<AssessmentOut>, ApiError> {
  let user_id = user_id
    .filter(|u| parse_object_id(u).is_some())
    .ok_or_else(|| ApiError::bad_request("Invalid or missing userId"))?;
  let quizzes = state.store.quizzes_by_owner(user_id).await.map_err(db_error("Server error"))?;
  if quizzes.is_empty() {
    return Err(ApiError::NotFound("No questions found for this user".into()));
  }
  Ok(quizzes.iter().map(assessment_out).collect())
}

#[instrument(level = "info", skip(state))]
pub async fn delete_user_question(state: &AppState, id: &str) -> Result<MessageOut, ApiError> {
  let oid = parse_object_id(id).ok_or_else(|| ApiError::bad_request("Invalid question file id"))?;
  match state.store.delete_quiz(&oid).await.map_err(db_error("Internal server error"))? {
    Some(deleted) => {
      info!(target: "quiz", id = %deleted.id, name = %deleted.quiz_name, "Question file deleted");
      Ok(MessageOut::new("Question file deleted successfully"))
    }
    None => Err(ApiError::NotFound("Question file not found".into())),
  }
}

// -------- Results --------

/// Open-ended rows keep only the answer and its similarity feedback.
fn shape_details(details: Vec<ResultDetail>, kind: QuestionType) -> Vec<ResultDetail> {
  match kind {
    QuestionType::Mcq => details,
    QuestionType::OpenEnded => details
      .into_iter()
      .map(|d| ResultDetail { correct_answer: None, feedback: Some(d.feedback.unwrap_or_default()), ..d })
      .collect(),
  }
}

async fn quiz_title(state: &AppState, id: &ObjectId) -> Result<Option<String>, StoreError> {
  Ok(state.store.find_quiz(id).await?.map(|q| q.quiz_name))
}

#[instrument(level = "info", skip(state, body))]
pub async fn save_result(state: &AppState, body: ResultIn) -> Result<ResultOut, ApiError> {
  let student_id = body
    .student_id
    .as_deref()
    .filter(|s| parse_object_id(s).is_some())
    .ok_or_else(|| ApiError::bad_request("Invalid studentId format"))?
    .trim()
    .to_string();
  let assessment_id = body
    .assessment_id
    .as_deref()
    .and_then(parse_object_id)
    .ok_or_else(|| ApiError::bad_request("Invalid assessmentId format"))?;

  let raw_score = body.score.as_f64().unwrap_or(0.0);
  let score = clamp_percent(raw_score);
  if score != raw_score {
    warn!(target: "results", raw_score, score, "Score clamped into [0, 100]");
  }
  let kind = body.question_type.unwrap_or_default();

  let doc = ResultDoc {
    id: ObjectId::new(),
    student_id,
    assessment_id,
    score,
    completed_at: Utc::now(),
    question_type: kind,
    details: shape_details(body.details, kind),
  };
  let saved = state.store.insert_result(doc).await.map_err(db_error("Error saving result"))?;
  // The result is already stored; a failed title lookup only loses the enrichment.
  let title = match quiz_title(state, &saved.assessment_id).await {
    Ok(Some(t)) => Some(t),
    Ok(None) => {
      warn!(target: "results", assessment = %saved.assessment_id, "Result references a missing assessment");
      None
    }
    Err(e) => {
      error!(target: "results", error = %e, assessment = %saved.assessment_id, "Assessment title lookup failed");
      None
    }
  };
  info!(target: "results", id = %saved.id, student = %saved.student_id, score = saved.score, "Result saved");
  Ok(result_out(&saved, title))
}

#[instrument(level = "info", skip(state))]
pub async fn results_for_student(state: &AppState, student_id: Option<&str>) -> Result<Vec<ResultOut>, ApiError> {
  let student_id = student_id
    .map(str::trim)
    .filter(|s| parse_object_id(s).is_some())
    .ok_or_else(|| ApiError::bad_request("Valid studentId required"))?;
  let results = state
    .store
    .results_by_student(student_id)
    .await
    .map_err(db_error("Error fetching results"))?;

  let mut titles: HashMap<ObjectId, Option<String>> = HashMap::new();
  let mut out = Vec::with_capacity(results.len());
  for r in &results {
    let title = match titles.get(&r.assessment_id) {
      Some(t) => t.clone(),
      None => {
        let t = quiz_title(state, &r.assessment_id).await.map_err(db_error("Error fetching results"))?;
        titles.insert(r.assessment_id, t.clone());
        t
      }
    };
    out.push(result_out(r, title));
  }
  Ok(out)
}

#[instrument(level = "info", skip(state))]
pub async fn results_for_assessment(
  state: &AppState,
  assessment_id: Option<&str>,
) -> Result<Vec<AssessmentResultOut>, ApiError> {
  let assessment_id = assessment_id
    .and_then(parse_object_id)
    .ok_or_else(|| ApiError::bad_request("Invalid assessmentId"))?;
  let results = state
    .store
    .results_by_assessment(&assessment_id)
    .await
    .map_err(db_error("Error fetching results"))?;

  let mut out = Vec::with_capacity(results.len());
  for r in &results {
    let name = match parse_object_id(&r.student_id) {
      Some(uid) => state
        .store
        .find_user(&uid)
        .await
        .map_err(db_error("Error fetching results"))?
        .map(|u| u.name),
      None => None,
    };
    out.push(assessment_result_out(r, name));
  }
  Ok(out)
}

// -------- Auth --------

#[instrument(level = "info", skip(state, body))]
pub async fn register(state: &AppState, body: RegisterIn) -> Result<AuthOut, ApiError> {
  let missing = || ApiError::bad_request("Missing required fields");
  let name = non_blank(&body.name).ok_or_else(missing)?.to_string();
  let email = non_blank(&body.email).ok_or_else(missing)?.to_lowercase();
  let password = body.password.as_deref().filter(|p| !p.is_empty()).ok_or_else(missing)?;
  let role = body.role.ok_or_else(missing)?;
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ApiError::bad_request(format!("Password must be at least {} characters", MIN_PASSWORD_LEN)));
  }

  let user = UserDoc {
    id: ObjectId::new(),
    name,
    email,
    password_hash: hash_password(password)?,
    role,
    created_at: Utc::now(),
  };
  let saved = match state.store.insert_user(user).await {
    Ok(u) => u,
    Err(StoreError::Duplicate(_)) => return Err(ApiError::Conflict("User already exists".into())),
    Err(e) => return Err(db_error("Error registering user")(e)),
  };
  let token = issue_token(&saved.id.to_hex(), saved.role, &state.settings.jwt_secret)?;
  info!(target: "auth", id = %saved.id, role = saved.role.as_str(), "User registered");
  Ok(AuthOut { token, user: user_out(&saved) })
}

#[instrument(level = "info", skip(state, body))]
pub async fn login(state: &AppState, body: LoginIn) -> Result<AuthOut, ApiError> {
  let missing = || ApiError::bad_request("Missing required fields");
  let email = non_blank(&body.email).ok_or_else(missing)?.to_lowercase();
  let password = body.password.as_deref().filter(|p| !p.is_empty()).ok_or_else(missing)?;

  let invalid = || ApiError::Unauthorized("Invalid credentials".into());
  let user = state
    .store
    .find_user_by_email(&email)
    .await
    .map_err(db_error("Error signing in"))?
    .ok_or_else(invalid)?;
  if !verify_password(password, &user.password_hash) {
    warn!(target: "auth", id = %user.id, "Password mismatch");
    return Err(invalid());
  }
  if let Some(role) = body.role {
    if role != user.role {
      return Err(ApiError::Forbidden(format!("This account is registered as a {}", user.role.as_str())));
    }
  }

  let token = issue_token(&user.id.to_hex(), user.role, &state.settings.jwt_secret)?;
  info!(target: "auth", id = %user.id, role = user.role.as_str(), "User signed in");
  Ok(AuthOut { token, user: user_out(&user) })
}

// -------- Evaluation & generation --------

#[instrument(level = "info", skip(state, body))]
pub async fn evaluate_answer(state: &AppState, body: EvaluateIn) -> Result<EvaluateOut, ApiError> {
  let (Some(context), Some(question), Some(user_answer)) =
    (non_blank(&body.context), non_blank(&body.question), non_blank(&body.user_answer))
  else {
    return Err(ApiError::bad_request("All fields are required"));
  };
  let req = EvaluateRequest {
    context: context.to_string(),
    question: question.to_string(),
    user_answer: user_answer.to_string(),
  };
  match state.evaluator.evaluate_raw(&req).await {
    Ok(evaluation) => Ok(EvaluateOut { success: true, evaluation }),
    Err(e) => {
      error!(target: "evaluation", error = %e, question = %trunc_for_log(question, 80), "Answer evaluation failed");
      Err(ApiError::internal_with("Answer evaluation failed", e.detail()))
    }
  }
}

fn checked_count(n: i64) -> Result<usize, ApiError> {
  if !(1..=MAX_GENERATED_QUESTIONS).contains(&n) {
    return Err(ApiError::bad_request(format!(
      "numQuestions must be between 1 and {}",
      MAX_GENERATED_QUESTIONS
    )));
  }
  Ok(n as usize)
}

async fn run_generator(
  state: &AppState,
  context: &str,
  n: usize,
  kind: QuestionType,
  taxonomy_level: Option<&str>,
) -> Result<GeneratedSet, ApiError> {
  let oa = state
    .openai
    .as_ref()
    .ok_or_else(|| ApiError::Unavailable("Question generation is not configured".into()))?;
  let context = decode_context(context);
  oa.generate_questions(&state.prompts, &context, n, kind, taxonomy_level)
    .await
    .map_err(|_| ApiError::internal("Question generation failed"))
}

/// `/generate-question`. Defaults to open-ended questions.
#[instrument(level = "info", skip(state, body))]
pub async fn generate_question(state: &AppState, body: GenerateQuestionIn) -> Result<GeneratedSet, ApiError> {
  let missing = || ApiError::bad_request("Missing context or number of questions");
  let context = non_blank(&body.context).ok_or_else(missing)?;
  let n = body.num_questions.filter(|n| *n != 0).ok_or_else(missing)?;
  let n = checked_count(n)?;
  let kind = body.question_type.unwrap_or(QuestionType::OpenEnded);
  run_generator(state, context, n, kind, body.taxonomy_level.as_deref()).await
}

/// `/api/questions/generate`. Defaults to five MCQs.
#[instrument(level = "info", skip(state, body))]
pub async fn generate_from_text(state: &AppState, body: GenerateIn) -> Result<GeneratedOut, ApiError> {
  let text = non_blank(&body.input_text).ok_or_else(|| ApiError::bad_request("Missing input text"))?;
  let n = checked_count(body.num_questions.unwrap_or(DEFAULT_GENERATED_QUESTIONS))?;
  let kind = body.kind.unwrap_or(QuestionType::Mcq);
  let questions = match run_generator(state, text, n, kind, body.taxonomy_level.as_deref()).await? {
    GeneratedSet::Mcq(mcqs) => mcqs.into_iter().map(GeneratedItem::Mcq).collect(),
    GeneratedSet::Open(qs) => qs.into_iter().map(|question| GeneratedItem::Open { question }).collect(),
  };
  Ok(GeneratedOut { questions })
}

/// Extract text from an uploaded file. PDF parsing is CPU-bound, so it runs on
/// the blocking pool.
#[instrument(level = "info", skip(bytes), fields(size = bytes.len()))]
pub async fn extract_upload(file_name: String, bytes: Vec<u8>) -> Result<UploadOut, ApiError> {
  let joined = tokio::task::spawn_blocking(move || extract_text(&file_name, &bytes)).await;
  match joined {
    Ok(Ok(content)) => Ok(UploadOut { content }),
    Ok(Err(ExtractError::Unsupported)) => Err(ApiError::bad_request("Unsupported file format")),
    Ok(Err(e)) => {
      error!(target: "quizwise", error = %e, "File read error");
      Err(ApiError::internal("Failed to extract text from file"))
    }
    Err(e) => {
      error!(target: "quizwise", error = %e, "Extraction task failed");
      Err(ApiError::internal("Failed to extract text from file"))
    }
  }
}
