//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; logs include parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{FromRequest, Multipart, Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::logic::*;
use crate::openai::GeneratedSet;
use crate::protocol::*;
use crate::state::AppState;

/// `Json` whose rejections use the `{"error": ...}` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// -------- Auth --------

#[instrument(level = "info", skip(state, body))]
pub async fn http_register(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<RegisterIn>,
) -> Result<(StatusCode, Json<AuthOut>), ApiError> {
  let out = register(&state, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_login(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<LoginIn>,
) -> Result<Json<AuthOut>, ApiError> {
  Ok(Json(login(&state, body).await?))
}

// -------- Quizzes --------

#[instrument(level = "info", skip(state, body), fields(quiz_name = ?body.quiz_name))]
pub async fn http_save_quiz(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<QuizIn>,
) -> Result<(StatusCode, Json<MessageOut>), ApiError> {
  save_quiz(&state, body).await?;
  Ok((StatusCode::CREATED, Json(MessageOut::new("Quiz saved successfully"))))
}

#[instrument(level = "info", skip(state, body), fields(quiz_name = ?body.quiz_name, kind = ?body.question_type))]
pub async fn http_save_questions(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<QuizIn>,
) -> Result<Json<MessageOut>, ApiError> {
  save_question_set(&state, body).await?;
  Ok(Json(MessageOut::new("Quiz saved successfully")))
}

#[instrument(level = "info", skip(state), fields(user = %user.user_id))]
pub async fn http_list_assessments(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
) -> Result<Json<Vec<AssessmentOut>>, ApiError> {
  let out = list_assessments(&state, &user).await?;
  info!(target: "quiz", count = out.len(), role = user.role.as_str(), "Assessments listed");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_user_questions(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Result<Json<Vec<AssessmentOut>>, ApiError> {
  Ok(Json(user_questions(&state, q.user_id.as_deref()).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_user_question(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<MessageOut>, ApiError> {
  Ok(Json(delete_user_question(&state, &id).await?))
}

// -------- Results --------

#[instrument(level = "info", skip(state, body), fields(student = ?body.student_id, assessment = ?body.assessment_id))]
pub async fn http_save_result(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<ResultIn>,
) -> Result<(StatusCode, Json<ResultOut>), ApiError> {
  let out = save_result(&state, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_results_for_student(
  State(state): State<Arc<AppState>>,
  Query(q): Query<StudentQuery>,
) -> Result<Json<Vec<ResultOut>>, ApiError> {
  Ok(Json(results_for_student(&state, q.student_id.as_deref()).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_results_for_assessment(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AssessmentQuery>,
) -> Result<Json<Vec<AssessmentResultOut>>, ApiError> {
  Ok(Json(results_for_assessment(&state, q.assessment_id.as_deref()).await?))
}

// -------- Evaluation, generation, upload --------

#[instrument(level = "info", skip(state, body))]
pub async fn http_evaluate_answer(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<EvaluateIn>,
) -> Result<Json<EvaluateOut>, ApiError> {
  Ok(Json(evaluate_answer(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(num = ?body.num_questions, kind = ?body.question_type))]
pub async fn http_generate_question(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<GenerateQuestionIn>,
) -> Result<Response, ApiError> {
  let out = match generate_question(&state, body).await? {
    GeneratedSet::Mcq(mcqs) => {
      info!(target: "generation", count = mcqs.len(), "MCQs generated");
      Json(McqSetOut { mcqs }).into_response()
    }
    GeneratedSet::Open(questions) => {
      info!(target: "generation", count = questions.len(), "Open questions generated");
      Json(OpenSetOut { questions }).into_response()
    }
  };
  Ok(out)
}

#[instrument(level = "info", skip(state, body), fields(num = ?body.num_questions, kind = ?body.kind))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  AppJson(body): AppJson<GenerateIn>,
) -> Result<Json<GeneratedOut>, ApiError> {
  Ok(Json(generate_from_text(&state, body).await?))
}

/// Multipart upload; the document is read from the `file` field.
#[instrument(level = "info", skip(multipart))]
pub async fn http_upload(mut multipart: Multipart) -> Result<Json<UploadOut>, ApiError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::bad_request(e.body_text()))?
  {
    if field.name() != Some("file") {
      continue;
    }
    let file_name = field.file_name().unwrap_or_default().to_string();
    let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
    info!(target: "quizwise", %file_name, size = bytes.len(), "Upload received");
    return Ok(Json(extract_upload(file_name, bytes.to_vec()).await?));
  }
  Err(ApiError::bad_request("No file uploaded"))
}
