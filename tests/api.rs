//! Router-level tests against the in-memory store, plus one end-to-end run of
//! an assessment session over a real socket.

use std::sync::Arc;

use axum::{
  body::{to_bytes, Body},
  http::{header, Method, Request, StatusCode},
  routing::post,
  Json, Router,
};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use quizwise::auth::issue_token;
use quizwise::client::ApiClient;
use quizwise::config::{Prompts, Settings};
use quizwise::domain::{AnswerValue, QuestionType, QuizDoc, ResultDoc, Role, UserDoc};
use quizwise::error::StoreError;
use quizwise::evaluator::Evaluator;
use quizwise::protocol::{QuestionIn, QuizIn};
use quizwise::routes::build_router;
use quizwise::session::{AssessmentSession, Phase, Step};
use quizwise::state::AppState;
use quizwise::store::{MemoryStore, Store};

fn state_with_evaluator(url: &str) -> Arc<AppState> {
  Arc::new(AppState::new(
    Arc::new(MemoryStore::new()),
    None,
    Evaluator::new(url),
    Prompts::default(),
    Settings::default(),
  ))
}

fn test_state() -> Arc<AppState> {
  state_with_evaluator("http://127.0.0.1:9/evaluate")
}

/// In-memory store whose quiz reads can be switched to fail like a dropped connection.
#[derive(Default)]
struct FlakyStore {
  inner: MemoryStore,
  fail_listing: bool,
  fail_lookup: bool,
}

fn connection_lost() -> StoreError {
  let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
  StoreError::Database(mongodb::error::Error::from(io))
}

#[async_trait]
impl Store for FlakyStore {
  async fn insert_quiz(&self, quiz: QuizDoc) -> Result<QuizDoc, StoreError> {
    self.inner.insert_quiz(quiz).await
  }
  async fn all_quizzes(&self) -> Result<Vec<QuizDoc>, StoreError> {
    if self.fail_listing {
      return Err(connection_lost());
    }
    self.inner.all_quizzes().await
  }
  async fn quizzes_by_owner(&self, user_id: &str) -> Result<Vec<QuizDoc>, StoreError> {
    if self.fail_listing {
      return Err(connection_lost());
    }
    self.inner.quizzes_by_owner(user_id).await
  }
  async fn find_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError> {
    if self.fail_lookup {
      return Err(connection_lost());
    }
    self.inner.find_quiz(id).await
  }
  async fn delete_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError> {
    self.inner.delete_quiz(id).await
  }
  async fn insert_result(&self, result: ResultDoc) -> Result<ResultDoc, StoreError> {
    self.inner.insert_result(result).await
  }
  async fn results_by_student(&self, student_id: &str) -> Result<Vec<ResultDoc>, StoreError> {
    self.inner.results_by_student(student_id).await
  }
  async fn results_by_assessment(&self, assessment_id: &ObjectId) -> Result<Vec<ResultDoc>, StoreError> {
    self.inner.results_by_assessment(assessment_id).await
  }
  async fn insert_user(&self, user: UserDoc) -> Result<UserDoc, StoreError> {
    self.inner.insert_user(user).await
  }
  async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
    self.inner.find_user_by_email(email).await
  }
  async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>, StoreError> {
    self.inner.find_user(id).await
  }
}

fn state_with_store(store: Arc<dyn Store>, settings: Settings) -> Arc<AppState> {
  Arc::new(AppState::new(store, None, Evaluator::new("http://127.0.0.1:9/evaluate"), Prompts::default(), settings))
}

/// Single-part multipart body; returns (content type, body).
fn multipart_body(field: &str, file_name: &str, content: &str) -> (String, String) {
  let boundary = "quizwise-test-boundary";
  let body = format!(
    "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{boundary}--\r\n"
  );
  (format!("multipart/form-data; boundary={boundary}"), body)
}

async fn upload(app: &Router, field: &str, file_name: &str, content: &str) -> (StatusCode, Value) {
  let (content_type, body) = multipart_body(field, file_name, content);
  let req = Request::builder()
    .method(Method::POST)
    .uri("/api/questions/upload")
    .header(header::CONTENT_TYPE, content_type)
    .body(Body::from(body))
    .unwrap();
  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(t) = token {
    req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
  }
  let req = match body {
    Some(b) => req
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(b.to_string()))
      .unwrap(),
    None => req.body(Body::empty()).unwrap(),
  };
  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, json)
}

/// Evaluation service stand-in: "good" scores 80, "fair" 60, anything else fails.
async fn spawn_mock_evaluator() -> String {
  async fn evaluate(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let answer = body["userAnswer"].as_str().unwrap_or_default().to_string();
    let score = match answer.as_str() {
      "good" => 80.0,
      "fair" => 60.0,
      _ => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "model unavailable" }))),
    };
    (
      StatusCode::OK,
      Json(json!({
        "modelAnswer": "Plants turn light into chemical energy.",
        "userAnswer": answer,
        "score": score,
        "feedback": "Good understanding",
        "similarityScore": score
      })),
    )
  }
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, Router::new().route("/evaluate", post(evaluate))).await.unwrap();
  });
  format!("http://{addr}/evaluate")
}

async fn spawn_app(state: Arc<AppState>) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, build_router(state)).await.unwrap();
  });
  format!("http://{addr}")
}

fn mcq_quiz(user_id: &str) -> Value {
  json!({
    "userId": user_id,
    "quizName": "Photosynthesis",
    "context": "Plants convert light into chemical energy.",
    "questionType": "mcq",
    "questions": [
      { "question": "What do plants absorb?", "options": ["Light", "Sound"], "correctAnswer": 0 },
      { "question": "Where does it happen?" }
    ]
  })
}

#[tokio::test]
async fn health_is_ok() {
  let app = build_router(test_state());
  let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn quiz_missing_a_field_is_rejected_and_not_stored() {
  let state = test_state();
  let app = build_router(state.clone());
  let mut quiz = mcq_quiz(&ObjectId::new().to_hex());
  quiz.as_object_mut().unwrap().remove("context");

  let (status, body) = call(&app, Method::POST, "/save-quiz", None, Some(quiz.clone())).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Missing required fields");

  let (status, _) = call(&app, Method::POST, "/save-questions", None, Some(quiz)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(state.store.all_quizzes().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_gets_the_error_envelope() {
  let app = build_router(test_state());
  let req = Request::builder()
    .method(Method::POST)
    .uri("/save-quiz")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let res = app.oneshot(req).await.unwrap();
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  let body: Value = serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn saved_questions_are_listed_then_deleted_once() {
  let app = build_router(test_state());
  let owner = ObjectId::new().to_hex();

  let (status, body) = call(&app, Method::POST, "/save-questions", None, Some(mcq_quiz(&owner))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Quiz saved successfully");

  let (status, body) = call(&app, Method::GET, &format!("/api/user-questions?userId={owner}"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  let quiz = &body[0];
  assert_eq!(quiz["questions"][1]["options"], json!(["Option A", "Option B", "Option C", "Option D"]));
  assert_eq!(quiz["questions"][1]["correctAnswer"], 0);
  assert_eq!(quiz["questions"][1]["context"], "Plants convert light into chemical energy.");
  let id = quiz["id"].as_str().unwrap().to_string();

  let (status, _) = call(&app, Method::DELETE, &format!("/api/user-questions/{id}"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, body) = call(&app, Method::DELETE, &format!("/api/user-questions/{id}"), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Question file not found");

  let (status, _) = call(&app, Method::DELETE, "/api/user-questions/not-an-id", None, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, _) = call(&app, Method::GET, &format!("/api/user-questions?userId={owner}"), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn results_are_validated_clamped_and_enriched() {
  let state = test_state();
  let app = build_router(state.clone());
  let owner = ObjectId::new().to_hex();
  call(&app, Method::POST, "/save-quiz", None, Some(mcq_quiz(&owner))).await;
  let quiz_id = state.store.all_quizzes().await.unwrap()[0].id.to_hex();
  let student = ObjectId::new().to_hex();

  let (status, body) = call(&app, Method::GET, "/api/results?studentId=abc", None, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Valid studentId required");
  let (status, body) = call(&app, Method::GET, &format!("/api/results?studentId={student}"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));

  let bad = json!({ "studentId": "abc", "assessmentId": quiz_id, "score": 50 });
  let (status, body) = call(&app, Method::POST, "/api/results", None, Some(bad)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Invalid studentId format");

  let result = json!({
    "studentId": student,
    "assessmentId": quiz_id,
    "score": 140,
    "questionType": "mcq",
    "details": [{ "question": "What do plants absorb?", "userAnswer": 0, "correctAnswer": 0 }]
  });
  let (status, body) = call(&app, Method::POST, "/api/results", None, Some(result)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["score"], 100.0);
  assert_eq!(body["assessmentTitle"], "Photosynthesis");

  let (_, body) = call(&app, Method::GET, &format!("/api/results?studentId={student}"), None, None).await;
  assert_eq!(body.as_array().unwrap().len(), 1);
  let (status, body) = call(&app, Method::GET, &format!("/api/results/by-assessment?assessmentId={quiz_id}"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body[0]["studentName"], "Anonymous");
}

#[tokio::test]
async fn auth_flow_and_assessment_visibility() {
  let app = build_router(test_state());
  let register = |name: &str, email: &str, role: &str| {
    json!({ "name": name, "email": email, "password": "secret1", "role": role })
  };

  let (status, teacher) = call(&app, Method::POST, "/api/auth/register", None, Some(register("Tess", "tess@school.test", "teacher"))).await;
  assert_eq!(status, StatusCode::CREATED);
  let (status, _) = call(&app, Method::POST, "/api/auth/register", None, Some(register("Tess", "TESS@school.test", "teacher"))).await;
  assert_eq!(status, StatusCode::CONFLICT);
  let short = json!({ "name": "S", "email": "s@school.test", "password": "123", "role": "student" });
  let (status, _) = call(&app, Method::POST, "/api/auth/register", None, Some(short)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, student) = call(&app, Method::POST, "/api/auth/register", None, Some(register("Sam", "sam@school.test", "student"))).await;
  let teacher_token = teacher["token"].as_str().unwrap();
  let student_token = student["token"].as_str().unwrap();
  let teacher_id = teacher["user"]["id"].as_str().unwrap();

  call(&app, Method::POST, "/save-questions", None, Some(mcq_quiz(teacher_id))).await;
  call(&app, Method::POST, "/save-questions", None, Some(mcq_quiz(&ObjectId::new().to_hex()))).await;

  let (status, body) = call(&app, Method::GET, "/api/assessments", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "No token provided");
  let (status, body) = call(&app, Method::GET, "/api/assessments", Some("garbage"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "Invalid token");

  let (_, own) = call(&app, Method::GET, "/api/assessments", Some(teacher_token), None).await;
  assert_eq!(own.as_array().unwrap().len(), 1);
  let (_, all) = call(&app, Method::GET, "/api/assessments", Some(student_token), None).await;
  assert_eq!(all.as_array().unwrap().len(), 2);

  let login = json!({ "email": "sam@school.test", "password": "secret1", "role": "student" });
  let (status, body) = call(&app, Method::POST, "/api/auth/login", None, Some(login)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["user"]["name"], "Sam");
  let wrong = json!({ "email": "sam@school.test", "password": "nope!!", "role": "student" });
  let (status, body) = call(&app, Method::POST, "/api/auth/login", None, Some(wrong)).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "Invalid credentials");
  let role = json!({ "email": "sam@school.test", "password": "secret1", "role": "teacher" });
  let (status, _) = call(&app, Method::POST, "/api/auth/login", None, Some(role)).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn evaluation_is_relayed_verbatim() {
  let url = spawn_mock_evaluator().await;
  let app = build_router(state_with_evaluator(&url));

  let ok = json!({ "context": "c", "question": "What is photosynthesis?", "userAnswer": "good" });
  let (status, body) = call(&app, Method::POST, "/evaluate-answer", None, Some(ok)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
  assert_eq!(body["evaluation"]["score"], 80.0);
  assert_eq!(body["evaluation"]["feedback"], "Good understanding");

  let blank = json!({ "context": "c", "question": "  ", "userAnswer": "good" });
  let (status, body) = call(&app, Method::POST, "/evaluate-answer", None, Some(blank)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "All fields are required");

  let failing = json!({ "context": "c", "question": "q", "userAnswer": "nonsense" });
  let (status, body) = call(&app, Method::POST, "/evaluate-answer", None, Some(failing)).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], "Answer evaluation failed");
  assert_eq!(body["details"], "model unavailable");
}

#[tokio::test]
async fn generation_without_a_model_is_unavailable() {
  let app = build_router(test_state());
  let (status, body) = call(&app, Method::POST, "/generate-question", None, Some(json!({ "context": "text" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Missing context or number of questions");

  let req = json!({ "context": "text", "numQuestions": 3, "questionType": "mcq" });
  let (status, _) = call(&app, Method::POST, "/generate-question", None, Some(req)).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn listing_failure_exposes_details_only_in_development() {
  let token = issue_token(&ObjectId::new().to_hex(), Role::Student, &Settings::default().jwt_secret).unwrap();
  let failing = || Arc::new(FlakyStore { fail_listing: true, ..Default::default() });

  let dev = Settings { app_env: "development".into(), ..Settings::default() };
  let app = build_router(state_with_store(failing(), dev));
  let (status, body) = call(&app, Method::GET, "/api/assessments", Some(&token), None).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], "Server error while fetching assessments");
  assert!(body["details"].as_str().is_some_and(|d| d.contains("connection refused")));

  let app = build_router(state_with_store(failing(), Settings::default()));
  let (status, body) = call(&app, Method::GET, "/api/assessments", Some(&token), None).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], "Server error while fetching assessments");
  assert!(body.get("details").is_none());
}

#[tokio::test]
async fn stored_result_survives_a_failed_title_lookup() {
  let store = Arc::new(FlakyStore { fail_lookup: true, ..Default::default() });
  let app = build_router(state_with_store(store.clone(), Settings::default()));
  let student = ObjectId::new().to_hex();
  let result = json!({ "studentId": student, "assessmentId": ObjectId::new().to_hex(), "score": 80 });

  let (status, body) = call(&app, Method::POST, "/api/results", None, Some(result)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["score"], 80.0);
  assert!(body["assessmentTitle"].is_null());
  assert_eq!(store.results_by_student(&student).await.unwrap().len(), 1);
}

#[tokio::test]
async fn upload_needs_a_supported_file_field() {
  let app = build_router(test_state());

  let (status, body) = upload(&app, "notes", "notes.txt", "Chlorophyll absorbs light.").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "No file uploaded");

  let (status, body) = upload(&app, "file", "slides.pptx", "binary").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Unsupported file format");

  let (status, body) = upload(&app, "file", "notes.txt", "Chlorophyll absorbs light.").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["content"], "Chlorophyll absorbs light.");
}

#[tokio::test]
async fn open_ended_session_end_to_end() {
  let evaluator = spawn_mock_evaluator().await;
  let base = spawn_app(state_with_evaluator(&evaluator)).await;

  let mut client = ApiClient::new(&base);
  let me = client.register("Sam", "sam@school.test", "secret1", Role::Student).await.unwrap();

  let question = |text: &str| QuestionIn { question: Some(text.into()), ..Default::default() };
  let quiz = QuizIn {
    user_id: Some(ObjectId::new().to_hex()),
    quiz_name: Some("Energy".into()),
    context: Some("Plants convert light into chemical energy.".into()),
    questions: Some(vec![question("What is photosynthesis?"), question("Why is it important?"), question("Where?")]),
    question_type: Some(QuestionType::OpenEnded),
  };
  client.save_questions(&quiz).await.unwrap();

  let assessment = client.assessments().await.unwrap().remove(0);
  let mut session = AssessmentSession::start(assessment, me.user.id.clone()).unwrap();
  session.answer(AnswerValue::Text("good".into()));
  assert_eq!(session.next_question(&client).await.unwrap(), Step::Advanced(1));
  session.answer(AnswerValue::Text("fair".into()));
  session.next_question(&client).await.unwrap();
  session.answer(AnswerValue::Text("nonsense".into()));
  assert_eq!(session.next_question(&client).await.unwrap(), Step::Submitted);

  let Phase::Complete(done) = session.phase() else { panic!("session should be complete") };
  assert_eq!(done.score, 70.0);
  assert_eq!(done.result.assessment_title.as_deref(), Some("Energy"));
  assert_eq!(done.details[2].feedback.as_ref().unwrap().feedback_message, "No feedback");

  let saved = client.results_for_student(&me.user.id).await.unwrap();
  assert_eq!(saved.len(), 1);
  assert_eq!(saved[0].score, 70.0);

  let text = client.upload("notes.txt", b"Chlorophyll absorbs light.".to_vec()).await.unwrap();
  assert_eq!(text, "Chlorophyll absorbs light.");
}
