//! HTTP client for the Quizwise API, used by the assessment session and by
//! anything that drives the server from the outside.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::Role;
use crate::evaluator::{extract_upstream_error, EvaluateRequest, Evaluation};
use crate::protocol::{AssessmentOut, AuthOut, EvaluateOut, QuizIn, ResultIn, ResultOut, UploadOut};
use crate::session::AssessmentBackend;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// Register and keep the returned token for later calls.
    #[instrument(level = "info", skip(self, password))]
    pub async fn register(&mut self, name: &str, email: &str, password: &str, role: Role) -> Result<AuthOut, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password, "role": role });
        let out: AuthOut = read_json(self.http.post(self.url("/api/auth/register")).json(&body).send().await?).await?;
        self.token = Some(out.token.clone());
        Ok(out)
    }

    /// Log in and keep the returned token for later calls.
    #[instrument(level = "info", skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str, role: Role) -> Result<AuthOut, ClientError> {
        let body = json!({ "email": email, "password": password, "role": role });
        let out: AuthOut = read_json(self.http.post(self.url("/api/auth/login")).json(&body).send().await?).await?;
        self.token = Some(out.token.clone());
        Ok(out)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn assessments(&self) -> Result<Vec<AssessmentOut>, ClientError> {
        read_json(self.authed(self.http.get(self.url("/api/assessments"))).send().await?).await
    }

    #[instrument(level = "info", skip(self, quiz))]
    pub async fn save_questions(&self, quiz: &QuizIn) -> Result<(), ClientError> {
        let res = self.authed(self.http.post(self.url("/save-questions"))).json(quiz).send().await?;
        read_json::<serde_json::Value>(res).await.map(|_| ())
    }

    #[instrument(level = "info", skip(self))]
    pub async fn results_for_student(&self, student_id: &str) -> Result<Vec<ResultOut>, ClientError> {
        let req = self.http.get(self.url("/api/results")).query(&[("studentId", student_id)]);
        read_json(self.authed(req).send().await?).await
    }

    #[instrument(level = "info", skip(self, result))]
    pub async fn save_result(&self, result: &ResultIn) -> Result<ResultOut, ClientError> {
        read_json(self.authed(self.http.post(self.url("/api/results"))).json(result).send().await?).await
    }

    /// `POST /evaluate-answer`, unwrapping the relayed evaluation.
    #[instrument(level = "info", skip(self, req), fields(question = %req.question))]
    pub async fn evaluate_answer(&self, req: &EvaluateRequest) -> Result<Evaluation, ClientError> {
        let out: EvaluateOut = read_json(self.authed(self.http.post(self.url("/evaluate-answer"))).json(req).send().await?).await?;
        serde_json::from_value(out.evaluation).map_err(|e| ClientError::Decode(e.to_string()))
    }

    #[instrument(level = "info", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ClientError> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let req = self.authed(self.http.post(self.url("/api/questions/upload"))).multipart(form);
        let out: UploadOut = read_json(req.send().await?).await?;
        Ok(out.content)
    }
}

/// Decode a success body, or turn the `{"error": ...}` envelope into `ClientError::Api`.
async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        debug!(target: "quizwise", status = status.as_u16(), %body, "API call failed");
        let message = extract_upstream_error(&body).unwrap_or(body);
        return Err(ClientError::Api { status: status.as_u16(), message });
    }
    serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl AssessmentBackend for ApiClient {
    async fn evaluate(&self, req: EvaluateRequest) -> Result<Evaluation, ClientError> {
        self.evaluate_answer(&req).await
    }

    async fn submit_result(&self, result: ResultIn) -> Result<ResultOut, ClientError> {
        self.save_result(&result).await
    }
}
