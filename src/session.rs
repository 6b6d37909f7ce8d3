//! Assessment-taking state machine: one student working through one assessment.
//!
//! A session is `InProgress` (index, answers, running MCQ tally) until the last
//! `next_question` submits the attempt; a successful submission moves it to
//! `Complete`. A failed submission leaves every field as it was and raises a
//! notice that disappears after [`NOTICE_TTL`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::client::ClientError;
use crate::domain::{AnswerValue, Feedback, QuestionType, ResultDetail};
use crate::evaluator::{EvaluateRequest, Evaluation};
use crate::protocol::{AssessmentOut, QuestionOut, ResultIn, ResultOut};
use crate::scoring::{mcq_score, mean_score};
use crate::util::clamp_percent;

pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// What a session needs from the outside world to finish a run.
#[async_trait]
pub trait AssessmentBackend: Send + Sync {
  async fn evaluate(&self, req: EvaluateRequest) -> Result<Evaluation, ClientError>;
  async fn submit_result(&self, result: ResultIn) -> Result<ResultOut, ClientError>;
}

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("assessment has no questions")]
  EmptyAssessment,
  #[error("assessment already submitted")]
  AlreadyComplete,
  #[error("failed to submit result: {0}")]
  Submit(#[from] ClientError),
}

/// Final state of a submitted run.
#[derive(Debug, Clone)]
pub struct Completion {
  pub score: f64,
  pub details: Vec<ResultDetail>,
  pub result: ResultOut,
}

#[derive(Debug, Clone)]
pub enum Phase {
  InProgress,
  Complete(Completion),
}

#[derive(Debug, Clone)]
pub struct Notice {
  pub message: String,
  raised_at: Instant,
}

impl Notice {
  fn new(message: impl Into<String>) -> Self {
    Self { message: message.into(), raised_at: Instant::now() }
  }

  pub fn is_visible_at(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.raised_at) < NOTICE_TTL
  }
}

/// Result of `next_question`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  Advanced(usize),
  Submitted,
}

#[derive(Debug, Clone)]
pub struct AssessmentSession {
  assessment: AssessmentOut,
  student_id: String,
  index: usize,
  answers: Vec<Option<AnswerValue>>,
  correct_so_far: usize,
  phase: Phase,
  notice: Option<Notice>,
}

impl AssessmentSession {
  pub fn start(assessment: AssessmentOut, student_id: impl Into<String>) -> Result<Self, SessionError> {
    if assessment.questions.is_empty() {
      return Err(SessionError::EmptyAssessment);
    }
    let answers = vec![None; assessment.questions.len()];
    Ok(Self {
      assessment,
      student_id: student_id.into(),
      index: 0,
      answers,
      correct_so_far: 0,
      phase: Phase::InProgress,
      notice: None,
    })
  }

  pub fn assessment(&self) -> &AssessmentOut { &self.assessment }
  pub fn index(&self) -> usize { self.index }
  pub fn phase(&self) -> &Phase { &self.phase }
  pub fn answers(&self) -> &[Option<AnswerValue>] { &self.answers }

  pub fn current(&self) -> &QuestionOut {
    &self.assessment.questions[self.index]
  }

  pub fn is_last(&self) -> bool {
    self.index + 1 == self.assessment.questions.len()
  }

  /// Running MCQ percentage over answered-correctly questions.
  pub fn running_score(&self) -> f64 {
    mcq_score(self.correct_so_far, self.assessment.questions.len())
  }

  /// The current notice, if it has not expired yet.
  pub fn notice(&self) -> Option<&str> {
    self.notice_at(Instant::now())
  }

  pub fn notice_at(&self, now: Instant) -> Option<&str> {
    self.notice.as_ref().filter(|n| n.is_visible_at(now)).map(|n| n.message.as_str())
  }

  /// Record (or replace) the answer to the current question.
  pub fn answer(&mut self, value: AnswerValue) {
    if matches!(self.phase, Phase::Complete(_)) {
      return;
    }
    let question = &self.assessment.questions[self.index];
    if question.question_type == QuestionType::Mcq {
      let was = is_correct(question, self.answers[self.index].as_ref());
      let now = is_correct(question, Some(&value));
      match (was, now) {
        (false, true) => self.correct_so_far += 1,
        (true, false) => self.correct_so_far -= 1,
        _ => {}
      }
    }
    self.answers[self.index] = Some(value);
  }

  pub fn previous(&mut self) {
    if matches!(self.phase, Phase::InProgress) && self.index > 0 {
      self.index -= 1;
    }
  }

  /// Advance, or submit when on the last question.
  #[instrument(level = "info", skip(self, backend), fields(index = self.index, total = self.assessment.questions.len()))]
  pub async fn next_question(&mut self, backend: &dyn AssessmentBackend) -> Result<Step, SessionError> {
    if matches!(self.phase, Phase::Complete(_)) {
      return Err(SessionError::AlreadyComplete);
    }
    if !self.is_last() {
      self.index += 1;
      return Ok(Step::Advanced(self.index));
    }
    match self.submit(backend).await {
      Ok(completion) => {
        info!(target: "results", score = completion.score, "Assessment submitted");
        self.notice = None;
        self.phase = Phase::Complete(completion);
        Ok(Step::Submitted)
      }
      Err(e) => {
        warn!(target: "results", error = %e, "Submission failed");
        self.notice = Some(Notice::new(e.to_string()));
        Err(e.into())
      }
    }
  }

  pub fn restart(&mut self) {
    self.index = 0;
    self.answers = vec![None; self.assessment.questions.len()];
    self.correct_so_far = 0;
    self.phase = Phase::InProgress;
    self.notice = None;
  }

  /// Score the attempt and post it. Reads the session but never mutates it.
  async fn submit(&self, backend: &dyn AssessmentBackend) -> Result<Completion, ClientError> {
    let (score, details) = match self.assessment.question_type {
      QuestionType::Mcq => self.mcq_outcome(),
      QuestionType::OpenEnded => self.open_outcome(backend).await,
    };
    let result = backend
      .submit_result(ResultIn {
        student_id: Some(self.student_id.clone()),
        assessment_id: Some(self.assessment.id.clone()),
        score: serde_json::json!(score),
        details: details.clone(),
        question_type: Some(self.assessment.question_type),
      })
      .await?;
    Ok(Completion { score, details, result })
  }

  /// Recomputed from the stored answers; the running tally is display only.
  fn mcq_outcome(&self) -> (f64, Vec<ResultDetail>) {
    let questions = &self.assessment.questions;
    let correct = questions
      .iter()
      .zip(&self.answers)
      .filter(|(q, a)| is_correct(q, a.as_ref()))
      .count();
    let details = questions
      .iter()
      .zip(&self.answers)
      .map(|(q, a)| ResultDetail {
        question: q.question.clone(),
        user_answer: a.clone(),
        correct_answer: q.correct_answer.map(|c| c as i64),
        feedback: None,
      })
      .collect();
    (mcq_score(correct, questions.len()), details)
  }

  async fn open_outcome(&self, backend: &dyn AssessmentBackend) -> (f64, Vec<ResultDetail>) {
    let requests = self.assessment.questions.iter().zip(&self.answers).map(|(q, a)| {
      backend.evaluate(EvaluateRequest {
        context: q.context.clone(),
        question: q.question.clone(),
        user_answer: answer_text(a.as_ref()),
      })
    });
    let evaluations = join_all(requests).await;

    let mut scores = Vec::new();
    let mut details = Vec::with_capacity(evaluations.len());
    for ((q, a), evaluation) in self.assessment.questions.iter().zip(&self.answers).zip(evaluations) {
      let feedback = match evaluation {
        Ok(e) => {
          let similarity = clamp_percent(e.score);
          if e.score.is_finite() {
            scores.push(similarity);
          }
          Feedback {
            similarity_score: similarity,
            model_answer: e.model_answer,
            feedback_message: if e.feedback.is_empty() { "No feedback".into() } else { e.feedback },
          }
        }
        Err(e) => {
          warn!(target: "evaluation", error = %e, question = %q.question, "Evaluation failed");
          Feedback { similarity_score: 0.0, model_answer: String::new(), feedback_message: "No feedback".into() }
        }
      };
      details.push(ResultDetail {
        question: q.question.clone(),
        user_answer: a.clone(),
        correct_answer: None,
        feedback: Some(feedback),
      });
    }
    (mean_score(&scores), details)
  }
}

fn is_correct(question: &QuestionOut, answer: Option<&AnswerValue>) -> bool {
  match (question.correct_answer, answer) {
    (Some(c), Some(AnswerValue::Choice(a))) => i64::try_from(c).is_ok_and(|c| c == *a),
    _ => false,
  }
}

fn answer_text(answer: Option<&AnswerValue>) -> String {
  match answer {
    Some(AnswerValue::Text(t)) => t.clone(),
    Some(AnswerValue::Choice(c)) => c.to_string(),
    None => String::new(),
  }
}
