//! Public request/response shapes (serde ready) and the explicit mappings from
//! storage documents to them. Storage shapes live in `domain`.
//!
//! Incoming bodies keep required fields as `Option` so a missing field becomes
//! a descriptive 400 instead of a serde rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QuestionType, QuizDoc, ResultDetail, ResultDoc, Role, UserDoc};
use crate::openai::GeneratedMcq;

//
// Auth
//

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterIn {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginIn {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOut {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthOut {
    pub token: String,
    pub user: UserOut,
}

pub fn user_out(u: &UserDoc) -> UserOut {
    UserOut {
        id: u.id.to_hex(),
        name: u.name.clone(),
        email: u.email.clone(),
        role: u.role,
    }
}

//
// Quizzes
//

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionIn {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i64>,
    pub context: Option<String>,
}

/// Body of both `/save-quiz` and `/save-questions`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuizIn {
    pub user_id: Option<String>,
    pub quiz_name: Option<String>,
    pub context: Option<String>,
    pub questions: Option<Vec<QuestionIn>>,
    pub question_type: Option<QuestionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    /// Question-level context, or the quiz context when the question has none.
    pub context: String,
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentOut {
    pub id: String,
    pub user_id: String,
    pub quiz_name: String,
    pub context: String,
    pub question_type: QuestionType,
    pub questions: Vec<QuestionOut>,
    pub created_at: DateTime<Utc>,
}

pub fn assessment_out(q: &QuizDoc) -> AssessmentOut {
    AssessmentOut {
        id: q.id.to_hex(),
        user_id: q.user_id.clone(),
        quiz_name: q.quiz_name.clone(),
        context: q.context.clone(),
        question_type: q.question_type,
        questions: q
            .questions
            .iter()
            .map(|qq| QuestionOut {
                id: qq.id.clone(),
                question: qq.question.clone(),
                options: qq.options.clone(),
                correct_answer: qq.correct_answer,
                context: qq
                    .context
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| q.context.clone()),
                question_type: qq.question_type,
            })
            .collect(),
        created_at: q.created_at,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOut {
    pub message: String,
}

impl MessageOut {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

//
// Results
//

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultIn {
    pub student_id: Option<String>,
    pub assessment_id: Option<String>,
    /// Anything that is not a JSON number counts as 0.
    pub score: serde_json::Value,
    pub details: Vec<ResultDetail>,
    pub question_type: Option<QuestionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultOut {
    pub id: String,
    pub student_id: String,
    pub assessment_id: String,
    pub score: f64,
    pub completed_at: DateTime<Utc>,
    pub assessment_title: Option<String>,
    pub details: Vec<ResultDetail>,
}

/// `title` is the referenced quiz's name when it still exists.
pub fn result_out(r: &ResultDoc, title: Option<String>) -> ResultOut {
    ResultOut {
        id: r.id.to_hex(),
        student_id: r.student_id.clone(),
        assessment_id: r.assessment_id.to_hex(),
        score: r.score,
        completed_at: r.completed_at,
        assessment_title: title,
        details: r.details.clone(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResultOut {
    pub id: String,
    pub student_name: String,
    pub completed_at: DateTime<Utc>,
    pub score: f64,
}

pub fn assessment_result_out(r: &ResultDoc, student_name: Option<String>) -> AssessmentResultOut {
    AssessmentResultOut {
        id: r.id.to_hex(),
        student_name: student_name.unwrap_or_else(|| "Anonymous".into()),
        completed_at: r.completed_at,
        score: r.score,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuery {
    pub student_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentQuery {
    pub assessment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

//
// Evaluation, generation, upload
//

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluateIn {
    pub context: Option<String>,
    pub question: Option<String>,
    pub user_answer: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateOut {
    pub success: bool,
    pub evaluation: serde_json::Value,
}

/// Body of `/generate-question`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateQuestionIn {
    pub context: Option<String>,
    pub num_questions: Option<i64>,
    pub question_type: Option<QuestionType>,
    pub taxonomy_level: Option<String>,
}

/// Body of `/api/questions/generate`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateIn {
    pub input_text: Option<String>,
    pub num_questions: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<QuestionType>,
    pub taxonomy_level: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McqSetOut {
    pub mcqs: Vec<GeneratedMcq>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSetOut {
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GeneratedItem {
    Mcq(GeneratedMcq),
    Open { question: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedOut {
    pub questions: Vec<GeneratedItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadOut {
    pub content: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnswerValue, Feedback, QuestionDoc};
    use mongodb::bson::oid::ObjectId;

    fn quiz() -> QuizDoc {
        QuizDoc {
            id: ObjectId::new(),
            user_id: "teacher-1".into(),
            quiz_name: "Cells".into(),
            context: "Quiz context".into(),
            questions: vec![
                QuestionDoc {
                    id: "q1".into(),
                    question: "What is ATP?".into(),
                    options: None,
                    correct_answer: None,
                    context: Some("Own context".into()),
                    question_type: QuestionType::OpenEnded,
                },
                QuestionDoc {
                    id: "q2".into(),
                    question: "Where is DNA?".into(),
                    options: None,
                    correct_answer: None,
                    context: Some("  ".into()),
                    question_type: QuestionType::OpenEnded,
                },
            ],
            question_type: QuestionType::OpenEnded,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn question_context_falls_back_to_quiz_context() {
        let out = assessment_out(&quiz());
        assert_eq!(out.questions[0].context, "Own context");
        assert_eq!(out.questions[1].context, "Quiz context");
        assert_eq!(out.id.len(), 24);
    }

    #[test]
    fn result_wire_shape_flattens_ids() {
        let doc = ResultDoc {
            id: ObjectId::new(),
            student_id: "65f1c0ffee65f1c0ffee65f1".into(),
            assessment_id: ObjectId::new(),
            score: 70.0,
            completed_at: Utc::now(),
            question_type: QuestionType::OpenEnded,
            details: vec![ResultDetail {
                question: "What is ATP?".into(),
                user_answer: Some(AnswerValue::Text("energy".into())),
                correct_answer: None,
                feedback: Some(Feedback {
                    similarity_score: 80.0,
                    model_answer: "energy currency".into(),
                    feedback_message: "Good answer, but could be more precise.".into(),
                }),
            }],
        };
        let v = serde_json::to_value(result_out(&doc, Some("Cells".into()))).unwrap();
        assert_eq!(v["assessmentId"], doc.assessment_id.to_hex());
        assert_eq!(v["assessmentTitle"], "Cells");
        assert_eq!(v["details"][0]["feedback"]["similarityScore"], 80.0);
        assert!(v["details"][0].get("correctAnswer").is_none());

        let by_assessment = assessment_result_out(&doc, None);
        assert_eq!(by_assessment.student_name, "Anonymous");
    }

    #[test]
    fn generated_items_serialize_flat() {
        let items = vec![
            GeneratedItem::Open { question: "Why?".into() },
            GeneratedItem::Mcq(GeneratedMcq {
                question: "Which?".into(),
                options: vec!["A".into(), "B".into()],
                answer: "B".into(),
                correct_answer: 1,
            }),
        ];
        let v = serde_json::to_value(GeneratedOut { questions: items }).unwrap();
        assert_eq!(v["questions"][0], serde_json::json!({ "question": "Why?" }));
        assert_eq!(v["questions"][1]["correctAnswer"], 1);
    }
}
