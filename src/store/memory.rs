//! In-process store. Same contract as the MongoDB store, kept in `RwLock`ed vectors.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;
use tracing::instrument;

use super::Store;
use crate::domain::{QuizDoc, ResultDoc, UserDoc};
use crate::error::StoreError;

#[derive(Clone, Default)]
pub struct MemoryStore {
    quizzes: Arc<RwLock<Vec<QuizDoc>>>,
    results: Arc<RwLock<Vec<ResultDoc>>>,
    users: Arc<RwLock<Vec<UserDoc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[instrument(level = "debug", skip(self, quiz), fields(id = %quiz.id))]
    async fn insert_quiz(&self, quiz: QuizDoc) -> Result<QuizDoc, StoreError> {
        self.quizzes.write().await.push(quiz.clone());
        Ok(quiz)
    }

    async fn all_quizzes(&self) -> Result<Vec<QuizDoc>, StoreError> {
        Ok(self.quizzes.read().await.clone())
    }

    async fn quizzes_by_owner(&self, user_id: &str) -> Result<Vec<QuizDoc>, StoreError> {
        let mut owned: Vec<QuizDoc> = self
            .quizzes
            .read()
            .await
            .iter()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect();
        // stable sort keeps later inserts first among equal timestamps
        owned.reverse();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError> {
        Ok(self.quizzes.read().await.iter().find(|q| &q.id == id).cloned())
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    async fn delete_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError> {
        let mut quizzes = self.quizzes.write().await;
        Ok(quizzes
            .iter()
            .position(|q| &q.id == id)
            .map(|idx| quizzes.remove(idx)))
    }

    async fn insert_result(&self, result: ResultDoc) -> Result<ResultDoc, StoreError> {
        self.results.write().await.push(result.clone());
        Ok(result)
    }

    async fn results_by_student(&self, student_id: &str) -> Result<Vec<ResultDoc>, StoreError> {
        Ok(self
            .results
            .read()
            .await
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn results_by_assessment(&self, assessment_id: &ObjectId) -> Result<Vec<ResultDoc>, StoreError> {
        Ok(self
            .results
            .read()
            .await
            .iter()
            .filter(|r| &r.assessment_id == assessment_id)
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: UserDoc) -> Result<UserDoc, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| &u.id == id).cloned())
    }
}
