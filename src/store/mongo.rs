//! MongoDB-backed store. One collection per document kind; no transactions.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use tracing::{info, instrument};

use super::{Store, QUIZZES, RESULTS, USERS};
use crate::domain::{QuizDoc, ResultDoc, UserDoc};
use crate::error::StoreError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and make sure the unique email index exists.
    /// `default_db` is used when the URI does not name a database.
    #[instrument(level = "info", skip(uri))]
    pub async fn connect(uri: &str, default_db: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(default_db));

        let store = Self { db };
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        store.users().create_index(email_index, None).await?;

        info!(target: "quizwise", db = %store.db.name(), "Connected to MongoDB");
        Ok(store)
    }

    fn quizzes(&self) -> Collection<QuizDoc> {
        self.db.collection(QUIZZES)
    }

    fn results(&self) -> Collection<ResultDoc> {
        self.db.collection(RESULTS)
    }

    fn users(&self) -> Collection<UserDoc> {
        self.db.collection(USERS)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl Store for MongoStore {
    #[instrument(level = "debug", skip(self, quiz), fields(id = %quiz.id))]
    async fn insert_quiz(&self, quiz: QuizDoc) -> Result<QuizDoc, StoreError> {
        self.quizzes().insert_one(&quiz, None).await?;
        Ok(quiz)
    }

    async fn all_quizzes(&self) -> Result<Vec<QuizDoc>, StoreError> {
        let cursor = self.quizzes().find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn quizzes_by_owner(&self, user_id: &str) -> Result<Vec<QuizDoc>, StoreError> {
        let opts = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
        let cursor = self.quizzes().find(doc! { "userId": user_id }, opts).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError> {
        Ok(self.quizzes().find_one(doc! { "_id": *id }, None).await?)
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    async fn delete_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError> {
        Ok(self.quizzes().find_one_and_delete(doc! { "_id": *id }, None).await?)
    }

    async fn insert_result(&self, result: ResultDoc) -> Result<ResultDoc, StoreError> {
        self.results().insert_one(&result, None).await?;
        Ok(result)
    }

    async fn results_by_student(&self, student_id: &str) -> Result<Vec<ResultDoc>, StoreError> {
        let cursor = self.results().find(doc! { "studentId": student_id }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn results_by_assessment(&self, assessment_id: &ObjectId) -> Result<Vec<ResultDoc>, StoreError> {
        let cursor = self
            .results()
            .find(doc! { "assessmentId": *assessment_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_user(&self, user: UserDoc) -> Result<UserDoc, StoreError> {
        match self.users().insert_one(&user, None).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate(format!("email {}", user.email))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": *id }, None).await?)
    }
}
