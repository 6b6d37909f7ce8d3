//! Persistence seam. Handlers only see `dyn Store`; `MongoStore` talks to the
//! document database and `MemoryStore` keeps everything in process (tests,
//! local runs without MONGODB_URI).

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::domain::{QuizDoc, ResultDoc, UserDoc};
use crate::error::StoreError;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const QUIZZES: &str = "quizzes";
pub const RESULTS: &str = "results";
pub const USERS: &str = "users";

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_quiz(&self, quiz: QuizDoc) -> Result<QuizDoc, StoreError>;
    /// All quizzes in insertion order.
    async fn all_quizzes(&self) -> Result<Vec<QuizDoc>, StoreError>;
    /// Quizzes owned by `user_id`, newest first.
    async fn quizzes_by_owner(&self, user_id: &str) -> Result<Vec<QuizDoc>, StoreError>;
    async fn find_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError>;
    /// Returns the deleted document, `None` when nothing matched.
    async fn delete_quiz(&self, id: &ObjectId) -> Result<Option<QuizDoc>, StoreError>;

    async fn insert_result(&self, result: ResultDoc) -> Result<ResultDoc, StoreError>;
    async fn results_by_student(&self, student_id: &str) -> Result<Vec<ResultDoc>, StoreError>;
    async fn results_by_assessment(&self, assessment_id: &ObjectId) -> Result<Vec<ResultDoc>, StoreError>;

    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn insert_user(&self, user: UserDoc) -> Result<UserDoc, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError>;
    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>, StoreError>;
}
