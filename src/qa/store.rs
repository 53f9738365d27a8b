//! The data store seam used by the Q&A core.

use std::future::Future;

use crate::errors::AppError;
use crate::models::{ClassSession, Question, Reply, VoterIdentity};

/// Table-level reads and single-row writes over classes, questions, upvotes
/// and replies.
///
/// Implementations must reject a second upvote for the same
/// (question, voter) pair with [`AppError::Conflict`].
pub trait QaStore: Send + Sync + 'static {
    fn get_class(
        &self,
        class_id: &str,
    ) -> impl Future<Output = Result<Option<ClassSession>, AppError>> + Send;

    /// Questions for a class, newest first.
    fn list_questions(
        &self,
        class_id: &str,
    ) -> impl Future<Output = Result<Vec<Question>, AppError>> + Send;

    fn count_upvotes(&self, question_id: &str)
        -> impl Future<Output = Result<i64, AppError>> + Send;

    fn has_upvoted(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Replies for a question, oldest first.
    fn list_replies(
        &self,
        question_id: &str,
    ) -> impl Future<Output = Result<Vec<Reply>, AppError>> + Send;

    fn insert_question(
        &self,
        class_id: &str,
        body: &str,
    ) -> impl Future<Output = Result<Question, AppError>> + Send;

    fn insert_upvote(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Returns `false` when there was no upvote to remove.
    fn delete_upvote(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn insert_reply(
        &self,
        question_id: &str,
        body: &str,
    ) -> impl Future<Output = Result<Reply, AppError>> + Send;

    fn set_answered(
        &self,
        question_id: &str,
        answered: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn set_qa_open(
        &self,
        class_id: &str,
        open: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn delete_question(&self, question_id: &str)
        -> impl Future<Output = Result<(), AppError>> + Send;

    fn delete_reply(&self, reply_id: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}
