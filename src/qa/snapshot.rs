//! Full-state reads of one class's Q&A.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;

use super::QaStore;
use crate::errors::AppError;
use crate::models::{ClassSession, Question, Reply, VoterIdentity};

/// A question with everything needed to display it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    #[serde(flatten)]
    pub question: Question,
    pub upvote_count: i64,
    pub user_has_upvoted: bool,
    pub replies: Vec<Reply>,
}

/// The state of a class's Q&A as of one load. Replaced wholesale on reload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub class: ClassSession,
    /// Most upvoted first; equal counts keep newest-first order.
    pub questions: Vec<QuestionEntry>,
}

impl Snapshot {
    pub fn question(&self, question_id: &str) -> Option<&QuestionEntry> {
        self.questions.iter().find(|q| q.question.id == question_id)
    }
}

/// Builds [`Snapshot`]s from a [`QaStore`].
pub struct SnapshotLoader<S> {
    store: Arc<S>,
}

impl<S> Clone for SnapshotLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: QaStore> SnapshotLoader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch the class, its questions and, per question, the vote count, the
    /// viewer's vote and the replies. Any failed read fails the whole load.
    ///
    /// Questions deleted while the load is running may still appear, with
    /// whatever counts were read for them.
    pub async fn load(
        &self,
        class_id: &str,
        voter: Option<&VoterIdentity>,
    ) -> Result<Snapshot, AppError> {
        let class = self
            .store
            .get_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {} not found", class_id)))?;

        let questions = self.store.list_questions(class_id).await?;
        let mut entries =
            try_join_all(questions.into_iter().map(|q| self.load_entry(q, voter))).await?;

        // Stable: ties stay in fetch order.
        entries.sort_by(|a, b| b.upvote_count.cmp(&a.upvote_count));

        tracing::debug!(
            class_id = %class_id,
            questions = entries.len(),
            "Loaded Q&A snapshot"
        );

        Ok(Snapshot {
            class,
            questions: entries,
        })
    }

    async fn load_entry(
        &self,
        question: Question,
        voter: Option<&VoterIdentity>,
    ) -> Result<QuestionEntry, AppError> {
        let voted = async {
            match voter {
                Some(voter) => self.store.has_upvoted(&question.id, voter).await,
                None => Ok(false),
            }
        };

        let (upvote_count, user_has_upvoted, replies) = tokio::try_join!(
            self.store.count_upvotes(&question.id),
            voted,
            self.store.list_replies(&question.id)
        )?;

        Ok(QuestionEntry {
            question,
            upvote_count,
            user_has_upvoted,
            replies,
        })
    }
}
