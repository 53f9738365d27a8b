//! Single-write mutations behind each Q&A action.
//!
//! The gateway never touches a snapshot. Callers reload after a write.

use std::sync::Arc;

use serde::Serialize;

use super::QaStore;
use crate::errors::AppError;
use crate::models::{ClassSession, Question, Reply, Role, VoterIdentity};

/// Result of an upvote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpvoteOutcome {
    Added,
    Removed,
    /// The store already had this vote.
    AlreadyVoted,
    /// There was no vote left to remove.
    AlreadyRemoved,
}

impl UpvoteOutcome {
    /// Whether the voter holds a vote after the toggle.
    pub fn voted(&self) -> bool {
        matches!(self, UpvoteOutcome::Added | UpvoteOutcome::AlreadyVoted)
    }
}

/// Applies viewer actions to a [`QaStore`].
pub struct MutationGateway<S> {
    store: Arc<S>,
    role: Role,
}

impl<S> Clone for MutationGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            role: self.role,
        }
    }
}

impl<S: QaStore> MutationGateway<S> {
    pub fn new(store: Arc<S>, role: Role) -> Self {
        Self { store, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Ask a question in `class`, as last seen by the viewer.
    ///
    /// Rejected without touching the store when the Q&A is closed or the
    /// text is blank.
    pub async fn submit_question(
        &self,
        class: &ClassSession,
        text: &str,
    ) -> Result<Question, AppError> {
        if !class.qa_open {
            return Err(AppError::Validation(format!(
                "Q&A for '{}' is closed",
                class.title
            )));
        }
        let body = require_text(text, "Question")?;
        self.store.insert_question(&class.id, body).await
    }

    /// Add or remove the viewer's vote depending on what they currently see.
    pub async fn toggle_upvote(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
        currently_voted: bool,
    ) -> Result<UpvoteOutcome, AppError> {
        if currently_voted {
            return match self.store.delete_upvote(question_id, voter).await? {
                true => Ok(UpvoteOutcome::Removed),
                false => Ok(UpvoteOutcome::AlreadyRemoved),
            };
        }

        match self.store.insert_upvote(question_id, voter).await {
            Ok(()) => Ok(UpvoteOutcome::Added),
            Err(AppError::Conflict(_)) => {
                tracing::debug!(question_id = %question_id, "Duplicate upvote ignored");
                Ok(UpvoteOutcome::AlreadyVoted)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn post_reply(&self, question_id: &str, text: &str) -> Result<Reply, AppError> {
        self.require_admin("post replies")?;
        let body = require_text(text, "Reply")?;
        self.store.insert_reply(question_id, body).await
    }

    /// Write the opposite of `current_state`. Returns the new state.
    pub async fn toggle_answered(
        &self,
        question_id: &str,
        current_state: bool,
    ) -> Result<bool, AppError> {
        self.require_admin("mark questions answered")?;
        self.store.set_answered(question_id, !current_state).await?;
        Ok(!current_state)
    }

    /// Write the opposite of `current_state`. Returns the new state.
    pub async fn toggle_qa_open(
        &self,
        class_id: &str,
        current_state: bool,
    ) -> Result<bool, AppError> {
        self.require_admin("open or close the Q&A")?;
        self.store.set_qa_open(class_id, !current_state).await?;
        Ok(!current_state)
    }

    pub async fn delete_question(&self, question_id: &str) -> Result<(), AppError> {
        self.require_admin("delete questions")?;
        self.store.delete_question(question_id).await
    }

    pub async fn delete_reply(&self, reply_id: &str) -> Result<(), AppError> {
        self.require_admin("delete replies")?;
        self.store.delete_reply(reply_id).await
    }

    fn require_admin(&self, action: &str) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Member => Err(AppError::Forbidden(format!("Only admins may {}", action))),
        }
    }
}

fn require_text<'a>(text: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} text is required", field)));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::models::CreateClassRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    async fn setup(qa_open: bool) -> (Arc<Repository>, ClassSession, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = Arc::new(Repository::new(pool));
        let class = repo
            .create_class(&CreateClassRequest {
                title: "Tazkiyah".into(),
                subtitle: None,
                description: String::new(),
                location: "Masjid".into(),
                class_date: "2026-03-01T18:00:00Z".into(),
                duration_minutes: 60,
                qa_open,
            })
            .await
            .unwrap();
        (repo, class, dir)
    }

    /// Counts writes and refuses all of them.
    #[derive(Default)]
    struct CountingStore {
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn write(&self) -> Result<(), AppError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Internal("store should not be reached".into()))
        }
    }

    impl QaStore for CountingStore {
        async fn get_class(&self, _: &str) -> Result<Option<ClassSession>, AppError> {
            Ok(None)
        }
        async fn list_questions(&self, _: &str) -> Result<Vec<Question>, AppError> {
            Ok(Vec::new())
        }
        async fn count_upvotes(&self, _: &str) -> Result<i64, AppError> {
            Ok(0)
        }
        async fn has_upvoted(&self, _: &str, _: &VoterIdentity) -> Result<bool, AppError> {
            Ok(false)
        }
        async fn list_replies(&self, _: &str) -> Result<Vec<Reply>, AppError> {
            Ok(Vec::new())
        }
        async fn insert_question(&self, _: &str, _: &str) -> Result<Question, AppError> {
            self.write()?;
            unreachable!()
        }
        async fn insert_upvote(&self, _: &str, _: &VoterIdentity) -> Result<(), AppError> {
            self.write()
        }
        async fn delete_upvote(&self, _: &str, _: &VoterIdentity) -> Result<bool, AppError> {
            self.write().map(|_| false)
        }
        async fn insert_reply(&self, _: &str, _: &str) -> Result<Reply, AppError> {
            self.write()?;
            unreachable!()
        }
        async fn set_answered(&self, _: &str, _: bool) -> Result<(), AppError> {
            self.write()
        }
        async fn set_qa_open(&self, _: &str, _: bool) -> Result<(), AppError> {
            self.write()
        }
        async fn delete_question(&self, _: &str) -> Result<(), AppError> {
            self.write()
        }
        async fn delete_reply(&self, _: &str) -> Result<(), AppError> {
            self.write()
        }
    }

    fn closed_class() -> ClassSession {
        ClassSession {
            id: "class-1".into(),
            title: "Closed class".into(),
            subtitle: None,
            description: String::new(),
            location: String::new(),
            class_date: "2026-03-01T18:00:00.000000Z".into(),
            duration_minutes: 60,
            qa_open: false,
            created_at: "2026-03-01T10:00:00.000000Z".into(),
            updated_at: "2026-03-01T10:00:00.000000Z".into(),
        }
    }

    #[tokio::test]
    async fn test_closed_qa_rejects_without_store_call() {
        let store = Arc::new(CountingStore::default());
        let gateway = MutationGateway::new(Arc::clone(&store), Role::Member);

        for text in ["What is sabr?", "x", "  long question  "] {
            let result = gateway.submit_question(&closed_class(), text).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_question_rejected_without_store_call() {
        let store = Arc::new(CountingStore::default());
        let gateway = MutationGateway::new(Arc::clone(&store), Role::Member);
        let open = ClassSession {
            qa_open: true,
            ..closed_class()
        };

        let result = gateway.submit_question(&open, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admin_actions_need_admin_role() {
        let store = Arc::new(CountingStore::default());
        let gateway = MutationGateway::new(Arc::clone(&store), Role::Member);

        let results = [
            gateway.post_reply("q", "answer").await.map(|_| ()),
            gateway.toggle_answered("q", false).await.map(|_| ()),
            gateway.toggle_qa_open("c", true).await.map(|_| ()),
            gateway.delete_question("q").await,
            gateway.delete_reply("r").await,
        ];
        for result in results {
            let err = result.unwrap_err();
            assert_eq!(err.failure_kind(), crate::errors::FailureKind::Authorization);
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_trims_text() {
        let (repo, class, _dir) = setup(true).await;
        let gateway = MutationGateway::new(repo, Role::Member);
        let question = gateway
            .submit_question(&class, "  What is sabr?  ")
            .await
            .unwrap();
        assert_eq!(question.body, "What is sabr?");
        assert!(!question.is_answered);
    }

    #[tokio::test]
    async fn test_toggle_upvote_parity() {
        let (repo, class, _dir) = setup(true).await;
        let gateway = MutationGateway::new(Arc::clone(&repo), Role::Member);
        let question = gateway.submit_question(&class, "q").await.unwrap();
        let voter = VoterIdentity::Anonymous("device-1".into());

        let mut voted = false;
        for toggles in 1..=7 {
            let outcome = gateway
                .toggle_upvote(&question.id, &voter, voted)
                .await
                .unwrap();
            voted = outcome.voted();
            let expected = if toggles % 2 == 1 { 1 } else { 0 };
            assert_eq!(repo.count_upvotes(&question.id).await.unwrap(), expected);
            assert_eq!(repo.has_upvoted(&question.id, &voter).await.unwrap(), expected == 1);
        }
    }

    #[tokio::test]
    async fn test_stale_toggles_are_benign() {
        let (repo, class, _dir) = setup(true).await;
        let gateway = MutationGateway::new(Arc::clone(&repo), Role::Member);
        let question = gateway.submit_question(&class, "q").await.unwrap();
        let voter = VoterIdentity::Authenticated("user-1".into());

        // Two rapid taps both believing "not voted yet".
        let first = gateway.toggle_upvote(&question.id, &voter, false).await.unwrap();
        let second = gateway.toggle_upvote(&question.id, &voter, false).await.unwrap();
        assert_eq!(first, UpvoteOutcome::Added);
        assert_eq!(second, UpvoteOutcome::AlreadyVoted);
        assert_eq!(repo.count_upvotes(&question.id).await.unwrap(), 1);

        let removed = gateway.toggle_upvote(&question.id, &voter, true).await.unwrap();
        let again = gateway.toggle_upvote(&question.id, &voter, true).await.unwrap();
        assert_eq!(removed, UpvoteOutcome::Removed);
        assert_eq!(again, UpvoteOutcome::AlreadyRemoved);
        assert_eq!(repo.count_upvotes(&question.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_answered_round_trip() {
        let (repo, class, _dir) = setup(true).await;
        let admin = MutationGateway::new(Arc::clone(&repo), Role::Admin);
        let question = admin.submit_question(&class, "q").await.unwrap();

        assert!(admin.toggle_answered(&question.id, false).await.unwrap());
        let stored = repo.get_question(&question.id).await.unwrap().unwrap();
        assert!(stored.is_answered);

        assert!(!admin.toggle_answered(&question.id, true).await.unwrap());
        let stored = repo.get_question(&question.id).await.unwrap().unwrap();
        assert!(!stored.is_answered);
    }

    #[tokio::test]
    async fn test_toggle_qa_open() {
        let (repo, class, _dir) = setup(false).await;
        let admin = MutationGateway::new(Arc::clone(&repo), Role::Admin);

        assert!(admin.toggle_qa_open(&class.id, class.qa_open).await.unwrap());
        assert!(repo.get_class(&class.id).await.unwrap().unwrap().qa_open);
    }
}
