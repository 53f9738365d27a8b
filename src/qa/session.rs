//! A viewer's live Q&A session: one selected class, its latest snapshot,
//! and the invalidation subscription that keeps it fresh.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use super::{
    project, ExpandedSet, InvalidationTrigger, MutationGateway, QaStore, QaView, Snapshot,
    SnapshotLoader, Subscription, UpvoteOutcome,
};
use crate::errors::{AppError, FailureKind};
use crate::models::{Reply, Viewer};
use crate::realtime::ChangeBus;

/// How long a notice stays visible unless configured otherwise.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3);

/// Sequence number stamped on a load when it is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Admits only the newest completed load.
#[derive(Debug, Default)]
pub struct LoadFence {
    issued: u64,
    applied: u64,
}

impl LoadFence {
    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// Whether a result for `ticket` would still be applied.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 > self.applied
    }

    /// Record `ticket` as applied if nothing newer has been.
    pub fn admit(&mut self, ticket: Ticket) -> bool {
        if self.is_current(ticket) {
            self.applied = ticket.0;
            true
        } else {
            false
        }
    }

    /// Reject every ticket issued so far.
    pub fn invalidate(&mut self) {
        self.applied = self.issued;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short-lived message for the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub expires_at: Instant,
}

/// What became of a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was applied first, or the class changed meanwhile.
    Discarded,
    Failed(FailureKind),
    /// No class is selected.
    Idle,
}

#[derive(Default)]
struct SessionState {
    class_id: Option<String>,
    snapshot: Option<Snapshot>,
    fence: LoadFence,
    expanded: ExpandedSet,
    notice: Option<Notice>,
    subscription: Option<Subscription>,
}

struct SessionInner<S> {
    loader: SnapshotLoader<S>,
    gateway: MutationGateway<S>,
    trigger: InvalidationTrigger,
    viewer: Viewer,
    notice_ttl: Duration,
    state: Mutex<SessionState>,
}

/// Cheaply cloneable handle to a viewer's session.
pub struct QaSession<S> {
    inner: Arc<SessionInner<S>>,
}

impl<S> Clone for QaSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: QaStore> QaSession<S> {
    pub fn new(store: Arc<S>, changes: ChangeBus, viewer: Viewer, notice_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                loader: SnapshotLoader::new(Arc::clone(&store)),
                gateway: MutationGateway::new(store, viewer.role),
                trigger: InvalidationTrigger::new(changes),
                viewer,
                notice_ttl,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.inner.viewer
    }

    /// Switch to `class_id`: drop the old subscription, subscribe to the new
    /// class and load it. Loads still in flight for the old class are ignored.
    pub async fn select_class(&self, class_id: &str) -> LoadOutcome {
        {
            let mut state = self.inner.state.lock().await;
            state.subscription.take();
            state.fence.invalidate();
            state.snapshot = None;
            state.expanded = ExpandedSet::new();
            state.class_id = Some(class_id.to_string());

            let weak = Arc::downgrade(&self.inner);
            state.subscription = Some(
                self.inner
                    .trigger
                    .subscribe(class_id, move || spawn_reload(&weak)),
            );
        }
        tracing::info!(class_id = %class_id, "Selected class");
        self.reload().await
    }

    /// Leave the current class. Nothing in flight will be applied.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.subscription.take();
        state.fence.invalidate();
        state.class_id = None;
        state.snapshot = None;
    }

    /// Re-read the selected class and apply the result if it is the newest.
    pub async fn reload(&self) -> LoadOutcome {
        let (class_id, ticket) = {
            let mut state = self.inner.state.lock().await;
            let Some(class_id) = state.class_id.clone() else {
                return LoadOutcome::Idle;
            };
            (class_id, state.fence.issue())
        };

        let result = self
            .inner
            .loader
            .load(&class_id, self.inner.viewer.voter.as_ref())
            .await;

        let mut state = self.inner.state.lock().await;
        if state.class_id.as_deref() != Some(class_id.as_str()) {
            tracing::debug!(class_id = %class_id, "Dropping load for a class no longer shown");
            return LoadOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                if state.fence.admit(ticket) {
                    state.snapshot = Some(snapshot);
                    LoadOutcome::Applied
                } else {
                    tracing::debug!(class_id = %class_id, ?ticket, "Dropping stale load");
                    LoadOutcome::Discarded
                }
            }
            Err(e) => {
                if !state.fence.is_current(ticket) {
                    return LoadOutcome::Discarded;
                }
                tracing::warn!(class_id = %class_id, "Snapshot load failed: {}", e);
                let kind = e.failure_kind();
                state.notice = Some(self.notice_for_error(&e));
                LoadOutcome::Failed(kind)
            }
        }
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.inner.state.lock().await.snapshot.clone()
    }

    /// Display rows for the latest snapshot.
    pub async fn view(&self) -> Option<QaView> {
        let state = self.inner.state.lock().await;
        state
            .snapshot
            .as_ref()
            .map(|snapshot| project(snapshot, &state.expanded, self.inner.viewer.is_admin()))
    }

    pub async fn toggle_expanded(&self, question_id: &str) -> bool {
        self.inner.state.lock().await.expanded.toggle(question_id)
    }

    /// The current notice, unless it has expired.
    pub async fn notice(&self) -> Option<Notice> {
        let mut state = self.inner.state.lock().await;
        let now = Instant::now();
        if state.notice.as_ref().is_some_and(|n| n.expires_at <= now) {
            state.notice = None;
        }
        state.notice.clone()
    }

    // ==================== ACTIONS ====================

    pub async fn submit_question(&self, text: &str) -> Result<(), AppError> {
        let class = {
            let state = self.inner.state.lock().await;
            state.snapshot.as_ref().map(|s| s.class.clone())
        };
        let Some(class) = class else {
            return self.fail(no_class()).await;
        };

        let result = self.inner.gateway.submit_question(&class, text).await;
        self.settle(result, "Question submitted").await.map(|_| ())
    }

    /// Toggle the viewer's vote based on what the latest snapshot shows.
    pub async fn toggle_upvote(&self, question_id: &str) -> Result<UpvoteOutcome, AppError> {
        let Some(voter) = self.inner.viewer.voter.clone() else {
            return self
                .fail(AppError::Validation("A voter identity is required to vote".into()))
                .await;
        };
        let currently_voted = match self.entry_flag(question_id, |e| e.user_has_upvoted).await {
            Ok(flag) => flag,
            Err(e) => return self.fail(e).await,
        };

        let result = self
            .inner
            .gateway
            .toggle_upvote(question_id, &voter, currently_voted)
            .await;
        if let Ok(UpvoteOutcome::AlreadyVoted) = result {
            self.set_notice(NoticeLevel::Info, "You have already upvoted this question")
                .await;
            self.reload().await;
            return result;
        }
        self.settle(result, "Vote updated").await
    }

    pub async fn post_reply(&self, question_id: &str, text: &str) -> Result<Reply, AppError> {
        let result = self.inner.gateway.post_reply(question_id, text).await;
        self.settle(result, "Reply posted").await
    }

    pub async fn toggle_answered(&self, question_id: &str) -> Result<bool, AppError> {
        let current = match self
            .entry_flag(question_id, |e| e.question.is_answered)
            .await
        {
            Ok(flag) => flag,
            Err(e) => return self.fail(e).await,
        };
        let result = self.inner.gateway.toggle_answered(question_id, current).await;
        self.settle(result, "Question updated").await
    }

    pub async fn toggle_qa_open(&self) -> Result<bool, AppError> {
        let class = {
            let state = self.inner.state.lock().await;
            state
                .snapshot
                .as_ref()
                .map(|s| (s.class.id.clone(), s.class.qa_open))
        };
        let Some((class_id, current)) = class else {
            return self.fail(no_class()).await;
        };

        let result = self.inner.gateway.toggle_qa_open(&class_id, current).await;
        let message = if current { "Q&A closed" } else { "Q&A opened" };
        self.settle(result, message).await
    }

    pub async fn delete_question(&self, question_id: &str) -> Result<(), AppError> {
        let result = self.inner.gateway.delete_question(question_id).await;
        self.settle(result, "Question deleted").await
    }

    pub async fn delete_reply(&self, reply_id: &str) -> Result<(), AppError> {
        let result = self.inner.gateway.delete_reply(reply_id).await;
        self.settle(result, "Reply deleted").await
    }

    // ==================== HELPERS ====================

    async fn entry_flag(
        &self,
        question_id: &str,
        flag: impl Fn(&super::QuestionEntry) -> bool,
    ) -> Result<bool, AppError> {
        let state = self.inner.state.lock().await;
        let snapshot = state.snapshot.as_ref().ok_or_else(no_class)?;
        snapshot
            .question(question_id)
            .map(flag)
            .ok_or_else(|| AppError::NotFound(format!("Question {} is not shown", question_id)))
    }

    /// After a successful write, reload before reporting back.
    async fn settle<T>(&self, result: Result<T, AppError>, success: &str) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.set_notice(NoticeLevel::Success, success).await;
                self.reload().await;
                Ok(value)
            }
            Err(e) => self.fail(e).await,
        }
    }

    /// Surface a failure once. The snapshot stays as it was.
    async fn fail<T>(&self, error: AppError) -> Result<T, AppError> {
        let notice = self.notice_for_error(&error);
        self.inner.state.lock().await.notice = Some(notice);
        Err(error)
    }

    async fn set_notice(&self, level: NoticeLevel, message: &str) {
        let notice = Notice {
            level,
            message: message.to_string(),
            expires_at: Instant::now() + self.inner.notice_ttl,
        };
        self.inner.state.lock().await.notice = Some(notice);
    }

    fn notice_for_error(&self, error: &AppError) -> Notice {
        let (level, message) = match error.failure_kind() {
            FailureKind::Conflict => (NoticeLevel::Info, "That was already done".to_string()),
            FailureKind::Transient => (
                NoticeLevel::Error,
                format!("Something went wrong, please try again ({})", error.message()),
            ),
            FailureKind::Validation | FailureKind::Authorization => {
                (NoticeLevel::Error, error.message())
            }
        };
        Notice {
            level,
            message,
            expires_at: Instant::now() + self.inner.notice_ttl,
        }
    }
}

fn no_class() -> AppError {
    AppError::Validation("No class is selected".to_string())
}

fn spawn_reload<S: QaStore>(weak: &Weak<SessionInner<S>>) {
    if let Some(inner) = weak.upgrade() {
        let session = QaSession { inner };
        tokio::spawn(async move {
            session.reload().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::models::{ClassSession, CreateClassRequest, Question, Role, VoterIdentity};
    use crate::qa::UpvoteAction;
    use tempfile::TempDir;
    use tokio::sync::{oneshot, Notify};

    const TTL: Duration = DEFAULT_NOTICE_TTL;

    async fn setup() -> (Arc<Repository>, String, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = Arc::new(Repository::new(pool));
        let class = repo
            .create_class(&CreateClassRequest {
                title: "Tafsir".into(),
                subtitle: None,
                description: String::new(),
                location: "Hall".into(),
                class_date: "2026-03-01T18:00:00Z".into(),
                duration_minutes: 60,
                qa_open: true,
            })
            .await
            .unwrap();
        (repo, class.id, dir)
    }

    fn member(repo: &Arc<Repository>, token: &str) -> QaSession<Repository> {
        QaSession::new(
            Arc::clone(repo),
            repo.changes().clone(),
            Viewer::member(Some(VoterIdentity::Anonymous(token.to_string()))),
            TTL,
        )
    }

    fn admin(repo: &Arc<Repository>) -> QaSession<Repository> {
        QaSession::new(
            Arc::clone(repo),
            repo.changes().clone(),
            Viewer {
                role: Role::Admin,
                voter: Some(VoterIdentity::Authenticated("admin-1".into())),
            },
            TTL,
        )
    }

    #[test]
    fn test_fence_admits_only_newest() {
        let mut fence = LoadFence::default();
        let older = fence.issue();
        let newer = fence.issue();

        assert!(fence.admit(newer));
        assert!(!fence.is_current(older));
        assert!(!fence.admit(older));

        let pending = fence.issue();
        fence.invalidate();
        assert!(!fence.admit(pending));

        let fresh = fence.issue();
        assert!(fence.admit(fresh));
    }

    #[tokio::test]
    async fn test_two_viewer_upvote_scenario() {
        let (repo, class_id, _dir) = setup().await;
        let viewer_a = member(&repo, "device-a");
        let viewer_b = member(&repo, "device-b");

        assert_eq!(viewer_a.select_class(&class_id).await, LoadOutcome::Applied);
        assert_eq!(viewer_b.select_class(&class_id).await, LoadOutcome::Applied);

        viewer_a.submit_question("What is sabr?").await.unwrap();
        let snapshot = viewer_a.snapshot().await.unwrap();
        assert_eq!(snapshot.questions.len(), 1);
        let question = &snapshot.questions[0];
        assert_eq!(question.question.body, "What is sabr?");
        assert_eq!(question.upvote_count, 0);
        assert!(!question.question.is_answered);
        let question_id = question.question.id.clone();

        viewer_b.reload().await;
        let outcome = viewer_b.toggle_upvote(&question_id).await.unwrap();
        assert_eq!(outcome, UpvoteOutcome::Added);

        let b_view = viewer_b.snapshot().await.unwrap();
        assert_eq!(b_view.questions[0].upvote_count, 1);
        assert!(b_view.questions[0].user_has_upvoted);

        viewer_a.reload().await;
        let a_view = viewer_a.snapshot().await.unwrap();
        assert_eq!(a_view.questions[0].upvote_count, 1);
        assert!(!a_view.questions[0].user_has_upvoted);

        let outcome = viewer_b.toggle_upvote(&question_id).await.unwrap();
        assert_eq!(outcome, UpvoteOutcome::Removed);
        assert_eq!(viewer_b.snapshot().await.unwrap().questions[0].upvote_count, 0);

        let rows = viewer_b.view().await.unwrap().rows;
        assert_eq!(rows[0].upvote_action, UpvoteAction::Upvote);
    }

    #[tokio::test]
    async fn test_replies_in_posting_order() {
        let (repo, class_id, _dir) = setup().await;
        let admin = admin(&repo);
        admin.select_class(&class_id).await;
        admin.submit_question("q").await.unwrap();
        let question_id = admin.snapshot().await.unwrap().questions[0].question.id.clone();

        admin.post_reply(&question_id, "Reply 1").await.unwrap();
        admin.post_reply(&question_id, "Reply 2").await.unwrap();

        let snapshot = admin.snapshot().await.unwrap();
        let bodies: Vec<&str> = snapshot.questions[0]
            .replies
            .iter()
            .map(|r| r.body.as_str())
            .collect();
        assert_eq!(bodies, vec!["Reply 1", "Reply 2"]);
    }

    #[tokio::test]
    async fn test_answered_toggle_reads_back() {
        let (repo, class_id, _dir) = setup().await;
        let admin = admin(&repo);
        admin.select_class(&class_id).await;
        admin.submit_question("q").await.unwrap();
        let question_id = admin.snapshot().await.unwrap().questions[0].question.id.clone();

        assert!(admin.toggle_answered(&question_id).await.unwrap());
        assert!(admin.snapshot().await.unwrap().questions[0].question.is_answered);

        assert!(!admin.toggle_answered(&question_id).await.unwrap());
        assert!(!admin.snapshot().await.unwrap().questions[0].question.is_answered);
    }

    #[tokio::test]
    async fn test_submit_rejected_after_qa_closed() {
        let (repo, class_id, _dir) = setup().await;
        let admin = admin(&repo);
        let viewer = member(&repo, "device-a");
        admin.select_class(&class_id).await;
        viewer.select_class(&class_id).await;

        assert!(!admin.toggle_qa_open().await.unwrap());
        viewer.reload().await;
        assert!(!viewer.view().await.unwrap().accepting_questions);

        let result = viewer.submit_question("Still typing this...").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(repo.list_questions(&class_id).await.unwrap().is_empty());

        let notice = viewer.notice().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_member_cannot_moderate() {
        let (repo, class_id, _dir) = setup().await;
        let viewer = member(&repo, "device-a");
        viewer.select_class(&class_id).await;

        let result = viewer.toggle_qa_open().await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(repo.get_class(&class_id).await.unwrap().unwrap().qa_open);
        assert!(!viewer.view().await.unwrap().can_moderate);
    }

    #[tokio::test]
    async fn test_remote_change_triggers_reload() {
        let (repo, class_id, _dir) = setup().await;
        let watcher = member(&repo, "device-a");
        let author = member(&repo, "device-b");
        watcher.select_class(&class_id).await;
        author.select_class(&class_id).await;

        author.submit_question("Asked elsewhere").await.unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(snapshot) = watcher.snapshot().await {
                    if snapshot.questions.len() == 1 {
                        return snapshot;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("invalidation did not reload the watcher");
        assert_eq!(seen.questions[0].question.body, "Asked elsewhere");
    }

    #[tokio::test]
    async fn test_closed_session_ignores_in_flight_and_idles() {
        let (repo, class_id, _dir) = setup().await;
        let viewer = member(&repo, "device-a");
        viewer.select_class(&class_id).await;
        viewer.close().await;

        assert!(viewer.snapshot().await.is_none());
        assert_eq!(viewer.reload().await, LoadOutcome::Idle);

        // The aborted listener releases its receiver once the runtime drops it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(repo.changes().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_class_reports_failure_and_keeps_nothing() {
        let (repo, _class_id, _dir) = setup().await;
        let viewer = member(&repo, "device-a");
        let outcome = viewer.select_class("no-such-class").await;
        assert_eq!(outcome, LoadOutcome::Failed(FailureKind::Transient));
        assert!(viewer.snapshot().await.is_none());
        assert_eq!(viewer.notice().await.unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_notice_expires() {
        let (repo, class_id, _dir) = setup().await;
        let viewer = QaSession::new(
            Arc::clone(&repo),
            repo.changes().clone(),
            Viewer::member(Some(VoterIdentity::Anonymous("d".into()))),
            Duration::from_millis(20),
        );
        viewer.select_class(&class_id).await;
        viewer.submit_question("q").await.unwrap();
        assert_eq!(viewer.notice().await.unwrap().level, NoticeLevel::Success);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(viewer.notice().await.is_none());
    }

    /// Holds the first question listing until released.
    struct GatedStore {
        inner: Arc<Repository>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        reached: Notify,
    }

    impl QaStore for GatedStore {
        async fn get_class(&self, id: &str) -> Result<Option<ClassSession>, AppError> {
            self.inner.get_class(id).await
        }
        async fn list_questions(&self, class_id: &str) -> Result<Vec<Question>, AppError> {
            let questions = self.inner.list_questions(class_id).await?;
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                self.reached.notify_one();
                let _ = gate.await;
            }
            Ok(questions)
        }
        async fn count_upvotes(&self, id: &str) -> Result<i64, AppError> {
            self.inner.count_upvotes(id).await
        }
        async fn has_upvoted(&self, id: &str, voter: &VoterIdentity) -> Result<bool, AppError> {
            self.inner.has_upvoted(id, voter).await
        }
        async fn list_replies(&self, id: &str) -> Result<Vec<Reply>, AppError> {
            self.inner.list_replies(id).await
        }
        async fn insert_question(&self, class_id: &str, body: &str) -> Result<Question, AppError> {
            self.inner.insert_question(class_id, body).await
        }
        async fn insert_upvote(&self, id: &str, voter: &VoterIdentity) -> Result<(), AppError> {
            self.inner.insert_upvote(id, voter).await
        }
        async fn delete_upvote(&self, id: &str, voter: &VoterIdentity) -> Result<bool, AppError> {
            self.inner.delete_upvote(id, voter).await
        }
        async fn insert_reply(&self, id: &str, body: &str) -> Result<Reply, AppError> {
            self.inner.insert_reply(id, body).await
        }
        async fn set_answered(&self, id: &str, answered: bool) -> Result<(), AppError> {
            self.inner.set_answered(id, answered).await
        }
        async fn set_qa_open(&self, id: &str, open: bool) -> Result<(), AppError> {
            self.inner.set_qa_open(id, open).await
        }
        async fn delete_question(&self, id: &str) -> Result<(), AppError> {
            self.inner.delete_question(id).await
        }
        async fn delete_reply(&self, id: &str) -> Result<(), AppError> {
            self.inner.delete_reply(id).await
        }
    }

    #[tokio::test]
    async fn test_slow_older_load_cannot_overwrite_newer() {
        let (repo, class_id, _dir) = setup().await;
        let (release, gate) = oneshot::channel();
        let store = Arc::new(GatedStore {
            inner: Arc::clone(&repo),
            gate: Mutex::new(None),
            reached: Notify::new(),
        });
        // Separate bus so our own writes do not start extra loads.
        let session = QaSession::new(
            Arc::clone(&store),
            ChangeBus::new(),
            Viewer::member(None),
            TTL,
        );
        session.select_class(&class_id).await;
        *store.gate.lock().await = Some(gate);

        // The slow load reads an empty question list, then stalls.
        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.reload().await })
        };
        store.reached.notified().await;

        repo.insert_question(&class_id, "arrived later").await.unwrap();
        assert_eq!(session.reload().await, LoadOutcome::Applied);

        release.send(()).unwrap();
        assert_eq!(slow.await.unwrap(), LoadOutcome::Discarded);

        let snapshot = session.snapshot().await.unwrap();
        assert_eq!(snapshot.questions.len(), 1);
        assert_eq!(snapshot.questions[0].question.body, "arrived later");
    }

    #[tokio::test]
    async fn test_switching_class_discards_old_load() {
        let (repo, class_id, _dir) = setup().await;
        let other = repo
            .create_class(&CreateClassRequest {
                title: "Fiqh".into(),
                subtitle: None,
                description: String::new(),
                location: String::new(),
                class_date: "2026-03-01T20:00:00Z".into(),
                duration_minutes: 60,
                qa_open: true,
            })
            .await
            .unwrap();
        let (release, gate) = oneshot::channel();
        let store = Arc::new(GatedStore {
            inner: Arc::clone(&repo),
            gate: Mutex::new(None),
            reached: Notify::new(),
        });
        let session = QaSession::new(
            Arc::clone(&store),
            ChangeBus::new(),
            Viewer::member(None),
            TTL,
        );
        session.select_class(&class_id).await;
        *store.gate.lock().await = Some(gate);

        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.reload().await })
        };
        store.reached.notified().await;

        assert_eq!(session.select_class(&other.id).await, LoadOutcome::Applied);
        release.send(()).unwrap();
        assert_eq!(slow.await.unwrap(), LoadOutcome::Discarded);
        assert_eq!(session.snapshot().await.unwrap().class.id, other.id);
    }
}
