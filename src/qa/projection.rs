//! Display rows derived from a snapshot.

use std::collections::HashSet;

use serde::Serialize;

use super::Snapshot;

/// Question ids whose replies are shown. Kept apart from the snapshot so it
/// survives reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedSet {
    ids: HashSet<String>,
}

impl ExpandedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a question between expanded and collapsed. Returns the new state.
    pub fn toggle(&mut self, question_id: &str) -> bool {
        if self.ids.remove(question_id) {
            false
        } else {
            self.ids.insert(question_id.to_string());
            true
        }
    }

    pub fn is_expanded(&self, question_id: &str) -> bool {
        self.ids.contains(question_id)
    }
}

/// What pressing the vote button would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpvoteAction {
    Upvote,
    RemoveUpvote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRow {
    pub id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRow {
    pub id: String,
    pub body: String,
    pub answered: bool,
    pub upvote_count: i64,
    pub upvote_action: UpvoteAction,
    pub reply_count: usize,
    pub expanded: bool,
    /// Empty unless the question is expanded.
    pub replies: Vec<ReplyRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaView {
    pub class_id: String,
    pub title: String,
    pub accepting_questions: bool,
    /// Moderation controls (answered, delete, reply, open/close) are shown.
    pub can_moderate: bool,
    pub rows: Vec<QuestionRow>,
}

/// Project a snapshot into display rows, in snapshot order.
pub fn project(snapshot: &Snapshot, expanded: &ExpandedSet, can_moderate: bool) -> QaView {
    let rows = snapshot
        .questions
        .iter()
        .map(|entry| {
            let is_expanded = expanded.is_expanded(&entry.question.id);
            QuestionRow {
                id: entry.question.id.clone(),
                body: entry.question.body.clone(),
                answered: entry.question.is_answered,
                upvote_count: entry.upvote_count,
                upvote_action: if entry.user_has_upvoted {
                    UpvoteAction::RemoveUpvote
                } else {
                    UpvoteAction::Upvote
                },
                reply_count: entry.replies.len(),
                expanded: is_expanded,
                replies: if is_expanded {
                    entry
                        .replies
                        .iter()
                        .map(|r| ReplyRow {
                            id: r.id.clone(),
                            body: r.body.clone(),
                            created_at: r.created_at.clone(),
                        })
                        .collect()
                } else {
                    Vec::new()
                },
            }
        })
        .collect();

    QaView {
        class_id: snapshot.class.id.clone(),
        title: snapshot.class.title.clone(),
        accepting_questions: snapshot.class.qa_open,
        can_moderate,
        rows,
    }
}
