//! In-process realtime channel for question row changes.
//!
//! Every question write made through the repository is published here.
//! Listeners subscribe per class and only see changes for that class.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

/// Buffered changes per listener before it starts lagging.
const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// A row-level change to the questions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionChange {
    pub class_id: String,
    pub question_id: String,
    pub kind: ChangeKind,
}

/// What a class channel yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Changed(QuestionChange),
    /// The listener fell behind and some changes were dropped.
    Lagged(u64),
}

/// Broadcast hub for question changes.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<QuestionChange>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Publish a change. Having no listeners is not an error.
    pub fn publish(&self, change: QuestionChange) {
        let delivered = self.sender.send(change.clone()).unwrap_or(0);
        tracing::debug!(
            class_id = %change.class_id,
            question_id = %change.question_id,
            kind = change.kind.as_str(),
            listeners = delivered,
            "Published question change"
        );
    }

    /// Open a channel filtered to a single class.
    pub fn subscribe(&self, class_id: impl Into<String>) -> ClassChannel {
        ClassChannel {
            class_id: class_id.into(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of a class-filtered subscription.
#[derive(Debug)]
pub struct ClassChannel {
    class_id: String,
    receiver: broadcast::Receiver<QuestionChange>,
}

impl ClassChannel {
    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// Wait for the next change in this class.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.class_id == self.class_id => {
                    return Some(ChannelEvent::Changed(change));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(ChannelEvent::Lagged(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
