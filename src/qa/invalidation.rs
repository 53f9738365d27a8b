//! Push invalidation: "something in this class changed, reload".

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::realtime::{ChangeBus, ChannelEvent};

/// Lifecycle of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Active,
}

/// Opens per-class subscriptions on a [`ChangeBus`].
#[derive(Debug, Clone)]
pub struct InvalidationTrigger {
    bus: ChangeBus,
}

impl InvalidationTrigger {
    pub fn new(bus: ChangeBus) -> Self {
        Self { bus }
    }

    /// Call `on_change` for every question insert, update or delete in
    /// `class_id` until the subscription is dropped.
    ///
    /// The change itself is not passed on. Must be called within a Tokio
    /// runtime.
    pub fn subscribe<F>(&self, class_id: &str, on_change: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Subscribing);
        let state_tx = Arc::new(state_tx);

        // Attach before spawning so nothing published from here on is missed.
        let mut channel = self.bus.subscribe(class_id);
        let task_state = Arc::clone(&state_tx);
        let task = tokio::spawn(async move {
            task_state.send_replace(SubscriptionState::Active);
            tracing::debug!(class_id = %channel.class_id(), "Invalidation listener active");

            while let Some(event) = channel.next().await {
                match event {
                    ChannelEvent::Changed(change) => {
                        tracing::debug!(
                            class_id = %change.class_id,
                            question_id = %change.question_id,
                            kind = change.kind.as_str(),
                            "Question set changed"
                        );
                    }
                    ChannelEvent::Lagged(skipped) => {
                        tracing::warn!(
                            class_id = %channel.class_id(),
                            skipped,
                            "Invalidation listener lagged"
                        );
                    }
                }
                on_change();
            }

            tracing::debug!(class_id = %channel.class_id(), "Change bus closed");
            task_state.send_replace(SubscriptionState::Unsubscribed);
        });

        Subscription {
            class_id: class_id.to_string(),
            state_tx,
            state_rx,
            task,
        }
    }
}

/// A live invalidation channel for one class.
///
/// Bound to its class for life; to follow another class, drop this one and
/// subscribe again. Dropping stops further `on_change` calls.
#[derive(Debug)]
pub struct Subscription {
    class_id: String,
    state_tx: Arc<watch::Sender<SubscriptionState>>,
    state_rx: watch::Receiver<SubscriptionState>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state_rx.borrow()
    }

    /// Wait until the listener is attached. Returns `false` if it ended first.
    pub async fn wait_active(&self) -> bool {
        let mut state = self.state_rx.clone();
        state
            .wait_for(|s| *s != SubscriptionState::Subscribing)
            .await
            .map(|s| *s == SubscriptionState::Active)
            .unwrap_or(false)
    }

    /// Tear the channel down.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        self.state_tx.send_replace(SubscriptionState::Unsubscribed);
        tracing::debug!(class_id = %self.class_id, "Unsubscribed from question changes");
    }
}
