//! Pull-based synchronization of the local view with the store.
//!
//! Nothing is pushed to a client: the view only changes when `refresh` runs,
//! which happens when a session becomes active, after every successful
//! `publish`, or on the optional poller's tick.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::{
    ChatError, Username,
    messages::{MessageClient, MessageView},
    presence::PresenceClient,
    store::CollectionStore,
};

/// Client-side snapshot of the room. Always replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatView {
    pub messages: Vec<MessageView>,
    pub roster: Vec<String>,
}

pub struct SyncEngine<S> {
    messages: MessageClient<S>,
    presence: PresenceClient<S>,
    view: watch::Sender<ChatView>,
    /// Handed out to each refresh before it reads.
    started: AtomicU64,
    /// Generation of the refresh whose result is in `view`.
    applied: AtomicU64,
}

impl<S: CollectionStore> SyncEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            messages: MessageClient::new(store.clone()),
            presence: PresenceClient::new(store),
            view: watch::Sender::new(ChatView::default()),
            started: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    /// Current snapshot.
    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every completed refresh.
    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view.subscribe()
    }

    /// Re-reads messages and roster and swaps both into the view at once.
    /// If either read fails the previous view is kept untouched.
    ///
    /// Overlapping refreshes land in the order they started: a refresh that
    /// finishes after a later-started one has been applied is dropped.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), ChatError> {
        let generation = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let (messages, roster) = futures_util::try_join!(self.messages.list(), self.presence.list())?;

        // the watch write lock serializes this check-and-apply
        let applied = self.view.send_if_modified(|view| {
            if generation <= self.applied.load(Ordering::SeqCst) {
                return false;
            }
            self.applied.store(generation, Ordering::SeqCst);
            *view = ChatView { messages, roster };
            true
        });
        if applied {
            debug!(generation, "view refreshed");
        } else {
            debug!(generation, "stale refresh dropped");
        }
        Ok(())
    }

    /// Appends `body` as `sender`, then refreshes.
    ///
    /// An empty body is rejected without touching the store. A failed append
    /// skips the refresh and hands the error back so the caller can keep the
    /// unsent text.
    #[instrument(skip(self, sender, body), fields(sender = %sender))]
    pub async fn publish(&self, sender: &Username, body: &str) -> Result<(), ChatError> {
        if body.is_empty() {
            return Err(ChatError::InvalidInput("message body must not be empty".to_owned()));
        }
        if let Err(e) = self.messages.append(sender, body).await {
            warn!("publish failed: {e}");
            return Err(e);
        }
        self.refresh().await
    }
}

impl<S: CollectionStore> SyncEngine<S> {
    /// Refreshes on a fixed interval until the handle is aborted. Errors are
    /// logged and the next tick tries again. A zero interval is refused.
    pub fn spawn_poller(self: &Arc<Self>, every: Duration) -> Result<JoinHandle<()>, ChatError> {
        if every.is_zero() {
            return Err(ChatError::InvalidInput("poll interval must be greater than zero".to_owned()));
        }
        let engine = Arc::clone(self);
        info!(?every, "starting periodic refresh");
        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = engine.refresh().await {
                    warn!("periodic refresh failed: {e}");
                }
            }
        }))
    }
}
