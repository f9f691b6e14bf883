//! Join/leave lifecycle for one client.
//!
//! ```text
//! Unjoined --join--> Joining --registered--> Active --leave(graceful)--> Leaving --> Left
//!    ^                  |                      |
//!    +---register fails-+                      +--leave(abrupt)--> Left
//! ```
//!
//! The host delivers "terminate" by calling [`ChatSession::leave`]. Nothing
//! guarantees it arrives before the process dies; when it doesn't, the
//! presence record stays in the store.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, instrument, warn};

use crate::{
    ChatError, Username,
    presence::PresenceClient,
    store::CollectionStore,
    sync::{ChatView, SyncEngine},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joining,
    Active,
    Leaving,
    Left,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SessionState::*;
        f.write_str(match self {
            Unjoined => "unjoined",
            Joining => "joining",
            Active => "active",
            Leaving => "leaving",
            Left => "left",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveKind {
    /// Deregistration is awaited before the session counts as left.
    Graceful,
    /// The host is going away; presence is abandoned.
    Abrupt,
}

#[derive(Debug)]
pub enum LeaveOutcome {
    Deregistered,
    /// No presence record matched; logged and otherwise ignored.
    RecordMissing,
    /// The deregister call failed; the record is probably orphaned.
    DeregisterFailed(ChatError),
    /// Abrupt leave, presence left in the store.
    Abandoned,
    /// Already leaving or left, or never became active.
    NoOp,
}

struct Lifecycle {
    state: SessionState,
    username: Option<Username>,
}

pub struct ChatSession<S> {
    presence: PresenceClient<S>,
    sync: Arc<SyncEngine<S>>,
    lifecycle: Mutex<Lifecycle>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<S: CollectionStore> ChatSession<S> {
    pub fn new(store: S) -> Self {
        Self {
            presence: PresenceClient::new(store.clone()),
            sync: Arc::new(SyncEngine::new(store)),
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Unjoined,
                username: None,
            }),
            poller: Mutex::new(None),
        }
    }

    // The lock is never held across an await, so a poisoned lock still holds
    // a consistent lifecycle.
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        self.lifecycle().state = state;
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle().state
    }

    pub fn username(&self) -> Option<Username> {
        self.lifecycle().username.clone()
    }

    pub fn sync(&self) -> &Arc<SyncEngine<S>> {
        &self.sync
    }

    pub fn view(&self) -> ChatView {
        self.sync.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.sync.subscribe()
    }

    /// Registers presence under `username` and loads the initial view.
    ///
    /// An empty username is refused before any store call and the session
    /// stays `Unjoined`. A failed registration puts it back to `Unjoined`
    /// and returns the error. A failed initial refresh is only logged: the
    /// session is active and the view stays empty until the next refresh.
    #[instrument(skip(self))]
    pub async fn join(&self, username: &str) -> Result<(), ChatError> {
        let username = Username::parse(username)?;
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != SessionState::Unjoined {
                return Err(ChatError::InvalidState {
                    state: lifecycle.state,
                    action: "join",
                });
            }
            lifecycle.state = SessionState::Joining;
            lifecycle.username = Some(username.clone());
        }

        if let Err(e) = self.presence.register(&username).await {
            error!("join failed: {e}");
            let mut lifecycle = self.lifecycle();
            lifecycle.state = SessionState::Unjoined;
            lifecycle.username = None;
            return Err(e);
        }

        self.set_state(SessionState::Active);
        info!(%username, "session active");

        if let Err(e) = self.sync.refresh().await {
            warn!("initial refresh failed: {e}");
        }
        Ok(())
    }

    /// Sends `body` as this session's user.
    pub async fn publish(&self, body: &str) -> Result<(), ChatError> {
        let username = self.active_username("publish")?;
        self.sync.publish(&username, body).await
    }

    pub async fn refresh(&self) -> Result<(), ChatError> {
        self.active_username("refresh")?;
        self.sync.refresh().await
    }

    /// Starts refreshing every `every` while the session is active. Replaces
    /// any poller already running. The poller stops on leave.
    pub fn start_polling(&self, every: Duration) -> Result<(), ChatError> {
        self.active_username("poll")?;
        let handle = self.sync.spawn_poller(every)?;
        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }

    fn active_username(&self, action: &'static str) -> Result<Username, ChatError> {
        let lifecycle = self.lifecycle();
        match (&lifecycle.state, &lifecycle.username) {
            (SessionState::Active, Some(username)) => Ok(username.clone()),
            (state, _) => Err(ChatError::InvalidState { state: *state, action }),
        }
    }

    /// Ends the session.
    ///
    /// Only an `Active` session does anything; a second call while the first
    /// is still deregistering, or after the session has left, is a no-op.
    /// Deregistration failures never fail the leave: the session reaches
    /// `Left` regardless and the outcome says what happened to presence.
    #[instrument(skip(self))]
    pub async fn leave(&self, kind: LeaveKind) -> LeaveOutcome {
        let username = {
            let mut lifecycle = self.lifecycle();
            let Some(username) = lifecycle.username.clone() else {
                return LeaveOutcome::NoOp;
            };
            if lifecycle.state != SessionState::Active {
                return LeaveOutcome::NoOp;
            }
            lifecycle.state = match kind {
                LeaveKind::Graceful => SessionState::Leaving,
                LeaveKind::Abrupt => SessionState::Left,
            };
            username
        };
        self.stop_polling();

        if kind == LeaveKind::Abrupt {
            warn!(%username, "abrupt leave, presence record left behind");
            return LeaveOutcome::Abandoned;
        }

        let outcome = match self.presence.deregister(&username).await {
            Ok(()) => LeaveOutcome::Deregistered,
            Err(e) if e.is_not_found() => {
                warn!(%username, "left without a presence record");
                LeaveOutcome::RecordMissing
            }
            Err(e) => {
                warn!(%username, "deregister failed, presence may be orphaned: {e}");
                LeaveOutcome::DeregisterFailed(e)
            }
        };
        self.set_state(SessionState::Left);
        info!(%username, "session left");
        outcome
    }
}

impl<S> Drop for ChatSession<S> {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if matches!(lifecycle.state, SessionState::Active | SessionState::Leaving) {
            if let Some(username) = &lifecycle.username {
                warn!(%username, state = %lifecycle.state, "session dropped before leaving, presence orphaned");
            }
        }
        if let Some(handle) = self.poller.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{messages::MessageView, store::MemoryStore};

    #[tokio::test]
    async fn test_join_registers_and_loads_view() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store);
        session.join("alice").await.unwrap();

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.view().roster, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_empty_username_stays_unjoined() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        let err = session.join("").await.unwrap_err();

        assert!(matches!(err, ChatError::InvalidInput(_)));
        assert_eq!(session.state(), SessionState::Unjoined);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_register_failure_returns_to_unjoined() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        store.set_offline(true);

        let err = session.join("alice").await.unwrap_err();
        assert!(matches!(err, ChatError::StoreUnavailable(_)));
        assert_eq!(session.state(), SessionState::Unjoined);
        assert!(session.username().is_none());

        // not retried automatically, but the caller may try again
        store.set_offline(false);
        session.join("alice").await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_join_twice_is_invalid_state() {
        let session = ChatSession::new(MemoryStore::new());
        session.join("alice").await.unwrap();
        let err = session.join("alice").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::InvalidState {
                state: SessionState::Active,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_publish_requires_active() {
        let session = ChatSession::new(MemoryStore::new());
        let err = session.publish("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_graceful_leave_deregisters() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        session.join("alice").await.unwrap();

        assert!(matches!(session.leave(LeaveKind::Graceful).await, LeaveOutcome::Deregistered));
        assert_eq!(session.state(), SessionState::Left);
        assert!(PresenceClient::new(store).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_leave_is_noop() {
        let session = ChatSession::new(MemoryStore::new());
        session.join("alice").await.unwrap();
        session.leave(LeaveKind::Graceful).await;

        assert!(matches!(session.leave(LeaveKind::Graceful).await, LeaveOutcome::NoOp));
        assert!(matches!(session.leave(LeaveKind::Abrupt).await, LeaveOutcome::NoOp));
    }

    #[tokio::test]
    async fn test_concurrent_leaves_deregister_once() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        session.join("alice").await.unwrap();
        // a stale duplicate that a second deregister would remove
        PresenceClient::new(store.clone())
            .register(&Username::parse("alice").unwrap())
            .await
            .unwrap();

        let (a, b) = tokio::join!(session.leave(LeaveKind::Graceful), session.leave(LeaveKind::Graceful));
        let noops = [&a, &b].iter().filter(|o| matches!(o, LeaveOutcome::NoOp)).count();
        assert_eq!(noops, 1);
        assert_eq!(PresenceClient::new(store).list().await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_abrupt_leave_orphans_presence() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        session.join("alice").await.unwrap();
        let calls = store.calls();

        assert!(matches!(session.leave(LeaveKind::Abrupt).await, LeaveOutcome::Abandoned));
        assert_eq!(session.state(), SessionState::Left);
        assert_eq!(store.calls(), calls);
        assert_eq!(PresenceClient::new(store).list().await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_missing_record_still_leaves() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        session.join("alice").await.unwrap();
        // someone else cleaned it up
        PresenceClient::new(store)
            .deregister(&Username::parse("ALICE").unwrap())
            .await
            .unwrap();

        assert!(matches!(session.leave(LeaveKind::Graceful).await, LeaveOutcome::RecordMissing));
        assert_eq!(session.state(), SessionState::Left);
    }

    #[tokio::test]
    async fn test_deregister_failure_still_leaves() {
        let store = MemoryStore::new();
        let session = ChatSession::new(store.clone());
        session.join("alice").await.unwrap();
        store.set_offline(true);

        let outcome = session.leave(LeaveKind::Graceful).await;
        assert!(matches!(outcome, LeaveOutcome::DeregisterFailed(ChatError::StoreUnavailable(_))));
        assert_eq!(session.state(), SessionState::Left);
    }

    #[tokio::test]
    async fn test_join_loads_existing_transcript() {
        let store = MemoryStore::new();
        SyncEngine::new(store.clone())
            .publish(&Username::parse("bob").unwrap(), "earlier")
            .await
            .unwrap();

        let session = ChatSession::new(store);
        session.join("alice").await.unwrap();
        assert_eq!(session.view().messages, vec![MessageView::new("bob", "earlier")]);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_keeps_session_usable() {
        let session = ChatSession::new(MemoryStore::new());
        session.join("alice").await.unwrap();

        let err = session.start_polling(Duration::ZERO).unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
        session.publish("still here").await.unwrap();
        assert_eq!(session.view().messages, vec![MessageView::new("alice", "still here")]);
    }
}
