use tracing::{info, instrument, warn};

use crate::{
    ChatError, Username,
    store::{Collection, CollectionStore, StoreRecord, fields},
};

const USERNAME: &str = "username";

/// Who is currently in the room, as recorded in the presence collection.
#[derive(Clone)]
pub struct PresenceClient<S> {
    store: S,
}

impl<S: CollectionStore> PresenceClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends a presence record. Existing records for the same username are
    /// not checked, so joining twice leaves two records behind.
    #[instrument(skip(self, username), fields(username = %username))]
    pub async fn register(&self, username: &Username) -> Result<StoreRecord, ChatError> {
        let record = self
            .store
            .create(Collection::ActiveUsers, fields([(USERNAME, username.as_str())]))
            .await?;
        info!(id = record.id, "presence registered");
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<String>, ChatError> {
        let records = self.store.list(Collection::ActiveUsers).await?;
        Ok(records
            .iter()
            .filter_map(|r| r.str_attr(USERNAME).map(str::to_owned))
            .collect())
    }

    /// Deletes the first record whose username matches ignoring case.
    /// Any further duplicates stay.
    #[instrument(skip(self, username), fields(username = %username))]
    pub async fn deregister(&self, username: &Username) -> Result<(), ChatError> {
        let matches = self
            .store
            .find_eqi(Collection::ActiveUsers, USERNAME, username.as_str())
            .await?;
        let Some(record) = matches.first() else {
            warn!("no presence record to remove");
            return Err(ChatError::NotFound(format!("presence for {username}")));
        };
        self.store.delete(Collection::ActiveUsers, record.id).await?;
        info!(id = record.id, remaining = matches.len() - 1, "presence removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn user(name: &str) -> Username {
        Username::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_list_includes_user() {
        let presence = PresenceClient::new(MemoryStore::new());
        presence.register(&user("alice")).await.unwrap();
        presence.register(&user("bob")).await.unwrap();
        assert_eq!(presence.list().await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_deregister_ignores_case() {
        let presence = PresenceClient::new(MemoryStore::new());
        presence.register(&user("bob")).await.unwrap();
        presence.deregister(&user("Bob")).await.unwrap();
        assert!(presence.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_join_leaves_residual_record() {
        let presence = PresenceClient::new(MemoryStore::new());
        presence.register(&user("dave")).await.unwrap();
        presence.register(&user("dave")).await.unwrap();
        assert_eq!(presence.list().await.unwrap().len(), 2);

        presence.deregister(&user("dave")).await.unwrap();
        assert_eq!(presence.list().await.unwrap(), vec!["dave"]);
    }

    #[tokio::test]
    async fn test_deregister_unknown_is_not_found() {
        let presence = PresenceClient::new(MemoryStore::new());
        let err = presence.deregister(&user("ghost")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_register_offline_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let presence = PresenceClient::new(store);
        let err = presence.register(&user("alice")).await.unwrap_err();
        assert!(matches!(err, ChatError::StoreUnavailable(_)));
    }
}
